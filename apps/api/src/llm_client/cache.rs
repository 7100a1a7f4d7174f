//! Reusable chat client, rebuilt only when the provider settings change or on reset.

use std::sync::{Arc, Mutex};

use tracing::info;

use super::{ChatModel, LlmClient, LlmError};
use crate::models::ProviderSettings;

/// Builds a chat model for a given set of (normalized) settings.
pub type ClientFactory =
    Arc<dyn Fn(&ProviderSettings) -> Result<Arc<dyn ChatModel>, LlmError> + Send + Sync>;

struct CachedClient {
    settings: ProviderSettings,
    client: Arc<dyn ChatModel>,
}

/// Owns the one chat client shared by all workflow runs.
///
/// The client is created on first use and kept while the settings it was built
/// from are unchanged. Settings changes must call [`ClientCache::reset`].
pub struct ClientCache {
    factory: ClientFactory,
    slot: Mutex<Option<CachedClient>>,
}

impl ClientCache {
    pub fn new(factory: ClientFactory) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
        }
    }

    /// Cache backed by the reqwest [`LlmClient`].
    pub fn openai_compatible() -> Self {
        Self::new(Arc::new(|settings: &ProviderSettings| {
            LlmClient::new(settings).map(|client| Arc::new(client) as Arc<dyn ChatModel>)
        }))
    }

    pub fn client_for(&self, settings: &ProviderSettings) -> Result<Arc<dyn ChatModel>, LlmError> {
        let settings = settings.normalized();
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(cached) = slot.as_ref() {
            if cached.settings == settings {
                return Ok(Arc::clone(&cached.client));
            }
        }

        let client = (self.factory)(&settings)?;
        info!(
            "LLM client created (endpoint: {}, model: {})",
            settings.endpoint, settings.model
        );
        *slot = Some(CachedClient {
            settings,
            client: Arc::clone(&client),
        });
        Ok(client)
    }

    /// Drops the cached client so the next run builds a fresh one.
    pub fn reset(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.take().is_some() {
            info!("LLM client reset");
        }
    }

    pub fn is_cached(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}
