//! Key-value persistence for settings, profile, template and recent results.
//!
//! The workflow only ever reads through this module. Values are JSON except the
//! résumé template, which is stored as raw text.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::models::{ProviderSettings, RecentResult, UserProfile};

pub mod memory;
pub mod redis;

pub use memory::InMemoryStore;
pub use self::redis::RedisStore;

pub const SETTINGS_KEY: &str = "provider_settings";
pub const PROFILE_KEY: &str = "profile";
pub const TEMPLATE_KEY: &str = "template";
pub const RECENT_RESULTS_KEY: &str = "recent_results";

/// Newest-first cap on the recent results list.
pub const MAX_RECENT_RESULTS: usize = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Stored value under '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize value for '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<::redis::RedisError> for StoreError {
    fn from(e: ::redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Asynchronous string key-value store. No multi-key transactions are assumed.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

async fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw).await
}

pub async fn load_settings(
    store: &dyn KeyValueStore,
) -> Result<Option<ProviderSettings>, StoreError> {
    load_json(store, SETTINGS_KEY).await
}

pub async fn save_settings(
    store: &dyn KeyValueStore,
    settings: &ProviderSettings,
) -> Result<(), StoreError> {
    save_json(store, SETTINGS_KEY, settings).await
}

pub async fn load_profile(store: &dyn KeyValueStore) -> Result<Option<UserProfile>, StoreError> {
    load_json(store, PROFILE_KEY).await
}

pub async fn save_profile(
    store: &dyn KeyValueStore,
    profile: &UserProfile,
) -> Result<(), StoreError> {
    save_json(store, PROFILE_KEY, profile).await
}

/// Returns the template text; a blank template counts as absent.
pub async fn load_template(store: &dyn KeyValueStore) -> Result<Option<String>, StoreError> {
    Ok(store
        .get(TEMPLATE_KEY)
        .await?
        .filter(|template| !template.trim().is_empty()))
}

pub async fn save_template(store: &dyn KeyValueStore, template: &str) -> Result<(), StoreError> {
    store.set(TEMPLATE_KEY, template).await
}

pub async fn load_recent_results(
    store: &dyn KeyValueStore,
) -> Result<Vec<RecentResult>, StoreError> {
    Ok(load_json(store, RECENT_RESULTS_KEY)
        .await?
        .unwrap_or_default())
}

/// Prepends `result`, keeping at most [`MAX_RECENT_RESULTS`] entries.
///
/// Read-modify-write: callers are expected to sit behind the single-flight guard.
pub async fn push_recent_result(
    store: &dyn KeyValueStore,
    result: RecentResult,
) -> Result<(), StoreError> {
    let mut results = load_recent_results(store).await?;
    results.insert(0, result);
    results.truncate(MAX_RECENT_RESULTS);
    save_json(store, RECENT_RESULTS_KEY, &results).await
}
