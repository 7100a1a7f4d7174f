use std::sync::Arc;

use crate::config::Config;
use crate::generation::single_flight::SingleFlight;
use crate::generation::workflow::ResumeWorkflow;
use crate::llm_client::ClientCache;
use crate::store::KeyValueStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KeyValueStore>,
    /// The one reusable chat client. Reset whenever provider settings change.
    pub clients: Arc<ClientCache>,
    pub config: Config,
    /// Keeps generation runs from overlapping.
    pub run_guard: Arc<SingleFlight>,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyValueStore>, clients: Arc<ClientCache>, config: Config) -> Self {
        Self {
            store,
            clients,
            config,
            run_guard: SingleFlight::new(),
        }
    }

    pub fn workflow(&self) -> ResumeWorkflow {
        ResumeWorkflow::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clients),
            self.config.workflow.clone(),
        )
    }
}
