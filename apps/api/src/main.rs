mod config;
mod errors;
mod generation;
mod llm_client;
mod models;
mod routes;
mod settings;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::ClientCache;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{InMemoryStore, KeyValueStore, RedisStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume tailor v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the key-value store
    let store: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStore::open(url, config.redis_prefix.clone())?),
        None => {
            warn!("REDIS_URL not set; settings, profile and template are kept in memory only");
            Arc::new(InMemoryStore::new())
        }
    };

    // LLM client is built lazily on the first run, from the stored settings
    let clients = Arc::new(ClientCache::openai_compatible());

    info!(
        "Workflow: strategy={:?}, llm_timeout={}s, max_retries={}, max_request_bytes={}",
        config.workflow.strategy,
        config.workflow.llm_timeout.as_secs(),
        config.workflow.max_retries,
        config.workflow.max_request_bytes
    );

    let state = AppState::new(store, clients, config.clone());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        // The browser extension calls from its own origin.
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
