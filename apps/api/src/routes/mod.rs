pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers as generation;
use crate::settings::handlers as settings;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Stored inputs
        .route(
            "/api/v1/settings",
            get(settings::handle_get_settings).put(settings::handle_put_settings),
        )
        .route(
            "/api/v1/profile",
            get(settings::handle_get_profile).put(settings::handle_put_profile),
        )
        .route(
            "/api/v1/template",
            get(settings::handle_get_template).put(settings::handle_put_template),
        )
        .route("/api/v1/client/reset", post(settings::handle_reset_client))
        // Generation
        .route("/api/v1/resumes/generate", post(generation::handle_generate))
        .route("/api/v1/resumes/recent", get(generation::handle_recent_results))
        .with_state(state)
}
