use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::models::{ProviderSettings, UserProfile};
use crate::state::AppState;
use crate::store;

/// Provider settings as shown back to clients; the key itself never leaves the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub endpoint: String,
    pub model: String,
    pub api_key_set: bool,
    pub api_key_hint: Option<String>,
}

impl From<&ProviderSettings> for SettingsView {
    fn from(settings: &ProviderSettings) -> Self {
        let normalized = settings.normalized();
        Self {
            api_key_set: normalized.has_api_key(),
            api_key_hint: normalized.api_key_hint(),
            endpoint: normalized.endpoint,
            model: normalized.model,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TemplateBody {
    pub template: String,
}

/// GET /api/v1/settings
pub async fn handle_get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsView>, AppError> {
    let settings = store::load_settings(state.store.as_ref())
        .await?
        .unwrap_or_default();
    Ok(Json(SettingsView::from(&settings)))
}

/// PUT /api/v1/settings
///
/// Persists the settings and drops the cached client so the next run uses them.
pub async fn handle_put_settings(
    State(state): State<AppState>,
    Json(settings): Json<ProviderSettings>,
) -> Result<Json<SettingsView>, AppError> {
    let settings = settings.normalized();
    store::save_settings(state.store.as_ref(), &settings).await?;
    state.clients.reset();
    info!(
        "Provider settings updated (endpoint: {}, model: {})",
        settings.endpoint, settings.model
    );
    Ok(Json(SettingsView::from(&settings)))
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, AppError> {
    store::load_profile(state.store.as_ref())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No profile has been saved yet".to_string()))
}

/// PUT /api/v1/profile
pub async fn handle_put_profile(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> Result<StatusCode, AppError> {
    store::save_profile(state.store.as_ref(), &profile).await?;
    info!(
        "Profile saved ({} skills, {} experience entries)",
        profile.skills.len(),
        profile.experience.len()
    );
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/template
pub async fn handle_get_template(
    State(state): State<AppState>,
) -> Result<Json<TemplateBody>, AppError> {
    store::load_template(state.store.as_ref())
        .await?
        .map(|template| Json(TemplateBody { template }))
        .ok_or_else(|| AppError::NotFound("No resume template has been saved yet".to_string()))
}

/// PUT /api/v1/template
pub async fn handle_put_template(
    State(state): State<AppState>,
    Json(body): Json<TemplateBody>,
) -> Result<StatusCode, AppError> {
    if body.template.trim().is_empty() {
        return Err(AppError::Validation("template cannot be empty".to_string()));
    }
    store::save_template(state.store.as_ref(), &body.template).await?;
    info!("Resume template saved ({} chars)", body.template.len());
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/client/reset
pub async fn handle_reset_client(State(state): State<AppState>) -> StatusCode {
    state.clients.reset();
    StatusCode::NO_CONTENT
}
