//! Axum route handlers for the Generation API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::workflow::{ProgressEvent, ProgressLog};
use crate::models::RecentResult;
use crate::state::AppState;
use crate::store;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Id of the entry saved to the recent results list, if saving succeeded.
    pub result_id: Option<Uuid>,
    pub document: String,
    pub attempts: u32,
    pub trimmed_prompt: bool,
    pub progress: Vec<ProgressEvent>,
}

#[derive(Debug, Serialize)]
pub struct RecentResultsResponse {
    pub results: Vec<RecentResult>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resumes/generate
///
/// Runs the résumé workflow for the selected job description. Only one run may
/// be in flight at a time; a concurrent request gets 409.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let _permit = state.run_guard.try_acquire().ok_or_else(|| {
        AppError::Conflict("A resume generation is already in progress".to_string())
    })?;

    let progress = ProgressLog::new();
    let document = state
        .workflow()
        .run_detailed(&request.job_description, &progress)
        .await
        .map_err(|e| {
            warn!("Resume workflow failed: {e}");
            AppError::Workflow(e)
        })?;

    // A failed save must not cost the user the document they just waited for.
    let recent = RecentResult::new(&request.job_description, &document.text);
    let result_id = match store::push_recent_result(state.store.as_ref(), recent.clone()).await {
        Ok(()) => Some(recent.id),
        Err(e) => {
            warn!("Failed to save recent result: {e}");
            None
        }
    };

    info!(
        "Generated resume ({} chars, {} attempt(s))",
        document.text.len(),
        document.attempts
    );

    Ok(Json(GenerateResponse {
        result_id,
        document: document.text,
        attempts: document.attempts,
        trimmed_prompt: document.trimmed_prompt,
        progress: progress.events(),
    }))
}

/// GET /api/v1/resumes/recent
///
/// Returns the most recent successful results, newest first.
pub async fn handle_recent_results(
    State(state): State<AppState>,
) -> Result<Json<RecentResultsResponse>, AppError> {
    let results = store::load_recent_results(state.store.as_ref()).await?;
    Ok(Json(RecentResultsResponse { results }))
}
