use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::generation::workflow::WorkflowError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Workflow(e) => {
                let (status, code) = match e {
                    WorkflowError::EmptyJobDescription => {
                        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
                    }
                    WorkflowError::PreconditionMissing(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "PRECONDITION_MISSING")
                    }
                    WorkflowError::Llm { .. } => (StatusCode::BAD_GATEWAY, "LLM_ERROR"),
                    WorkflowError::ExtractionFailed { .. } => {
                        (StatusCode::BAD_GATEWAY, "EXTRACTION_FAILED")
                    }
                };
                if status.is_server_error() {
                    tracing::error!("Workflow error: {e}");
                }
                // Workflow messages are written for the end user.
                (status, code, e.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::workflow::{Precondition, Stage};
    use crate::llm_client::LlmError;

    #[test]
    fn test_precondition_maps_to_unprocessable_entity() {
        let response =
            AppError::from(WorkflowError::PreconditionMissing(Precondition::Template))
                .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_llm_failure_maps_to_bad_gateway() {
        let response = AppError::from(WorkflowError::Llm {
            stage: Stage::Generation,
            attempts: 3,
            source: LlmError::Timeout,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_conflict_status() {
        let response = AppError::Conflict("busy".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_store_error_hides_details() {
        let response =
            AppError::from(StoreError::Backend("redis down".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
