use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use fluxgate_comfyui::ComfyUIError;

use crate::workflow::WorkflowError;

/// Application-level error type for HTTP handlers.
///
/// Wraps orchestration and template errors and implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A failure from the orchestration core.
    #[error(transparent)]
    Comfy(#[from] ComfyUIError),

    /// The workflow template could not be loaded or parametrized.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// The run completed but produced no final output image.
    #[error("Generation produced no output image")]
    NoOutput,
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Backend interaction failures: the upstream ComfyUI
            // instance misbehaved or is unreachable.
            AppError::Comfy(e) => {
                tracing::error!(error = %e, "Generation run failed");
                (StatusCode::BAD_GATEWAY, error_code(e), e.to_string())
            }

            // Server-side misconfiguration (template missing/broken).
            AppError::Workflow(e) => {
                tracing::error!(error = %e, "Workflow template error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "WORKFLOW_ERROR",
                    e.to_string(),
                )
            }

            AppError::NoOutput => (
                StatusCode::BAD_GATEWAY,
                "NO_OUTPUT",
                self.to_string(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Stable machine-readable code per orchestration failure stage.
fn error_code(error: &ComfyUIError) -> &'static str {
    match error {
        ComfyUIError::Connection(_) => "BACKEND_UNREACHABLE",
        ComfyUIError::Submission(_) => "SUBMISSION_REJECTED",
        ComfyUIError::Stream(_) => "EVENT_STREAM_FAILED",
        ComfyUIError::History(_) => "HISTORY_UNAVAILABLE",
        ComfyUIError::Fetch(_) => "ARTIFACT_FETCH_FAILED",
        ComfyUIError::Persist(_) => "ARTIFACT_PERSIST_FAILED",
    }
}
