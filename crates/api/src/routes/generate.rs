//! The prompt-to-image endpoint.
//!
//! Route:
//! - `POST /generate_image` — run the workflow template with the given
//!   prompt and stream back the first final output image.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Form, Router};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use fluxgate_comfyui::history::ArtifactKind;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::workflow;

/// Form body of `POST /generate_image`.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// The text prompt to render.
    pub prompt: String,
}

/// POST /generate_image
///
/// Loads the configured workflow template, injects the prompt into the
/// designated node, runs the full orchestration against ComfyUI, and
/// responds with the bytes of the first `output`-kind artifact as a
/// PNG. Every artifact of the run is also persisted under the
/// configured output directory before the response is sent.
pub async fn generate_image(
    State(state): State<AppState>,
    Form(request): Form<GenerateRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!(prompt = %request.prompt, "Generating image from prompt");

    let mut workflow = workflow::load_workflow(&state.config.workflow_path)?;
    workflow::inject_prompt(&mut workflow, &state.config.prompt_node_id, &request.prompt)?;

    let cancel = CancellationToken::new();
    let payloads = fluxgate_comfyui::generate(
        &state.client,
        &workflow,
        &state.config.output_dir,
        state.config.save_previews,
        &cancel,
    )
    .await?;

    let image = payloads
        .into_iter()
        .find(|p| p.reference.kind == ArtifactKind::Output)
        .ok_or(AppError::NoOutput)?;

    tracing::info!(
        filename = %image.reference.filename,
        bytes = image.data.len(),
        "Image generated successfully",
    );

    Ok((
        [(header::CONTENT_TYPE, "image/png")],
        image.data,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/generate_image", post(generate_image))
}
