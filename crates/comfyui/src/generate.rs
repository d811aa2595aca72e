//! One-shot generation orchestration.
//!
//! [`generate`] runs the full lifecycle against one ComfyUI instance:
//! open a session, submit the workflow, drain the event channel until
//! the completion sentinel, collect the artifact references from
//! history, fetch and persist each artifact, and close the session.
//!
//! The session is closed on every exit path, including failures in any
//! stage. No stage is retried; retry policy belongs to the caller.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::api::ComfyUIApi;
use crate::client::{ComfyUIClient, ComfyUISession};
use crate::error::ComfyUIError;
use crate::history;
use crate::outputs::{self, ArtifactPayload};
use crate::tracker::ProgressTracker;

/// Execute `workflow` and persist its artifacts under `output_dir`.
///
/// Previews (kind `temp`) are fetched and persisted only when
/// `save_previews` is set; final outputs always. Triggering `cancel`
/// while the run is draining events fails it with
/// [`ComfyUIError::Stream`].
///
/// Returns the fetched payloads (final outputs first-class, previews
/// when enabled) so callers can reuse the bytes without re-reading
/// them from disk.
pub async fn generate(
    client: &ComfyUIClient,
    workflow: &serde_json::Value,
    output_dir: &Path,
    save_previews: bool,
    cancel: &CancellationToken,
) -> Result<Vec<ArtifactPayload>, ComfyUIError> {
    let mut session = client.connect().await?;

    // The session must be released whatever happens between here and
    // the end of the run.
    let result = run(client, &mut session, workflow, output_dir, save_previews, cancel).await;
    session.close().await;
    result
}

/// The fallible body of a run, with the session held by the caller so
/// closing it cannot be skipped.
async fn run(
    client: &ComfyUIClient,
    session: &mut ComfyUISession,
    workflow: &serde_json::Value,
    output_dir: &Path,
    save_previews: bool,
    cancel: &CancellationToken,
) -> Result<Vec<ArtifactPayload>, ComfyUIError> {
    let nodes = workflow.as_object().ok_or_else(|| {
        ComfyUIError::Submission("workflow must be a node-keyed JSON object".to_string())
    })?;
    let node_ids: Vec<String> = nodes.keys().cloned().collect();

    let api = ComfyUIApi::new(session.api_url.clone());

    let submitted = api
        .submit(workflow, &session.client_id)
        .await
        .map_err(|e| ComfyUIError::Submission(e.to_string()))?;

    tracing::info!(
        prompt_id = %submitted.prompt_id,
        queue_position = submitted.number,
        nodes = node_ids.len(),
        "Workflow submitted",
    );

    let mut tracker = ProgressTracker::new(submitted.prompt_id.clone(), node_ids);
    tracker
        .run_until_done(&mut session.ws_stream, client.config().idle_timeout, cancel)
        .await?;

    let references = history::collect(&api, &submitted.prompt_id).await?;

    let mut payloads = Vec::new();
    for reference in references {
        if !outputs::should_fetch(reference.kind, save_previews) {
            tracing::debug!(
                filename = %reference.filename,
                kind = reference.kind.as_str(),
                "Skipping preview (previews disabled)",
            );
            continue;
        }
        match outputs::materialize(&api, reference).await {
            Ok(payload) => payloads.push(payload),
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch artifact, continuing");
            }
        }
    }

    let written = outputs::persist_all(&payloads, output_dir, save_previews);
    tracing::info!(
        prompt_id = %submitted.prompt_id,
        fetched = payloads.len(),
        written,
        "Run complete",
    );

    Ok(payloads)
}
