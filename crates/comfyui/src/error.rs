//! Run-level error taxonomy for a single orchestration run.
//!
//! Every stage of a run maps its failures into one of these variants.
//! All variants except [`Fetch`](ComfyUIError::Fetch) and
//! [`Persist`](ComfyUIError::Persist) are fatal to the run and propagate
//! unchanged to the caller; fetch and persist failures are per-artifact
//! and are logged and skipped by the orchestrator.

/// Errors that can occur while orchestrating a generation run.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIError {
    /// Failed to open the WebSocket event channel.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The workflow submission was malformed or rejected. Not retried.
    #[error("Submission error: {0}")]
    Submission(String),

    /// The event channel closed, broke, or went idle before the
    /// completion sentinel arrived.
    #[error("Event stream error: {0}")]
    Stream(String),

    /// The history record for a completed prompt could not be retrieved.
    #[error("History error: {0}")]
    History(String),

    /// Fetching one artifact's bytes failed. Per-artifact, non-fatal.
    #[error("Artifact fetch error: {0}")]
    Fetch(String),

    /// Writing one artifact to disk failed. Per-artifact, non-fatal.
    #[error("Artifact persist error: {0}")]
    Persist(String),
}
