//! Per-run progress tracking over the event channel.
//!
//! [`ProgressTracker`] is the state machine for one submitted prompt. It
//! consumes decoded [`ExecutionEvent`]s, maintains the set of finished
//! nodes for progress reporting, and transitions to done on exactly one
//! trigger: an `executing` event with no node and a matching prompt id.
//! Counting finished nodes against the workflow's node set is *not* a
//! completion signal -- cached and branching paths make the count
//! unreliable -- so the sentinel is the sole transition to done.
//!
//! The protocol only carries a prompt id on `executing` (and error)
//! events; `progress` and `execution_cached` are assumed to belong to
//! the tracked prompt. That assumption holds because every run owns its
//! own session (client id + WebSocket), so no other run's events share
//! this channel.

use std::collections::HashSet;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::error::ComfyUIError;
use crate::events::{parse_event, ExecutionEvent};

/// Lifecycle of a tracked prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Still draining events; the completion sentinel has not arrived.
    AwaitingEvents,
    /// The completion sentinel for the tracked prompt was observed.
    Done,
}

/// State machine tracking execution of one submitted prompt.
pub struct ProgressTracker {
    prompt_id: String,
    /// Number of nodes in the submitted workflow, for progress display.
    expected_nodes: usize,
    /// Nodes observed as finished (executed or served from cache).
    /// Grows monotonically; duplicates are no-ops.
    finished: HashSet<String>,
    state: TrackerState,
}

impl ProgressTracker {
    /// Track the prompt identified by `prompt_id`, expecting the given
    /// workflow node ids.
    pub fn new(prompt_id: impl Into<String>, node_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            expected_nodes: node_ids.into_iter().count(),
            finished: HashSet::new(),
            state: TrackerState::AwaitingEvents,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Whether the completion sentinel has been observed.
    pub fn is_done(&self) -> bool {
        self.state == TrackerState::Done
    }

    /// Number of nodes observed as finished so far.
    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    /// Apply one decoded event to the state machine.
    ///
    /// Once done, further events are ignored entirely.
    pub fn observe(&mut self, event: &ExecutionEvent) {
        if self.is_done() {
            return;
        }

        match event {
            ExecutionEvent::Progress(step) => {
                tracing::info!(
                    prompt_id = %self.prompt_id,
                    step = step.value,
                    total_steps = step.max,
                    "Sampler progress",
                );
            }
            ExecutionEvent::ExecutionCached(cached) => {
                for node in &cached.nodes {
                    self.mark_finished(node);
                }
            }
            ExecutionEvent::Executing(executing) => match &executing.node {
                Some(node) => self.mark_finished(node),
                None if executing.prompt_id == self.prompt_id => {
                    tracing::info!(
                        prompt_id = %self.prompt_id,
                        finished = self.finished.len(),
                        "Execution complete",
                    );
                    self.state = TrackerState::Done;
                }
                None => {
                    // Completion sentinel for some other prompt on a
                    // shared server; not ours to act on.
                    tracing::debug!(
                        prompt_id = %self.prompt_id,
                        other_prompt_id = %executing.prompt_id,
                        "Ignoring completion sentinel for a different prompt",
                    );
                }
            },
            ExecutionEvent::ExecutionStart(start) => {
                tracing::info!(prompt_id = %start.prompt_id, "Execution started");
            }
            ExecutionEvent::Executed(output) => {
                tracing::debug!(
                    prompt_id = %output.prompt_id,
                    node = %output.node,
                    "Node produced output",
                );
            }
            ExecutionEvent::ExecutionError(failure) => {
                // Logged for observability only. The server still emits
                // the completion sentinel afterwards, and the idle
                // timeout bounds the case where it does not.
                tracing::error!(
                    prompt_id = %failure.prompt_id,
                    node_id = %failure.node_id,
                    error_type = %failure.exception_type,
                    error = %failure.exception_message,
                    "Node execution failed on server",
                );
            }
            ExecutionEvent::Status(status) => {
                tracing::debug!(
                    queue_remaining = status.status.exec_info.queue_remaining,
                    "Queue status",
                );
            }
        }
    }

    /// Drain `stream` until the completion sentinel arrives.
    ///
    /// Frame handling:
    /// - text frames are decoded via [`parse_event`]; decode failures
    ///   are logged and skipped,
    /// - binary frames are in-flight preview images and are ignored,
    /// - a close frame, exhausted stream, or receive error before
    ///   completion fails with [`ComfyUIError::Stream`],
    /// - so does `idle_timeout` elapsing without a frame, or `cancel`
    ///   being triggered. The blocking receive can therefore never hang
    ///   an unbounded amount of time.
    pub async fn run_until_done<S>(
        &mut self,
        stream: &mut S,
        idle_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ComfyUIError>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        while !self.is_done() {
            let frame = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ComfyUIError::Stream("run cancelled".to_string()));
                }
                frame = tokio::time::timeout(idle_timeout, stream.next()) => frame,
            };

            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    return Err(ComfyUIError::Stream(
                        "event channel ended before completion".to_string(),
                    ));
                }
                Err(_) => {
                    return Err(ComfyUIError::Stream(format!(
                        "no event within {}s while awaiting completion",
                        idle_timeout.as_secs()
                    )));
                }
            };

            match frame {
                Ok(Message::Text(text)) => match parse_event(&text) {
                    Ok(event) => self.observe(&event),
                    Err(e) => {
                        tracing::warn!(
                            prompt_id = %self.prompt_id,
                            error = %e,
                            raw_message = %text,
                            "Unrecognized event on channel",
                        );
                    }
                },
                Ok(Message::Binary(payload)) => {
                    tracing::trace!(
                        prompt_id = %self.prompt_id,
                        bytes = payload.len(),
                        "Ignoring binary frame (preview image)",
                    );
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Handled automatically by tungstenite.
                }
                Ok(Message::Close(close)) => {
                    return Err(ComfyUIError::Stream(format!(
                        "event channel closed before completion: {close:?}"
                    )));
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    return Err(ComfyUIError::Stream(format!("receive failed: {e}")));
                }
            }
        }

        Ok(())
    }

    fn mark_finished(&mut self, node: &str) {
        if self.finished.insert(node.to_string()) {
            tracing::info!(
                prompt_id = %self.prompt_id,
                finished = self.finished.len(),
                expected = self.expected_nodes,
                node = %node,
                "Node finished",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CachedNodes, ExecutingNode, StepProgress};

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(
            "prompt-1",
            ["1", "2", "3", "6"].map(String::from),
        )
    }

    fn executing(node: Option<&str>, prompt_id: &str) -> ExecutionEvent {
        ExecutionEvent::Executing(ExecutingNode {
            node: node.map(String::from),
            prompt_id: prompt_id.to_string(),
        })
    }

    #[test]
    fn done_only_on_matching_sentinel() {
        let mut t = tracker();
        t.observe(&executing(Some("1"), "prompt-1"));
        t.observe(&executing(Some("2"), "prompt-1"));
        assert_eq!(t.state(), TrackerState::AwaitingEvents);

        t.observe(&executing(None, "prompt-1"));
        assert_eq!(t.state(), TrackerState::Done);
    }

    #[test]
    fn foreign_sentinel_does_not_finish() {
        let mut t = tracker();
        t.observe(&executing(None, "someone-elses-prompt"));
        assert_eq!(t.state(), TrackerState::AwaitingEvents);
    }

    #[test]
    fn finished_set_is_monotone_under_duplicates() {
        let mut t = tracker();
        t.observe(&executing(Some("1"), "prompt-1"));
        t.observe(&executing(Some("1"), "prompt-1"));
        assert_eq!(t.finished_count(), 1);

        t.observe(&ExecutionEvent::ExecutionCached(CachedNodes {
            prompt_id: "prompt-1".to_string(),
            nodes: vec!["1".to_string(), "2".to_string()],
        }));
        assert_eq!(t.finished_count(), 2);
    }

    #[test]
    fn cached_nodes_count_as_finished() {
        let mut t = tracker();
        t.observe(&ExecutionEvent::ExecutionCached(CachedNodes {
            prompt_id: "prompt-1".to_string(),
            nodes: vec!["2".to_string(), "3".to_string()],
        }));
        assert_eq!(t.finished_count(), 2);
        assert_eq!(t.state(), TrackerState::AwaitingEvents);
    }

    #[test]
    fn progress_events_do_not_change_state() {
        let mut t = tracker();
        t.observe(&ExecutionEvent::Progress(StepProgress { value: 3, max: 20 }));
        assert_eq!(t.finished_count(), 0);
        assert_eq!(t.state(), TrackerState::AwaitingEvents);
    }

    #[test]
    fn events_after_done_are_ignored() {
        let mut t = tracker();
        t.observe(&executing(None, "prompt-1"));
        assert!(t.is_done());

        t.observe(&executing(Some("99"), "prompt-1"));
        assert_eq!(t.finished_count(), 0);
        assert!(t.is_done());
    }
}
