//! Typed decode of the ComfyUI event channel.
//!
//! Text frames on the WebSocket carry JSON of the shape
//! `{"type": "<tag>", "data": {...}}`. [`parse_event`] turns them into a
//! closed [`ExecutionEvent`] enum; unknown tags and malformed JSON come
//! back as `Err` so the caller can log them instead of silently dropping
//! them. Binary frames (in-flight preview images) are not events and
//! never reach this module.

use serde::Deserialize;

/// One decoded event from the ComfyUI event channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ExecutionEvent {
    /// Step-level progress from a long-running node (e.g. the sampler).
    #[serde(rename = "progress")]
    Progress(StepProgress),

    /// The server began executing a queued prompt.
    #[serde(rename = "execution_start")]
    ExecutionStart(PromptRef),

    /// Nodes whose outputs were served from the server-side cache.
    #[serde(rename = "execution_cached")]
    ExecutionCached(CachedNodes),

    /// A node is executing. A `node` of `None` is the completion
    /// sentinel for the prompt named in `prompt_id`.
    #[serde(rename = "executing")]
    Executing(ExecutingNode),

    /// A node finished and produced output.
    #[serde(rename = "executed")]
    Executed(NodeOutputRef),

    /// Execution of a node failed on the server.
    #[serde(rename = "execution_error")]
    ExecutionError(ExecutionFailure),

    /// Periodic queue statistics broadcast.
    #[serde(rename = "status")]
    Status(QueueStatus),
}

/// Payload of `progress` events.
#[derive(Debug, Clone, Deserialize)]
pub struct StepProgress {
    /// Current step number.
    pub value: i32,
    /// Total number of steps.
    pub max: i32,
}

/// Payload of `execution_start` events.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptRef {
    pub prompt_id: String,
}

/// Payload of `execution_cached` events.
#[derive(Debug, Clone, Deserialize)]
pub struct CachedNodes {
    pub prompt_id: String,
    /// Node ids satisfied from cache, already finished from the
    /// tracker's point of view.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Payload of `executing` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingNode {
    /// The node now running, or `None` when the prompt has completed.
    pub node: Option<String>,
    pub prompt_id: String,
}

/// Payload of `executed` events.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeOutputRef {
    pub node: String,
    /// Raw per-node output (image references etc.). The authoritative
    /// output listing is read from the history record after completion.
    pub output: serde_json::Value,
    pub prompt_id: String,
}

/// Payload of `execution_error` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionFailure {
    pub prompt_id: String,
    pub node_id: String,
    pub exception_message: String,
    pub exception_type: String,
}

/// Payload of `status` events.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatus {
    pub status: QueueState,
}

/// Queue state wrapper inside `status` events.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueState {
    pub exec_info: QueueExecInfo,
}

/// Execution queue statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueExecInfo {
    pub queue_remaining: i32,
}

/// Decode one text frame into an [`ExecutionEvent`].
///
/// `Err` means malformed JSON or an unrecognized `type` tag; callers
/// should log it and keep reading.
pub fn parse_event(text: &str) -> Result<ExecutionEvent, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_progress() {
        let event =
            parse_event(r#"{"type":"progress","data":{"value":7,"max":25}}"#).unwrap();
        match event {
            ExecutionEvent::Progress(p) => {
                assert_eq!(p.value, 7);
                assert_eq!(p.max, 25);
            }
            other => panic!("expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn decodes_cached_nodes() {
        let event = parse_event(
            r#"{"type":"execution_cached","data":{"prompt_id":"p-1","nodes":["3","4"]}}"#,
        )
        .unwrap();
        match event {
            ExecutionEvent::ExecutionCached(c) => {
                assert_eq!(c.prompt_id, "p-1");
                assert_eq!(c.nodes, vec!["3", "4"]);
            }
            other => panic!("expected ExecutionCached, got {other:?}"),
        }
    }

    #[test]
    fn cached_nodes_field_defaults_to_empty() {
        let event =
            parse_event(r#"{"type":"execution_cached","data":{"prompt_id":"p-1"}}"#).unwrap();
        match event {
            ExecutionEvent::ExecutionCached(c) => assert!(c.nodes.is_empty()),
            other => panic!("expected ExecutionCached, got {other:?}"),
        }
    }

    #[test]
    fn decodes_executing_node() {
        let event =
            parse_event(r#"{"type":"executing","data":{"node":"6","prompt_id":"p-1"}}"#).unwrap();
        match event {
            ExecutionEvent::Executing(e) => {
                assert_eq!(e.node.as_deref(), Some("6"));
                assert_eq!(e.prompt_id, "p-1");
            }
            other => panic!("expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn decodes_completion_sentinel() {
        let event =
            parse_event(r#"{"type":"executing","data":{"node":null,"prompt_id":"p-1"}}"#).unwrap();
        match event {
            ExecutionEvent::Executing(e) => assert!(e.node.is_none()),
            other => panic!("expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn decodes_execution_error() {
        let event = parse_event(
            r#"{"type":"execution_error","data":{"prompt_id":"p-1","node_id":"9","exception_message":"CUDA out of memory","exception_type":"RuntimeError"}}"#,
        )
        .unwrap();
        match event {
            ExecutionEvent::ExecutionError(f) => {
                assert_eq!(f.node_id, "9");
                assert_eq!(f.exception_type, "RuntimeError");
            }
            other => panic!("expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn decodes_queue_status() {
        let event = parse_event(
            r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":1}}}}"#,
        )
        .unwrap();
        match event {
            ExecutionEvent::Status(s) => {
                assert_eq!(s.status.exec_info.queue_remaining, 1);
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(parse_event(r#"{"type":"crystools.monitor","data":{}}"#).is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_event("{{nope").is_err());
    }
}
