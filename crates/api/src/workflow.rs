//! Workflow template loading and prompt injection.
//!
//! A workflow template is a node-keyed JSON document stored on disk.
//! The server loads it per request and writes the user's prompt text
//! into the designated node's `inputs.text` field before handing the
//! document to the orchestration core, which treats it as opaque.

use std::path::Path;

/// Errors from template loading and prompt injection.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The template file could not be read.
    #[error("Workflow template not readable at {path}: {source}")]
    NotReadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The template file is not valid JSON.
    #[error("Workflow template at {path} is not valid JSON: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The designated prompt node is missing or not shaped as expected.
    #[error("Workflow has no injectable node {0} (expected an object with an `inputs` map)")]
    PromptNodeMissing(String),
}

/// Load a workflow template from `path`.
pub fn load_workflow(path: &Path) -> Result<serde_json::Value, WorkflowError> {
    let text = std::fs::read_to_string(path).map_err(|source| WorkflowError::NotReadable {
        path: path.display().to_string(),
        source,
    })?;

    serde_json::from_str(&text).map_err(|source| WorkflowError::InvalidJson {
        path: path.display().to_string(),
        source,
    })
}

/// Write `prompt` into `inputs.text` of node `node_id`.
pub fn inject_prompt(
    workflow: &mut serde_json::Value,
    node_id: &str,
    prompt: &str,
) -> Result<(), WorkflowError> {
    let inputs = workflow
        .get_mut(node_id)
        .and_then(|node| node.get_mut("inputs"))
        .and_then(|inputs| inputs.as_object_mut())
        .ok_or_else(|| WorkflowError::PromptNodeMissing(node_id.to_string()))?;

    inputs.insert("text".to_string(), serde_json::Value::String(prompt.to_string()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::io::Write;

    fn template() -> serde_json::Value {
        json!({
            "6": {
                "class_type": "CLIPTextEncode",
                "inputs": {"text": "placeholder", "clip": ["11", 0]}
            },
            "9": {
                "class_type": "SaveImage",
                "inputs": {"images": ["8", 0]}
            }
        })
    }

    #[test]
    fn injects_prompt_into_designated_node() {
        let mut workflow = template();
        inject_prompt(&mut workflow, "6", "a lighthouse at dusk").unwrap();
        assert_eq!(workflow["6"]["inputs"]["text"], "a lighthouse at dusk");
        // Other inputs untouched.
        assert_eq!(workflow["6"]["inputs"]["clip"], json!(["11", 0]));
    }

    #[test]
    fn missing_node_is_an_error() {
        let mut workflow = template();
        let result = inject_prompt(&mut workflow, "42", "anything");
        assert_matches!(result, Err(WorkflowError::PromptNodeMissing(_)));
    }

    #[test]
    fn node_without_inputs_is_an_error() {
        let mut workflow = json!({"6": "not an object"});
        let result = inject_prompt(&mut workflow, "6", "anything");
        assert_matches!(result, Err(WorkflowError::PromptNodeMissing(_)));
    }

    #[test]
    fn loads_template_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", template()).unwrap();

        let workflow = load_workflow(file.path()).unwrap();
        assert!(workflow.get("6").is_some());
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = load_workflow(Path::new("/nonexistent/workflow.json"));
        assert_matches!(result, Err(WorkflowError::NotReadable { .. }));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let result = load_workflow(file.path());
        assert_matches!(result, Err(WorkflowError::InvalidJson { .. }));
    }
}
