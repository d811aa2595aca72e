//! Artifact collection from a prompt's history record.
//!
//! After the tracker reports completion, the authoritative listing of
//! produced files is the history record (`GET /history/{prompt_id}`):
//! a map keyed by prompt id whose entry carries a node-keyed `outputs`
//! map. This module walks that record and produces classified
//! [`ArtifactReference`]s, in deterministic (sorted node id) order.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::api::ComfyUIApi;
use crate::error::ComfyUIError;

/// Classification of a produced file, from the history entry's
/// declared `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A final output of the workflow.
    Output,
    /// An intermediate preview, kept by the server in its temp folder.
    Temp,
}

impl ArtifactKind {
    /// Wire name of the kind, as used by `/history` and `/view`.
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Output => "output",
            ArtifactKind::Temp => "temp",
        }
    }

    /// Classify a declared `type` string. `None` for kinds this client
    /// does not handle (e.g. `input`).
    pub fn classify(kind: &str) -> Option<Self> {
        match kind {
            "output" => Some(ArtifactKind::Output),
            "temp" => Some(ArtifactKind::Temp),
            _ => None,
        }
    }
}

/// A reference to one produced file, addressable via `/view`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub filename: String,
    pub subfolder: String,
    pub kind: ArtifactKind,
}

/// History entry for one prompt: node id -> outputs produced there.
#[derive(Debug, Deserialize)]
struct HistoryEntry {
    #[serde(default)]
    outputs: BTreeMap<String, NodeOutputs>,
}

/// Outputs recorded for a single node. Only image outputs carry
/// artifacts this client retrieves.
#[derive(Debug, Deserialize)]
struct NodeOutputs {
    #[serde(default)]
    images: Vec<ImageEntry>,
}

/// One image entry inside a node's output listing.
#[derive(Debug, Deserialize)]
struct ImageEntry {
    filename: String,
    #[serde(default)]
    subfolder: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Fetch the history record for `prompt_id` and extract its artifact
/// references.
///
/// Fails with [`ComfyUIError::History`] when the record cannot be
/// fetched or does not contain the prompt -- the latter should not
/// happen after a completed run, but a desynced backend must not panic
/// this client.
pub async fn collect(
    api: &ComfyUIApi,
    prompt_id: &str,
) -> Result<Vec<ArtifactReference>, ComfyUIError> {
    let record = api
        .history(prompt_id)
        .await
        .map_err(|e| ComfyUIError::History(e.to_string()))?;

    references_from_record(&record, prompt_id)
}

/// Extract artifact references from an already-fetched history record.
///
/// Image entries with a `type` other than `output`/`temp` are logged
/// and skipped rather than failing the run.
pub fn references_from_record(
    record: &serde_json::Value,
    prompt_id: &str,
) -> Result<Vec<ArtifactReference>, ComfyUIError> {
    let entry = record.get(prompt_id).ok_or_else(|| {
        ComfyUIError::History(format!("no history record for prompt {prompt_id}"))
    })?;

    let entry: HistoryEntry = serde_json::from_value(entry.clone())
        .map_err(|e| ComfyUIError::History(format!("malformed history record: {e}")))?;

    let mut references = Vec::new();
    for (node_id, outputs) in &entry.outputs {
        for image in &outputs.images {
            match ArtifactKind::classify(&image.kind) {
                Some(kind) => references.push(ArtifactReference {
                    filename: image.filename.clone(),
                    subfolder: image.subfolder.clone(),
                    kind,
                }),
                None => {
                    tracing::warn!(
                        prompt_id = %prompt_id,
                        node_id = %node_id,
                        filename = %image.filename,
                        kind = %image.kind,
                        "Skipping artifact of unhandled kind",
                    );
                }
            }
        }
    }

    tracing::info!(
        prompt_id = %prompt_id,
        artifacts = references.len(),
        "Collected artifact references from history",
    );

    Ok(references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn record() -> serde_json::Value {
        json!({
            "prompt-1": {
                "outputs": {
                    "9": {
                        "images": [
                            {"filename": "flux_00001_.png", "subfolder": "", "type": "output"}
                        ]
                    },
                    "12": {
                        "images": [
                            {"filename": "preview_00001.png", "subfolder": "previews", "type": "temp"}
                        ]
                    },
                    "3": {}
                }
            }
        })
    }

    #[test]
    fn extracts_and_classifies_entries() {
        let refs = references_from_record(&record(), "prompt-1").unwrap();
        assert_eq!(refs.len(), 2);

        // BTreeMap walk: node "12" sorts before node "9".
        assert_eq!(refs[0].filename, "preview_00001.png");
        assert_eq!(refs[0].subfolder, "previews");
        assert_eq!(refs[0].kind, ArtifactKind::Temp);

        assert_eq!(refs[1].filename, "flux_00001_.png");
        assert_eq!(refs[1].kind, ArtifactKind::Output);
    }

    #[test]
    fn missing_prompt_is_a_history_error() {
        let result = references_from_record(&record(), "prompt-2");
        assert_matches!(result, Err(ComfyUIError::History(_)));
    }

    #[test]
    fn nodes_without_images_contribute_nothing() {
        let record = json!({"prompt-1": {"outputs": {"3": {"text": ["hello"]}}}});
        let refs = references_from_record(&record, "prompt-1").unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn unknown_kinds_are_skipped() {
        let record = json!({
            "prompt-1": {
                "outputs": {
                    "5": {"images": [
                        {"filename": "a.png", "subfolder": "", "type": "input"},
                        {"filename": "b.png", "subfolder": "", "type": "output"}
                    ]}
                }
            }
        });
        let refs = references_from_record(&record, "prompt-1").unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].filename, "b.png");
    }

    #[test]
    fn classify_rejects_unknown_strings() {
        assert_eq!(ArtifactKind::classify("output"), Some(ArtifactKind::Output));
        assert_eq!(ArtifactKind::classify("temp"), Some(ArtifactKind::Temp));
        assert_eq!(ArtifactKind::classify("input"), None);
    }
}
