//! Artifact materialization: fetching bytes and persisting them.
//!
//! Fetch policy: final outputs are always fetched; previews only when
//! the caller opted in. Persisted previews land under a `temp/`
//! subdirectory of the destination. A single artifact failing to fetch
//! or persist never aborts the rest of the run -- the orchestrator logs
//! it and moves on.

use std::path::{Path, PathBuf};

use crate::api::ComfyUIApi;
use crate::error::ComfyUIError;
use crate::history::{ArtifactKind, ArtifactReference};

/// Subdirectory previews are persisted under.
const PREVIEW_SUBDIR: &str = "temp";

/// One artifact's raw bytes together with its originating reference.
#[derive(Debug, Clone)]
pub struct ArtifactPayload {
    pub reference: ArtifactReference,
    pub data: Vec<u8>,
}

/// Whether an artifact of `kind` should be fetched at all.
pub fn should_fetch(kind: ArtifactKind, save_previews: bool) -> bool {
    match kind {
        ArtifactKind::Output => true,
        ArtifactKind::Temp => save_previews,
    }
}

/// Download the bytes behind `reference` via `/view`.
pub async fn materialize(
    api: &ComfyUIApi,
    reference: ArtifactReference,
) -> Result<ArtifactPayload, ComfyUIError> {
    let data = api
        .view(
            &reference.filename,
            &reference.subfolder,
            reference.kind.as_str(),
        )
        .await
        .map_err(|e| ComfyUIError::Fetch(format!("{}: {e}", reference.filename)))?;

    tracing::debug!(
        filename = %reference.filename,
        kind = reference.kind.as_str(),
        bytes = data.len(),
        "Fetched artifact",
    );

    Ok(ArtifactPayload { reference, data })
}

/// Write one payload under `dest_dir`, creating directories as needed.
///
/// Previews go to `dest_dir/temp/` when `save_previews` is set. The
/// bytes are sniffed for a recognizable image header first so corrupt
/// payloads fail here instead of producing an unreadable file. Returns
/// the path written.
pub fn persist(
    payload: &ArtifactPayload,
    dest_dir: &Path,
    save_previews: bool,
) -> Result<PathBuf, ComfyUIError> {
    let filename = &payload.reference.filename;

    let dir = if payload.reference.kind == ArtifactKind::Temp && save_previews {
        dest_dir.join(PREVIEW_SUBDIR)
    } else {
        dest_dir.to_path_buf()
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ComfyUIError::Persist(format!("creating {}: {e}", dir.display())))?;

    image::guess_format(&payload.data).map_err(|e| {
        ComfyUIError::Persist(format!("{filename} is not a recognizable image: {e}"))
    })?;

    let path = dir.join(filename);
    std::fs::write(&path, &payload.data)
        .map_err(|e| ComfyUIError::Persist(format!("writing {}: {e}", path.display())))?;

    tracing::info!(path = %path.display(), bytes = payload.data.len(), "Persisted artifact");
    Ok(path)
}

/// Persist every payload, logging and skipping failures.
///
/// Returns the number of files written. Partial success is expected:
/// one corrupt artifact must not cost the run its remaining files.
pub fn persist_all(
    payloads: &[ArtifactPayload],
    dest_dir: &Path,
    save_previews: bool,
) -> usize {
    let mut written = 0;
    for payload in payloads {
        match persist(payload, dest_dir, save_previews) {
            Ok(_) => written += 1,
            Err(e) => {
                tracing::error!(
                    filename = %payload.reference.filename,
                    error = %e,
                    "Failed to persist artifact, continuing",
                );
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// Enough of a PNG for format sniffing to succeed.
    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn payload(filename: &str, kind: ArtifactKind, data: Vec<u8>) -> ArtifactPayload {
        ArtifactPayload {
            reference: ArtifactReference {
                filename: filename.to_string(),
                subfolder: String::new(),
                kind,
            },
            data,
        }
    }

    #[test]
    fn fetch_policy_matrix() {
        assert!(should_fetch(ArtifactKind::Output, false));
        assert!(should_fetch(ArtifactKind::Output, true));
        assert!(!should_fetch(ArtifactKind::Temp, false));
        assert!(should_fetch(ArtifactKind::Temp, true));
    }

    #[test]
    fn output_persists_into_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        let p = payload("final.png", ArtifactKind::Output, PNG_MAGIC.to_vec());

        let path = persist(&p, dir.path(), false).unwrap();
        assert_eq!(path, dir.path().join("final.png"));
        assert!(path.exists());
    }

    #[test]
    fn preview_persists_into_temp_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let p = payload("step.png", ArtifactKind::Temp, PNG_MAGIC.to_vec());

        let path = persist(&p, dir.path(), true).unwrap();
        assert_eq!(path, dir.path().join("temp").join("step.png"));
        assert!(path.exists());
    }

    #[test]
    fn corrupt_bytes_fail_persist() {
        let dir = tempfile::tempdir().unwrap();
        let p = payload("broken.png", ArtifactKind::Output, vec![0, 1, 2, 3]);

        assert_matches!(persist(&p, dir.path(), false), Err(ComfyUIError::Persist(_)));
        assert!(!dir.path().join("broken.png").exists());
    }

    #[test]
    fn one_failure_does_not_block_later_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let payloads = vec![
            payload("broken.png", ArtifactKind::Output, vec![0xFF]),
            payload("good.png", ArtifactKind::Output, PNG_MAGIC.to_vec()),
        ];

        let written = persist_all(&payloads, dir.path(), false);
        assert_eq!(written, 1);
        assert!(dir.path().join("good.png").exists());
    }
}
