//! Resume State (§3, §6). A `<output>.resume.json` sidecar recording how
//! far a segment download got, so a re-run can pick up mid-playlist instead
//! of restarting from byte zero. New module: grounded in the teacher's
//! `serde_json`-based state persistence used for its player-state cache.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::errors::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumeState {
    pub manifest_url: String,
    pub segment_count: u64,
    pub next_index: u64,
    pub bytes_written: u64,
    #[serde(default)]
    pub init_done: bool,
}

impl ResumeState {
    pub fn fresh(manifest_url: impl Into<String>, segment_count: u64) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            segment_count,
            next_index: 0,
            bytes_written: 0,
            init_done: false,
        }
    }
}

pub fn resume_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".resume.json");
    output.with_file_name(name)
}

/// Loads a resume sidecar for `output`, discarding (returning `Ok(None)`)
/// if it's missing, unparsable, or describes a different manifest than
/// `expected_manifest_url` — a stale resume file from an unrelated prior
/// run must never be applied (§6 "discard on mismatch").
pub fn load(output: &Path, expected_manifest_url: &str) -> Option<ResumeState> {
    let path = resume_path(output);
    let raw = std::fs::read_to_string(&path).ok()?;
    let state: ResumeState = serde_json::from_str(&raw).ok()?;
    if state.manifest_url != expected_manifest_url {
        tracing::debug!(path = %path.display(), "resume sidecar manifest mismatch, discarding");
        return None;
    }
    Some(state)
}

/// Persists `state` for `output`. Callers must only ever advance
/// `next_index`/`bytes_written` monotonically between calls (§6 invariant);
/// this function itself does not enforce it since it has no prior value to
/// compare against — see the segment downloader's write loop.
pub fn save(output: &Path, state: &ResumeState) -> Result<(), PipelineError> {
    let path = resume_path(output);
    let body = serde_json::to_string_pretty(state)
        .map_err(|e| PipelineError::filesystem(format!("resume state serialize failed: {e}")))?;
    std::fs::write(&path, body)
        .map_err(|e| PipelineError::filesystem(format!("resume state write failed: {e}")))
}

pub fn discard(output: &Path) {
    let path = resume_path(output);
    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove resume sidecar");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("clip.mp4");
        let state = ResumeState {
            manifest_url: "https://example.com/m.m3u8".into(),
            segment_count: 10,
            next_index: 4,
            bytes_written: 4096,
            init_done: true,
        };
        save(&output, &state).unwrap();
        let loaded = load(&output, "https://example.com/m.m3u8").unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn mismatched_manifest_url_discards() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("clip.mp4");
        let state = ResumeState::fresh("https://example.com/a.m3u8", 5);
        save(&output, &state).unwrap();
        assert!(load(&output, "https://example.com/b.m3u8").is_none());
    }

    #[test]
    fn missing_sidecar_returns_none() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("clip.mp4");
        assert!(load(&output, "https://example.com/m.m3u8").is_none());
    }
}
