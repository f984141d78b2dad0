//! Tagger (§4.14, §6). Writes the `<output>.json` sidecar on every
//! terminal outcome (success, failure, or skip) and, optionally, hands off
//! to an external tag embedder — out of scope for this crate's own code
//! per §1, so this module only prepares the call surface. Grounded in the
//! teacher's `serde`-derived config/record types (`configs/mod.rs`).

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::errors::PipelineError;
use crate::format::descriptor::VideoDescriptor;

pub const EXTRACTOR_NAME: &str = "vodget";
pub const EXTRACTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistContext {
    pub id: String,
    pub title: Option<String>,
    pub index: usize,
    pub total: usize,
}

/// The `<output>.json` sidecar record (§6). Field set is fixed by the
/// on-disk contract; do not add fields other collaborators don't expect.
#[derive(Debug, Clone, Serialize)]
pub struct SidecarRecord {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub author: Option<String>,
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc: Option<u32>,
    pub release_date: Option<String>,
    pub release_year: Option<i32>,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub source_url: String,
    pub extractor: String,
    pub extractor_version: String,
    pub output: PathBuf,
    pub format: Option<String>,
    pub quality: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist: Option<PlaylistContext>,
    pub warnings: Vec<String>,
}

impl SidecarRecord {
    pub fn for_success(
        video: &VideoDescriptor,
        extractor_name: &str,
        output: &Path,
        format_label: Option<String>,
        quality_label: Option<String>,
        playlist: Option<PlaylistContext>,
        warnings: Vec<String>,
    ) -> Self {
        let release_year = video
            .music
            .as_ref()
            .and_then(|m| m.release_date)
            .map(|d| chrono::Datelike::year(&d));
        Self {
            id: video.id.clone(),
            title: video.title.clone(),
            artist: video.music.as_ref().and_then(|m| m.artist.clone()),
            author: video.uploader.clone(),
            album: video.music.as_ref().and_then(|m| m.album.clone()),
            track: video.music.as_ref().and_then(|m| m.track_number),
            disc: None,
            release_date: video
                .music
                .as_ref()
                .and_then(|m| m.release_date)
                .map(|d| d.format("%Y-%m-%d").to_string()),
            release_year,
            duration_seconds: video.duration_secs,
            thumbnail_url: video.thumbnail_url.clone(),
            source_url: video.source_url.clone(),
            extractor: extractor_name.to_string(),
            extractor_version: EXTRACTOR_VERSION.to_string(),
            output: output.to_path_buf(),
            format: format_label,
            quality: quality_label,
            status: "ok".to_string(),
            error: None,
            playlist,
            warnings,
        }
    }

    pub fn for_failure(
        source_url: &str,
        extractor_name: &str,
        status: &str,
        error: impl Into<String>,
        playlist: Option<PlaylistContext>,
    ) -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            artist: None,
            author: None,
            album: None,
            track: None,
            disc: None,
            release_date: None,
            release_year: None,
            duration_seconds: None,
            thumbnail_url: None,
            source_url: source_url.to_string(),
            extractor: extractor_name.to_string(),
            extractor_version: EXTRACTOR_VERSION.to_string(),
            output: PathBuf::new(),
            format: None,
            quality: None,
            status: status.to_string(),
            error: Some(error.into()),
            playlist,
            warnings: Vec::new(),
        }
    }
}

/// Sidecar path for a given output artifact: `<output>.json`, sharing the
/// basename and adding the extension (§6 glossary: "Sidecar").
pub fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".json");
    output.with_file_name(name)
}

pub async fn write_sidecar(output: &Path, record: &SidecarRecord) -> Result<(), PipelineError> {
    let path = sidecar_path(output);
    let body = serde_json::to_string_pretty(record)
        .map_err(|e| PipelineError::filesystem(format!("sidecar serialize failed: {e}")))?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| PipelineError::filesystem(format!("sidecar write failed: {e}")))
}

/// Hook for an external tag-embedding collaborator (§1: out of scope for
/// this crate's own implementation). A no-op unless `embedder_path` is
/// configured; failures are logged and never fail the overall download.
pub async fn embed_tags_if_configured(
    embedder_path: Option<&Path>,
    output: &Path,
    record: &SidecarRecord,
) {
    let Some(embedder) = embedder_path else {
        return;
    };
    let sidecar = sidecar_path(output);
    let status = tokio::process::Command::new(embedder)
        .arg(output)
        .arg(&sidecar)
        .status()
        .await;
    match status {
        Ok(s) if s.success() => {}
        Ok(s) => tracing::warn!(status = ?s, "tag embedder exited non-zero"),
        Err(e) => tracing::warn!(error = %e, "failed to launch tag embedder"),
    }
    let _ = record;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn video() -> VideoDescriptor {
        VideoDescriptor {
            id: "abc123".into(),
            title: "Title".into(),
            uploader: Some("Uploader".into()),
            duration_secs: Some(120),
            publish_date: None,
            description: None,
            thumbnail_url: None,
            formats: Vec::new(),
            music: None,
            source_url: "https://example.com/watch?v=abc123".into(),
        }
    }

    #[tokio::test]
    async fn writes_sidecar_alongside_output() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("abc123.mp4");
        let record = SidecarRecord::for_success(&video(), "youtube", &output, Some("mp4".into()), Some("best".into()), None, Vec::new());
        write_sidecar(&output, &record).await.unwrap();
        assert!(sidecar_path(&output).exists());
    }

    #[test]
    fn sidecar_path_appends_json_to_full_name() {
        let output = PathBuf::from("/tmp/out/abc123.mp4");
        assert_eq!(sidecar_path(&output), PathBuf::from("/tmp/out/abc123.mp4.json"));
    }
}
