//! Output Validator (§4.11). A cheap sanity check after a download
//! completes: a zero-byte file is always wrong, and a container whose
//! extension we recognize should carry that container's magic bytes. New
//! module grounded in the teacher's `ContainerKind` enum (`common/types.rs`)
//! and its io-error propagation idiom.

use std::path::Path;

use crate::common::errors::PipelineError;
use crate::common::types::ContainerKind;

const MAGIC_READ_LEN: usize = 189;
const MOOV_SCAN_LEN: usize = 1024 * 1024;

/// Validates that `path` looks like a well-formed file of the container its
/// extension implies (§4.11). Does not attempt to validate stream/codec
/// correctness, only container framing. `mime_hint`, when present, is the
/// selected format's MIME type: for an unrecognized extension that
/// indicates mp4, MP4 validation applies instead of a pass-through (§4.11's
/// "unknown extensions pass through unless the selected format's mime
/// indicates mp4" override).
pub async fn validate_output(path: &Path, mime_hint: Option<&str>) -> Result<(), PipelineError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| PipelineError::filesystem(format!("cannot stat output file: {e}")))?;

    if meta.len() == 0 {
        return Err(PipelineError::unsupported("downloaded file is empty"));
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let mut kind = ContainerKind::from_ext(&ext);

    if kind == ContainerKind::Unknown && mime_hint.is_some_and(|m| m.eq_ignore_ascii_case("video/mp4")) {
        kind = ContainerKind::Mp4;
    }

    if kind == ContainerKind::Unknown {
        return Ok(());
    }

    let header = read_magic(path).await?;
    if !matches_container(kind, &header) {
        return Err(PipelineError::unsupported(format!(
            "output does not look like a valid {ext} file"
        )));
    }

    if kind == ContainerKind::Mp4 && !scan_for_moov_or_moof(path).await? {
        return Err(PipelineError::unsupported(
            "mp4 output has no moov/moof box within the first 1 MiB",
        ));
    }

    Ok(())
}

async fn read_magic(path: &Path) -> Result<Vec<u8>, PipelineError> {
    use tokio::io::AsyncReadExt;
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| PipelineError::filesystem(format!("cannot open output for validation: {e}")))?;
    let mut buf = vec![0u8; MAGIC_READ_LEN];
    let n = file
        .read(&mut buf)
        .await
        .map_err(|e| PipelineError::filesystem(format!("cannot read output for validation: {e}")))?;
    buf.truncate(n);
    Ok(buf)
}

/// Scans the first `MOOV_SCAN_LEN` bytes for a `moov` or `moof` atom name
/// (§4.11): a valid mp4 carries one of these boxes near the front even when
/// metadata (`moov`) sits after the media data, as long as it's within the
/// first megabyte.
async fn scan_for_moov_or_moof(path: &Path) -> Result<bool, PipelineError> {
    use tokio::io::AsyncReadExt;
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| PipelineError::filesystem(format!("cannot open output for validation: {e}")))?;
    let mut buf = vec![0u8; MOOV_SCAN_LEN];
    let n = file
        .read(&mut buf)
        .await
        .map_err(|e| PipelineError::filesystem(format!("cannot read output for validation: {e}")))?;
    buf.truncate(n);
    Ok(buf.windows(4).any(|w| w == b"moov" || w == b"moof"))
}

fn matches_container(kind: ContainerKind, header: &[u8]) -> bool {
    match kind {
        ContainerKind::Mp4 => header.len() >= 8 && &header[4..8] == b"ftyp",
        ContainerKind::WebmMkv => header.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]),
        ContainerKind::Ts => header.first() == Some(&0x47) && header.get(188) == Some(&0x47),
        ContainerKind::Mp3 => {
            header.starts_with(b"ID3") || (header.len() >= 2 && header[0] == 0xFF && header[1] & 0xE0 == 0xE0)
        }
        ContainerKind::Unknown => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn mp4_with_moov() -> Vec<u8> {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(b"moov");
        data
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.mp4");
        tokio::fs::write(&path, b"").await.unwrap();
        assert!(validate_output(&path, None).await.is_err());
    }

    #[tokio::test]
    async fn valid_mp4_magic_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, mp4_with_moov()).await.unwrap();
        assert!(validate_output(&path, None).await.is_ok());
    }

    #[tokio::test]
    async fn mp4_without_moov_or_moof_within_first_mib_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let mut data = vec![0u8; 4];
        data.extend_from_slice(b"ftypisom");
        data.extend(std::iter::repeat(0u8).take(1024 * 1024));
        tokio::fs::write(&path, &data).await.unwrap();
        assert!(validate_output(&path, None).await.is_err());
    }

    #[tokio::test]
    async fn mismatched_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, b"not an mp4 at all").await.unwrap();
        assert!(validate_output(&path, None).await.is_err());
    }

    #[tokio::test]
    async fn unknown_extension_passes_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.bin");
        tokio::fs::write(&path, b"whatever").await.unwrap();
        assert!(validate_output(&path, None).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_extension_with_mp4_mime_hint_applies_mp4_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.bin");
        tokio::fs::write(&path, mp4_with_moov()).await.unwrap();
        assert!(validate_output(&path, Some("video/mp4")).await.is_ok());

        let path2 = dir.path().join("clip2.bin");
        tokio::fs::write(&path2, b"not an mp4 at all").await.unwrap();
        assert!(validate_output(&path2, Some("video/mp4")).await.is_err());
    }

    #[tokio::test]
    async fn ts_requires_sync_byte_at_0_and_188() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.ts");
        let mut good = vec![0u8; 189];
        good[0] = 0x47;
        good[188] = 0x47;
        tokio::fs::write(&path, &good).await.unwrap();
        assert!(validate_output(&path, None).await.is_ok());

        let path2 = dir.path().join("bad.ts");
        let mut bad = vec![0u8; 189];
        bad[0] = 0x47;
        bad[188] = 0x00;
        tokio::fs::write(&path2, &bad).await.unwrap();
        assert!(validate_output(&path2, None).await.is_err());
    }
}
