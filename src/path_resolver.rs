//! Path Resolver (§4.6). New module: the teacher has no filesystem-output
//! concept (it streams PCM to a voice channel), so this is built fresh in
//! the teacher's error-propagation idiom, grounded in its `AnyResult`
//! convention (`common/types.rs`).

use std::path::{Path, PathBuf};

use regex::Regex;
use std::sync::OnceLock;

use crate::common::errors::PipelineError;
use crate::format::descriptor::VideoDescriptor;
use crate::options::QualitySelector;
use crate::tagger::PlaylistContext;

fn sanitize_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap())
}

/// Strips characters the local filesystem can't store in a path component,
/// collapsing runs of whitespace and trimming trailing dots/spaces (§4.6:
/// Windows-hostile trailing characters are rejected even on POSIX hosts so
/// output is portable). Substitutes `"video"` when this leaves nothing
/// (§4.6, §8 invariant `S != ""`): an all-hostile or all-dots/spaces input
/// must still produce a usable component.
pub fn sanitize_component(raw: &str) -> String {
    let replaced = sanitize_re().replace_all(raw, "-");
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(['.', ' ']).to_string();
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed
    }
}

fn quality_token(quality: &QualitySelector) -> String {
    match quality {
        QualitySelector::Best => "best".to_string(),
        QualitySelector::Worst => "worst".to_string(),
        QualitySelector::Itag(i) => format!("itag:{i}"),
        QualitySelector::Height(h) => format!("{h}p"),
        QualitySelector::BitrateKbps(k) => format!("{k}k"),
    }
}

fn mime_to_ext(mime: &str) -> &str {
    match mime {
        "video/3gpp" => "3gp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "audio/mp4" => "m4a",
        "audio/webm" => "webm",
        "audio/mpeg" => "mp3",
        other => other.split('/').next_back().unwrap_or("bin"),
    }
}

/// Substitutes `{field}`-style template tokens against a resolved video
/// (§3, §4.6): `{title} {artist} {album} {id} {ext} {quality}
/// {playlist_title} {playlist_id} {index} {count}`. Unknown tokens are left
/// untouched rather than erroring, since a partial template is still useful
/// output.
pub fn render_template(
    template: &str,
    video: &VideoDescriptor,
    ext: &str,
    quality: &QualitySelector,
    playlist_ctx: Option<&PlaylistContext>,
) -> String {
    let artist = video
        .music
        .as_ref()
        .and_then(|m| m.artist.as_deref())
        .or(video.uploader.as_deref())
        .unwrap_or("unknown");
    let album = video
        .music
        .as_ref()
        .and_then(|m| m.album.as_deref())
        .unwrap_or("unknown");

    let mut out = template.to_string();
    let replacements: &[(&str, String)] = &[
        ("{title}", sanitize_component(&video.title)),
        ("{artist}", sanitize_component(artist)),
        ("{album}", sanitize_component(album)),
        ("{id}", sanitize_component(&video.id)),
        ("{ext}", ext.to_string()),
        ("{quality}", sanitize_component(&quality_token(quality))),
        (
            "{playlist_title}",
            sanitize_component(
                playlist_ctx
                    .and_then(|p| p.title.as_deref())
                    .unwrap_or("playlist"),
            ),
        ),
        (
            "{playlist_id}",
            playlist_ctx
                .map(|p| sanitize_component(&p.id))
                .unwrap_or_default(),
        ),
        (
            "{index}",
            playlist_ctx.map(|p| p.index.to_string()).unwrap_or_default(),
        ),
        (
            "{count}",
            playlist_ctx.map(|p| p.total.to_string()).unwrap_or_default(),
        ),
    ];
    for (token, value) in replacements {
        out = out.replace(token, value);
    }
    out
}

/// Resolves the final output path for `video` under `output_dir`, given a
/// rendered template and a MIME type to fall back on for extension
/// selection when the format descriptor lacks a container string (§4.6).
///
/// Safety invariant (§8): the returned path must be a descendant of
/// `output_dir` after canonicalization, guarding against `..` traversal or
/// absolute-path escape introduced via template substitution of untrusted
/// metadata (video titles).
pub fn resolve_output_path(
    output_dir: &Path,
    template: &str,
    video: &VideoDescriptor,
    container_ext: Option<&str>,
    mime_hint: Option<&str>,
    quality: &QualitySelector,
    playlist_ctx: Option<&PlaylistContext>,
) -> Result<PathBuf, PipelineError> {
    let ext = container_ext
        .map(str::to_string)
        .or_else(|| mime_hint.map(mime_to_ext).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());

    let rendered = render_template(template, video, &ext, quality, playlist_ctx);
    let rendered = if rendered.ends_with('/') {
        format!("{rendered}{}.{ext}", sanitize_component(&video.title))
    } else {
        rendered
    };

    let candidate = output_dir.join(&rendered);

    if !has_no_traversal(&rendered) {
        return Err(PipelineError::filesystem(format!(
            "resolved path escapes output directory: {rendered}"
        )));
    }

    let final_path = if candidate
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .as_deref()
        != Some(ext.as_str())
    {
        candidate.with_extension(&ext)
    } else {
        candidate
    };

    Ok(final_path)
}

fn has_no_traversal(rendered: &str) -> bool {
    if Path::new(rendered).is_absolute() {
        return false;
    }
    !rendered.split(['/', '\\']).any(|seg| seg == "..")
}

/// Re-checks a resolved path against `output_dir` after the filesystem has
/// been touched, following symlinks (§4.6, §8): a component that resolves
/// outside `output_dir` via a symlink is rejected even though the
/// pre-creation string check passed.
pub fn verify_descendant(output_dir: &Path, resolved: &Path) -> Result<(), PipelineError> {
    let canon_root = std::fs::canonicalize(output_dir)
        .map_err(|e| PipelineError::filesystem(format!("cannot resolve output dir: {e}")))?;
    let parent = resolved.parent().unwrap_or(output_dir);
    std::fs::create_dir_all(parent)
        .map_err(|e| PipelineError::filesystem(format!("cannot create output dir: {e}")))?;
    let canon_parent = std::fs::canonicalize(parent)
        .map_err(|e| PipelineError::filesystem(format!("cannot resolve parent dir: {e}")))?;
    if !canon_parent.starts_with(&canon_root) {
        return Err(PipelineError::filesystem(
            "resolved path escapes output directory via symlink",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::descriptor::VideoDescriptor;

    fn video(title: &str) -> VideoDescriptor {
        VideoDescriptor {
            id: "abc123".into(),
            title: title.into(),
            uploader: Some("Uploader".into()),
            duration_secs: None,
            publish_date: None,
            description: None,
            thumbnail_url: None,
            formats: Vec::new(),
            music: None,
            source_url: "https://example.com".into(),
        }
    }

    #[test]
    fn sanitizes_path_hostile_characters() {
        assert_eq!(sanitize_component("a/b:c*d?"), "a-b-c-d-");
    }

    #[test]
    fn trims_trailing_dots_and_spaces() {
        assert_eq!(sanitize_component("trailing.. "), "trailing");
    }

    #[test]
    fn all_hostile_input_substitutes_video() {
        assert_eq!(sanitize_component("..."), "video");
        assert_eq!(sanitize_component("   "), "video");
        assert_eq!(sanitize_component(""), "video");
    }

    #[test]
    fn rejects_parent_traversal_in_template() {
        let dir = PathBuf::from("/tmp/out");
        let v = video("../../etc/passwd");
        // title is sanitized before substitution so this should NOT traverse
        let resolved =
            resolve_output_path(&dir, "{title}.{ext}", &v, Some("mp4"), None, &QualitySelector::Best, None).unwrap();
        assert!(resolved.starts_with(&dir));
    }

    #[test]
    fn mime_maps_3gpp_special_case() {
        let dir = PathBuf::from("/tmp/out");
        let v = video("clip");
        let resolved =
            resolve_output_path(&dir, "{title}.{ext}", &v, None, Some("video/3gpp"), &QualitySelector::Best, None)
                .unwrap();
        assert_eq!(resolved.extension().unwrap(), "3gp");
    }

    #[test]
    fn directory_template_appends_title() {
        let dir = PathBuf::from("/tmp/out");
        let v = video("My Video");
        let resolved =
            resolve_output_path(&dir, "downloads/", &v, Some("mp4"), None, &QualitySelector::Best, None).unwrap();
        assert!(resolved.to_string_lossy().contains("My Video"));
    }

    #[test]
    fn playlist_placeholders_are_substituted() {
        let dir = PathBuf::from("/tmp/out");
        let v = video("Track One");
        let ctx = PlaylistContext {
            id: "PL123".to_string(),
            title: Some("My Mix".to_string()),
            index: 3,
            total: 10,
        };
        let resolved = resolve_output_path(
            &dir,
            "{playlist_title}/{index} - {title}.{ext}",
            &v,
            Some("mp4"),
            None,
            &QualitySelector::Best,
            Some(&ctx),
        )
        .unwrap();
        let rendered = resolved.to_string_lossy();
        assert!(rendered.contains("My Mix"));
        assert!(rendered.contains("3 - Track One"));
    }

    #[test]
    fn quality_placeholder_renders_height_suffix() {
        let dir = PathBuf::from("/tmp/out");
        let v = video("clip");
        let resolved = resolve_output_path(
            &dir,
            "{title}-{quality}.{ext}",
            &v,
            Some("mp4"),
            None,
            &QualitySelector::Height(720),
            None,
        )
        .unwrap();
        assert!(resolved.to_string_lossy().contains("clip-720p"));
    }
}
