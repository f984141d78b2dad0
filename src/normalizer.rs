//! URL Normalizer (§4.1). Grounded in the teacher's
//! `sources/youtube/mod.rs` URL-pattern dispatch (host/path matching before
//! handing off to a client), generalized into a standalone, side-effect-free
//! step that runs before extractor dispatch.

use regex::Regex;
use std::sync::OnceLock;

use crate::common::errors::{Category, PipelineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedTarget {
    Url(String),
    PlaylistId(String),
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub target: NormalizedTarget,
    pub is_music: bool,
}

fn bare_playlist_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{13,42}$").unwrap())
}

/// Normalizes a raw CLI argument (§4.1):
/// - rejects empty/whitespace-only input and non-http(s) schemes as
///   `Category::InvalidUrl`;
/// - folds `music.<host>` to `www.<host>` and strips the `si` tracking
///   query parameter, setting `is_music`;
/// - folds `youtu.be`, `/live/`, and `/shorts/` paths to the canonical
///   `watch?v=` form;
/// - classifies a bare 13-42 character token as a playlist id rather than a
///   URL.
pub fn normalize(raw: &str) -> Result<Normalized, PipelineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::invalid_url("empty input"));
    }

    if bare_playlist_id_re().is_match(trimmed) && url::Url::parse(trimmed).is_err() {
        return Ok(Normalized {
            target: NormalizedTarget::PlaylistId(trimmed.to_string()),
            is_music: false,
        });
    }

    let mut url = url::Url::parse(trimmed)
        .map_err(|e| PipelineError::invalid_url(format!("unparseable URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(PipelineError::invalid_url(format!(
                "unsupported scheme: {other}"
            )));
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| PipelineError::invalid_url("URL has no host"))?
        .to_ascii_lowercase();

    let mut is_music = false;
    if let Some(rest) = host.strip_prefix("music.") {
        is_music = true;
        let new_host = format!("www.{rest}");
        url.set_host(Some(&new_host))
            .map_err(|e| PipelineError::invalid_url(format!("cannot fold host: {e}")))?;
        strip_query_param(&mut url, "si");
    }

    fold_shorthand_paths(&mut url)?;

    Ok(Normalized {
        target: NormalizedTarget::Url(url.to_string()),
        is_music,
    })
}

fn strip_query_param(url: &mut url::Url, key: &str) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if retained.is_empty() {
        url.set_query(None);
    } else {
        let qs = retained
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&qs));
    }
}

/// Folds `youtu.be/<id>`, `/live/<id>`, and `/shorts/<id>` into
/// `watch?v=<id>` on the same host, preserving any other query parameters.
fn fold_shorthand_paths(url: &mut url::Url) -> Result<(), PipelineError> {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let path = url.path().trim_start_matches('/').to_string();

    let video_id = if host == "youtu.be" {
        path.split('/').next().map(str::to_string)
    } else if let Some(rest) = path.strip_prefix("live/") {
        Some(rest.split('/').next().unwrap_or(rest).to_string())
    } else if let Some(rest) = path.strip_prefix("shorts/") {
        Some(rest.split('/').next().unwrap_or(rest).to_string())
    } else {
        None
    };

    if let Some(id) = video_id {
        if id.is_empty() {
            return Err(PipelineError::invalid_url("missing video id in shorthand URL"));
        }
        url.set_path("watch");
        let new_host = if host == "youtu.be" {
            "www.youtube.com".to_string()
        } else {
            host
        };
        url.set_host(Some(&new_host))
            .map_err(|e| PipelineError::new(Category::InvalidUrl, e.to_string()))?;
        let existing: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut qs = format!("v={id}");
        for (k, v) in existing {
            if k != "v" {
                qs.push_str(&format!("&{k}={v}"));
            }
        }
        url.set_query(Some(&qs));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_input() {
        assert!(normalize("   ").is_err());
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(normalize("ftp://example.com/x").is_err());
    }

    #[test]
    fn folds_music_host_and_strips_si() {
        let n = normalize("https://music.youtube.com/watch?v=abc123&si=xyz").unwrap();
        assert!(n.is_music);
        match n.target {
            NormalizedTarget::Url(u) => {
                assert!(u.starts_with("https://www.youtube.com/watch?v=abc123"));
                assert!(!u.contains("si="));
            }
            _ => panic!("expected Url"),
        }
    }

    #[test]
    fn folds_youtu_be_shorthand() {
        let n = normalize("https://youtu.be/dQw4w9WgXcQ").unwrap();
        match n.target {
            NormalizedTarget::Url(u) => assert!(u.contains("watch?v=dQw4w9WgXcQ")),
            _ => panic!("expected Url"),
        }
    }

    #[test]
    fn classifies_bare_playlist_id() {
        let n = normalize("PL9tY0BWXOZFuFEG_GtOBGE2gUX1qujzpBJ").unwrap();
        assert_eq!(
            n.target,
            NormalizedTarget::PlaylistId("PL9tY0BWXOZFuFEG_GtOBGE2gUX1qujzpBJ".to_string())
        );
    }

    #[test]
    fn idempotent_on_already_normalized_url() {
        let once = normalize("https://www.youtube.com/watch?v=abc123").unwrap();
        let NormalizedTarget::Url(u) = once.target.clone() else {
            panic!("expected Url")
        };
        let twice = normalize(&u).unwrap();
        assert_eq!(once.target, twice.target);
    }
}
