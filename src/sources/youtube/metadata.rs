//! Music-service enrichment (§4.4, §B). Non-fatal best-effort pass: scrapes
//! the watch page for `ytInitialData`, walks its "Music in this video"
//! panel, and maps what it finds onto `MusicMetadata`. Grounded in the
//! teacher's extractor-style JSON tree walking
//! (`sources/youtube/extractor.rs`), applied to a different panel shape.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use crate::common::errors::PipelineError;
use crate::common::http::Transport;
use crate::format::descriptor::{MusicMetadata, VideoDescriptor};

fn initial_data_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"var ytInitialData\s*=\s*(\{.*?\});</script>").unwrap())
}

/// Fetches the watch page for `video` and tries to locate a "Music in this
/// video" / "Song" metadata panel. Returns `Ok(None)` (not an error) when
/// the panel simply isn't present, since most videos have no such panel;
/// returns `Err` only for network-level failures, which the caller logs
/// and discards rather than failing the whole resolution (§4.4).
pub async fn enrich_music(
    transport: &Transport,
    video: &VideoDescriptor,
) -> Result<Option<MusicMetadata>, PipelineError> {
    let url = format!("https://www.youtube.com/watch?v={}", video.id);
    let res = transport
        .client()
        .get(&url)
        .send()
        .await
        .map_err(|e| PipelineError::network(format!("watch page fetch failed: {e}")))?;

    if !res.status().is_success() {
        return Err(PipelineError::network(format!(
            "watch page fetch returned {}",
            res.status()
        )));
    }

    let body = res
        .text()
        .await
        .map_err(|e| PipelineError::network(format!("watch page body read failed: {e}")))?;

    let Some(caps) = initial_data_re().captures(&body) else {
        return Ok(None);
    };

    let Ok(data) = serde_json::from_str::<Value>(&caps[1]) else {
        return Ok(None);
    };

    Ok(find_music_panel(&data).map(parse_music_panel))
}

fn find_music_panel(value: &Value) -> Option<&Value> {
    if let Some(panel) = value.get("videoDescriptionMusicSectionRenderer") {
        return Some(panel);
    }
    if let Some(obj) = value.as_object() {
        for v in obj.values() {
            if let Some(found) = find_music_panel(v) {
                return Some(found);
            }
        }
    }
    if let Some(arr) = value.as_array() {
        for v in arr {
            if let Some(found) = find_music_panel(v) {
                return Some(found);
            }
        }
    }
    None
}

fn parse_music_panel(panel: &Value) -> MusicMetadata {
    let rows = panel
        .get("carouselLockups")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|l| l.get("carouselLockupRenderer"))
        .and_then(|l| l.get("infoRows"))
        .and_then(|v| v.as_array());

    let mut album = None;
    let mut artist = None;
    let mut release_date = None;

    if let Some(rows) = rows {
        for row in rows {
            let Some(info) = row.get("infoRowRenderer") else {
                continue;
            };
            let title = info
                .get("title")
                .and_then(|t| t.get("simpleText"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let value_text = info
                .get("defaultMetadata")
                .and_then(super::extractor::get_text)
                .or_else(|| info.get("expandedMetadata").and_then(super::extractor::get_text));

            match (title, value_text) {
                ("Album", Some(v)) => album = Some(v),
                ("Artist", Some(v)) => artist = Some(v),
                ("Licensed to YouTube by", _) => {}
                ("Released", Some(v)) => {
                    release_date = NaiveDate::parse_from_str(&v, "%b %d, %Y").ok();
                }
                _ => {}
            }
        }
    }

    MusicMetadata {
        album,
        artist,
        track_number: None,
        release_date,
    }
}
