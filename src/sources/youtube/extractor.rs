//! InnerTube JSON tree-walking helpers (§4.4). Kept from the teacher's
//! `sources/youtube/extractor.rs`: the same `get_text`/`find_section_list`/
//! duration-parsing helpers, retargeted to build `VideoDescriptor`/
//! `PlaylistEntry` instead of a Lavalink `Track`.

use chrono::NaiveDate;
use serde_json::Value;

use crate::format::descriptor::{FormatDescriptor, FormatKind, PlaylistEntry, VideoDescriptor};

pub fn extract_from_player(body: &Value, source_url: &str) -> Option<VideoDescriptor> {
    let details = body.get("videoDetails")?;
    let video_id = details.get("videoId")?.as_str()?.to_string();
    let title = details.get("title")?.as_str()?.to_string();
    let author = details.get("author").and_then(|v| v.as_str()).map(str::to_string);
    let length_seconds = details
        .get("lengthSeconds")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<u64>().ok());

    let thumbnail_url = details
        .get("thumbnail")
        .and_then(|t| t.get("thumbnails"))
        .and_then(|arr| arr.as_array())
        .and_then(|arr| arr.last())
        .and_then(|thumb| thumb.get("url"))
        .and_then(|url| url.as_str())
        .map(str::to_string);

    let description = body
        .get("microformat")
        .and_then(|m| m.get("playerMicroformatRenderer"))
        .and_then(|m| m.get("description"))
        .and_then(get_text);

    let publish_date = body
        .get("microformat")
        .and_then(|m| m.get("playerMicroformatRenderer"))
        .and_then(|m| m.get("publishDate"))
        .and_then(|v| v.as_str())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

    let formats = extract_formats(body);

    Some(VideoDescriptor {
        id: video_id,
        title,
        uploader: author,
        duration_secs: length_seconds,
        publish_date,
        description,
        thumbnail_url,
        formats,
        music: None,
        source_url: source_url.to_string(),
    })
}

fn extract_formats(body: &Value) -> Vec<FormatDescriptor> {
    let Some(streaming_data) = body.get("streamingData") else {
        return Vec::new();
    };

    let mut out = Vec::new();

    if let Some(hls) = streaming_data.get("hlsManifestUrl").and_then(|v| v.as_str()) {
        out.push(FormatDescriptor {
            itag: None,
            kind: FormatKind::Adaptive,
            container: "ts".to_string(),
            url: None,
            manifest_url: Some(hls.to_string()),
            bitrate: None,
            width: None,
            height: None,
            fps: None,
            audio_codec: None,
            video_codec: None,
            filesize: None,
        });
    }

    for field in ["formats", "adaptiveFormats"] {
        let Some(arr) = streaming_data.get(field).and_then(|v| v.as_array()) else {
            continue;
        };
        for f in arr {
            if let Some(descriptor) = format_from_json(f, field == "formats") {
                out.push(descriptor);
            }
        }
    }

    out
}

fn format_from_json(f: &Value, progressive: bool) -> Option<FormatDescriptor> {
    let itag = f.get("itag").and_then(|v| v.as_i64());
    let mime = f.get("mimeType").and_then(|v| v.as_str()).unwrap_or("");
    let container = mime.split(';').next().unwrap_or("").split('/').nth(1)?.to_string();
    let has_audio = mime.starts_with("audio/") || mime.contains("mp4a") || mime.contains("opus");
    let has_video = mime.starts_with("video/");

    let kind = if progressive && has_audio && has_video {
        FormatKind::Progressive
    } else if has_video {
        FormatKind::VideoOnly
    } else if has_audio {
        FormatKind::AudioOnly
    } else {
        return None;
    };

    Some(FormatDescriptor {
        itag,
        kind,
        container,
        url: f.get("url").and_then(|v| v.as_str()).map(str::to_string),
        manifest_url: None,
        bitrate: f.get("bitrate").and_then(|v| v.as_u64()),
        width: f.get("width").and_then(|v| v.as_u64()).map(|v| v as u32),
        height: f.get("height").and_then(|v| v.as_u64()).map(|v| v as u32),
        fps: f.get("fps").and_then(|v| v.as_u64()).map(|v| v as u32),
        audio_codec: None,
        video_codec: None,
        filesize: f.get("contentLength").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()),
    })
}

pub fn find_section_list(value: &Value) -> Option<&Value> {
    if let Some(list) = value.get("sectionListRenderer") {
        return Some(list);
    }
    if let Some(contents) = value.get("contents") {
        if let Some(list) = find_section_list(contents) {
            return Some(list);
        }
    }
    if let Some(arr) = value.as_array() {
        for item in arr {
            if let Some(list) = find_section_list(item) {
                return Some(list);
            }
        }
    }
    if let Some(tabs) = value.get("tabs").and_then(|t| t.as_array()) {
        for tab in tabs {
            if let Some(content) = tab.get("tabRenderer").and_then(|tr| tr.get("content")) {
                if let Some(list) = find_section_list(content) {
                    return Some(list);
                }
            }
        }
    }
    None
}

pub fn extract_playlist_entries(body: &Value) -> Vec<PlaylistEntry> {
    let mut entries = Vec::new();
    let Some(section_list) = find_section_list(body) else {
        return entries;
    };
    let Some(contents) = section_list.get("contents").and_then(|c| c.as_array()) else {
        return entries;
    };

    for section in contents {
        if let Some(list) = section
            .get("itemSectionRenderer")
            .and_then(|i| i.get("contents"))
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|first| first.get("playlistVideoListRenderer"))
            .and_then(|p| p.get("contents"))
            .and_then(|c| c.as_array())
        {
            for item in list {
                if let Some(entry) = extract_entry(item) {
                    entries.push(entry);
                }
            }
        }
        if let Some(list) = section
            .get("musicShelfRenderer")
            .and_then(|s| s.get("contents"))
            .and_then(|c| c.as_array())
        {
            for item in list {
                if let Some(entry) = extract_entry(item) {
                    entries.push(entry);
                }
            }
        }
    }

    entries
}

fn extract_entry(item: &Value) -> Option<PlaylistEntry> {
    let renderer = item
        .get("playlistVideoRenderer")
        .or_else(|| item.get("videoRenderer"))
        .or_else(|| item.get("musicResponsiveListItemRenderer"))?;

    let video_id = renderer
        .get("videoId")
        .and_then(|v| v.as_str())
        .or_else(|| {
            renderer
                .get("playlistItemData")
                .and_then(|d| d.get("videoId"))
                .and_then(|v| v.as_str())
        })?
        .to_string();

    let title = get_text(renderer.get("title").unwrap_or(&Value::Null));

    Some(PlaylistEntry {
        url: format!("https://www.youtube.com/watch?v={video_id}"),
        id: video_id,
        title,
    })
}

pub fn get_text(obj: &Value) -> Option<String> {
    if let Some(s) = obj.as_str() {
        return Some(s.to_string());
    }
    if let Some(simple_text) = obj.get("simpleText").and_then(|v| v.as_str()) {
        return Some(simple_text.to_string());
    }
    if let Some(runs) = obj.get("runs").and_then(|v| v.as_array()) {
        let mut text = String::new();
        for run in runs {
            if let Some(t) = run.get("text").and_then(|v| v.as_str()) {
                text.push_str(t);
            }
        }
        return Some(text);
    }
    None
}
