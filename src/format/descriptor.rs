//! Domain model (§3). `VideoDescriptor`/`FormatDescriptor`/
//! `PlaylistDescriptor` replace the teacher's Lavalink-shaped
//! `Track`/`LoadResult` types with the shape this pipeline's Metadata
//! Resolver and Format Selector actually need.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One deliverable media stream for a video (§3). `Progressive` carries
/// both audio and video in a single muxed file; `AudioOnly` and
/// `VideoOnly` are adaptive tracks meant to be paired; `Adaptive` is an
/// HLS/DASH manifest that still needs segment planning (§4.9).
#[derive(Debug, Clone, PartialEq)]
pub enum FormatKind {
    Progressive,
    AudioOnly,
    VideoOnly,
    Adaptive,
}

#[derive(Debug, Clone)]
pub struct FormatDescriptor {
    pub itag: Option<i64>,
    pub kind: FormatKind,
    pub container: String,
    pub url: Option<String>,
    pub manifest_url: Option<String>,
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    pub filesize: Option<u64>,
}

impl FormatDescriptor {
    pub fn is_audio_capable(&self) -> bool {
        matches!(
            self.kind,
            FormatKind::Progressive | FormatKind::AudioOnly | FormatKind::Adaptive
        )
    }

    pub fn is_video_capable(&self) -> bool {
        matches!(
            self.kind,
            FormatKind::Progressive | FormatKind::VideoOnly | FormatKind::Adaptive
        )
    }
}

/// A music-service enrichment record, attached to a `VideoDescriptor` when
/// the source URL is a `music.*` host and enrichment succeeds (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicMetadata {
    pub album: Option<String>,
    pub artist: Option<String>,
    pub track_number: Option<u32>,
    pub release_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct VideoDescriptor {
    pub id: String,
    pub title: String,
    pub uploader: Option<String>,
    pub duration_secs: Option<u64>,
    pub publish_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub formats: Vec<FormatDescriptor>,
    pub music: Option<MusicMetadata>,
    pub source_url: String,
}

#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlaylistDescriptor {
    pub id: String,
    pub title: Option<String>,
    pub entries: Vec<PlaylistEntry>,
}
