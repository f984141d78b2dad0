//! YouTube extractor (§4.2, §4.4). Orchestrates the InnerTube client
//! profiles (§4.2's "current client profile" fallback chain) against the
//! player/next endpoints, producing `VideoDescriptor`/`PlaylistDescriptor`
//! values. Grounded in the teacher's `sources/youtube/mod.rs` dispatch
//! logic, retargeted from the Lavalink `Track`/`LoadResult` model.

pub mod cipher;
pub mod clients;
pub mod dash;
pub mod extractor;
pub mod hls;
pub mod metadata;

use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use crate::common::errors::{looks_invalid_id, looks_restricted, Category, PipelineError};
use crate::common::http::Transport;
use crate::common::types::CancelToken;
use crate::format::descriptor::{PlaylistDescriptor, VideoDescriptor};
use crate::normalizer::{Normalized, NormalizedTarget};
use crate::sources::plugin::Extractor;

use cipher::{CipherConfig, YouTubeCipherManager};
use clients::ClientProfile;

fn video_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]v=([A-Za-z0-9_-]{11})").unwrap())
}

fn playlist_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]list=([A-Za-z0-9_-]{13,42})").unwrap())
}

pub struct YouTubeExtractor {
    cipher: Arc<YouTubeCipherManager>,
}

impl YouTubeExtractor {
    pub fn new(cipher_config: CipherConfig) -> Self {
        Self {
            cipher: Arc::new(YouTubeCipherManager::new(cipher_config)),
        }
    }

    fn extract_video_id(url: &str) -> Option<String> {
        video_id_re().captures(url).map(|c| c[1].to_string())
    }

    fn extract_playlist_id(url: &str) -> Option<String> {
        playlist_id_re().captures(url).map(|c| c[1].to_string())
    }

    async fn player_request(
        &self,
        transport: &Transport,
        profile: ClientProfile,
        video_id: &str,
    ) -> Result<serde_json::Value, PipelineError> {
        let body = json!({
            "context": profile.build_context(),
            "videoId": video_id,
            "contentCheckOk": true,
            "racyCheckOk": true,
        });

        let res = transport
            .client()
            .post(profile.player_endpoint())
            .header("X-YouTube-Client-Name", profile.client_id())
            .header("X-YouTube-Client-Version", profile.client_version())
            .header("User-Agent", profile.user_agent())
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::network(format!("player request failed: {e}")))?;

        if !res.status().is_success() {
            return Err(PipelineError::network(format!(
                "player request returned {}",
                res.status()
            )));
        }

        res.json()
            .await
            .map_err(|e| PipelineError::network(format!("player response decode failed: {e}")))
    }

    /// Tries each client profile in fallback order until one returns a
    /// playable video (§4.2, §B). The last error observed is surfaced if
    /// every profile fails.
    async fn resolve_video_by_id(
        &self,
        transport: &Transport,
        video_id: &str,
        source_url: &str,
    ) -> Result<VideoDescriptor, PipelineError> {
        let mut last_err: Option<PipelineError> = None;

        for profile in ClientProfile::FALLBACK_ORDER {
            let attempt = clients::with_profile(profile, || async {
                let body = self.player_request(transport, profile, video_id).await?;

                let playability = body
                    .get("playabilityStatus")
                    .and_then(|p| p.get("status"))
                    .and_then(|s| s.as_str())
                    .unwrap_or("UNKNOWN");

                if playability != "OK" {
                    let reason = body
                        .get("playabilityStatus")
                        .and_then(|p| p.get("reason"))
                        .and_then(|r| r.as_str())
                        .unwrap_or("unknown reason");
                    if looks_invalid_id(reason) {
                        return Err(PipelineError::invalid_url(reason));
                    }
                    if looks_restricted(reason) || playability == "LOGIN_REQUIRED" || playability == "UNPLAYABLE" {
                        return Err(PipelineError::restricted(reason));
                    }
                    return Err(PipelineError::new(Category::Network, reason));
                }

                extractor::extract_from_player(&body, source_url)
                    .ok_or_else(|| PipelineError::network("player response missing videoDetails"))
            })
            .await;

            match attempt {
                Ok(video) => return Ok(video),
                Err(e) => {
                    tracing::debug!(profile = ?profile, error = %e, "client profile failed, trying next");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| PipelineError::network("no client profile produced a result")))
    }

    async fn resolve_playlist_by_id(
        &self,
        transport: &Transport,
        playlist_id: &str,
    ) -> Result<PlaylistDescriptor, PipelineError> {
        // Playlists always use the Web profile (§B): it is the only one of
        // the four that carries the `browse`/`next` continuation shape the
        // teacher's extractor walks.
        clients::with_profile(ClientProfile::Web, || async {
            let profile = ClientProfile::Web;
            let body = json!({
                "context": profile.build_context(),
                "browseId": format!("VL{playlist_id}"),
            });

            let res = transport
                .client()
                .post(profile.browse_endpoint())
                .header("X-YouTube-Client-Name", profile.client_id())
                .header("X-YouTube-Client-Version", profile.client_version())
                .json(&body)
                .send()
                .await
                .map_err(|e| PipelineError::network(format!("playlist browse request failed: {e}")))?;

            if !res.status().is_success() {
                return Err(PipelineError::network(format!(
                    "playlist browse returned {}",
                    res.status()
                )));
            }

            let json_body: serde_json::Value = res
                .json()
                .await
                .map_err(|e| PipelineError::network(format!("playlist response decode failed: {e}")))?;

            let entries = extractor::extract_playlist_entries(&json_body);
            if entries.is_empty() {
                return Err(PipelineError::unsupported("playlist has no resolvable entries"));
            }

            let title = json_body
                .get("header")
                .and_then(|h| h.get("playlistHeaderRenderer"))
                .and_then(|h| h.get("title"))
                .and_then(extractor::get_text);

            Ok(PlaylistDescriptor {
                id: playlist_id.to_string(),
                title,
                entries,
            })
        })
        .await
    }
}

#[async_trait]
impl Extractor for YouTubeExtractor {
    fn name(&self) -> &str {
        "youtube"
    }

    fn matches(&self, target: &Normalized) -> bool {
        match &target.target {
            NormalizedTarget::Url(u) => {
                u.contains("youtube.com") || u.contains("youtu.be")
            }
            NormalizedTarget::PlaylistId(_) => true,
        }
    }

    fn is_playlist(&self, target: &Normalized) -> bool {
        match &target.target {
            NormalizedTarget::Url(u) => Self::extract_playlist_id(u).is_some() && Self::extract_video_id(u).is_none(),
            NormalizedTarget::PlaylistId(_) => true,
        }
    }

    async fn resolve_video(
        &self,
        target: &Normalized,
        transport: &Transport,
        cancel: &CancelToken,
    ) -> Result<VideoDescriptor, PipelineError> {
        cancel.check().map_err(|_| PipelineError::interrupted("cancelled"))?;
        let NormalizedTarget::Url(url) = &target.target else {
            return Err(PipelineError::invalid_url("expected a video URL"));
        };
        let video_id = Self::extract_video_id(url)
            .ok_or_else(|| PipelineError::invalid_url("could not find a video id in URL"))?;

        let mut video = self.resolve_video_by_id(transport, &video_id, url).await?;

        if target.is_music {
            match metadata::enrich_music(transport, &video).await {
                Ok(Some(music)) => video.music = Some(music),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "music enrichment failed, continuing without it"),
            }
        }

        Ok(video)
    }

    async fn resolve_playlist(
        &self,
        target: &Normalized,
        transport: &Transport,
        cancel: &CancelToken,
    ) -> Result<PlaylistDescriptor, PipelineError> {
        cancel.check().map_err(|_| PipelineError::interrupted("cancelled"))?;
        let playlist_id = match &target.target {
            NormalizedTarget::Url(u) => Self::extract_playlist_id(u)
                .ok_or_else(|| PipelineError::invalid_url("could not find a playlist id in URL"))?,
            NormalizedTarget::PlaylistId(id) => id.clone(),
        };
        self.resolve_playlist_by_id(transport, &playlist_id).await
    }
}
