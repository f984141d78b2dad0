use std::sync::Arc;

use crate::common::errors::PipelineError;
use crate::common::types::CancelToken;
use crate::sources::youtube::cipher::YouTubeCipherManager;

use super::{
    parser::parse_m3u8,
    types::{M3u8Playlist, Resource},
};

/// Walks a master playlist down to its best audio-capable media playlist
/// (§4.9): prefers an audio-only variant by highest bandwidth, then any
/// variant with an `AUDIO` group, then the highest-bandwidth variant of any
/// kind. Returns the leaf segment list plus whether it reported encryption.
pub async fn resolve_playlist(
    client: &reqwest::Client,
    url: &str,
    cancel: &CancelToken,
) -> Result<(Vec<Resource>, Option<Resource>, bool), PipelineError> {
    cancel.check().map_err(|_| PipelineError::interrupted("cancelled"))?;
    let text = fetch_text(client, url).await?;
    let playlist = parse_m3u8(&text, url);

    match playlist {
        M3u8Playlist::Master {
            variants,
            audio_groups,
        } => {
            let best = variants
                .iter()
                .filter(|v| v.is_audio_only)
                .max_by_key(|v| v.bandwidth)
                .or_else(|| variants.iter().filter(|v| v.audio_group.is_some()).max_by_key(|v| v.bandwidth))
                .or_else(|| variants.iter().max_by_key(|v| v.bandwidth));

            match best {
                Some(v) => {
                    if let Some(group_id) = &v.audio_group {
                        if let Some(group) = audio_groups.get(group_id) {
                            let rendition = group
                                .iter()
                                .find(|m| m.is_default)
                                .or_else(|| group.iter().find(|m| m.uri.is_some()))
                                .and_then(|m| m.uri.as_ref());
                            if let Some(uri) = rendition {
                                return Box::pin(resolve_playlist(client, uri, cancel)).await;
                            }
                        }
                    }
                    let next_url = v.url.clone();
                    Box::pin(resolve_playlist(client, &next_url, cancel)).await
                }
                None => Err(PipelineError::unsupported("HLS master playlist has no variants")),
            }
        }
        M3u8Playlist::Media {
            segments,
            map,
            encrypted,
        } => Ok((segments, map, encrypted)),
    }
}

pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, PipelineError> {
    let res = client
        .get(url)
        .header("Accept", "application/x-mpegURL, */*")
        .send()
        .await
        .map_err(|e| PipelineError::network(format!("HLS playlist request failed: {e}")))?;

    if !res.status().is_success() {
        return Err(PipelineError::network(format!(
            "HLS playlist fetch failed {}: {}",
            res.status(),
            url
        )));
    }

    res.text()
        .await
        .map_err(|e| PipelineError::network(format!("HLS playlist body read failed: {e}")))
}

/// Resolves a segment/media URL's `n`-throttling parameter through the
/// cipher manager when one is configured (§B supplemented feature).
pub async fn resolve_url_string(
    url: &str,
    cipher_manager: Option<&Arc<YouTubeCipherManager>>,
    player_url: Option<&str>,
) -> Result<String, PipelineError> {
    let (cipher, p_url) = match (cipher_manager, player_url) {
        (Some(c), Some(p)) => (c, p),
        _ => return Ok(url.to_string()),
    };

    let n_token = if let Some(pos) = url.find("/n/") {
        url[pos + 3..].split('/').next()
    } else {
        url.split("&n=")
            .nth(1)
            .or_else(|| url.split("?n=").nth(1))
            .and_then(|s| s.split('&').next())
    };

    if let Some(n) = n_token {
        cipher
            .resolve_url(url, p_url, Some(n), None)
            .await
            .map_err(|e| PipelineError::network(format!("n-param resolution failed: {e}")))
    } else {
        Ok(url.to_string())
    }
}
