//! Extractor trait (§4.2). Replaces the teacher's `SourcePlugin`
//! (Lavalink `LoadResult`-shaped) with the descriptor-returning contract
//! this pipeline needs, keeping the same "one trait object per source,
//! dispatched by `can_handle`" shape.

use async_trait::async_trait;

use crate::common::errors::PipelineError;
use crate::common::http::Transport;
use crate::common::types::CancelToken;
use crate::format::descriptor::{PlaylistDescriptor, VideoDescriptor};
use crate::normalizer::Normalized;

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Unique identifier for this source (e.g. "youtube", "direct").
    fn name(&self) -> &str;

    /// Whether this extractor claims the normalized target. Extractors are
    /// tried in registration order; the Direct extractor matches anything
    /// with an http(s) scheme and is registered last (§4.2).
    fn matches(&self, target: &Normalized) -> bool;

    /// Resolves a single video/track target into a full descriptor (§4.4).
    async fn resolve_video(
        &self,
        target: &Normalized,
        transport: &Transport,
        cancel: &CancelToken,
    ) -> Result<VideoDescriptor, PipelineError>;

    /// Resolves a playlist target into its member entries (§4.4, §4.12).
    /// Extractors with no playlist concept (Direct) return `Unsupported`.
    async fn resolve_playlist(
        &self,
        target: &Normalized,
        transport: &Transport,
        cancel: &CancelToken,
    ) -> Result<PlaylistDescriptor, PipelineError> {
        let _ = (target, transport, cancel);
        Err(PipelineError::unsupported(format!(
            "{} extractor does not support playlists",
            self.name()
        )))
    }

    /// Whether `target` looks like a playlist rather than a single item.
    fn is_playlist(&self, target: &Normalized) -> bool {
        let _ = target;
        false
    }
}
