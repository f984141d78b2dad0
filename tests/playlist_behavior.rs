//! Integration test: the Playlist Driver's empty- and all-failed-playlist
//! error paths (§4.12), driven through `pipeline::process` with a fake
//! extractor so no real network access is required.

use async_trait::async_trait;

use vodget::common::errors::{Category, PipelineError};
use vodget::common::http::Transport;
use vodget::common::types::CancelToken;
use vodget::format::descriptor::{PlaylistDescriptor, PlaylistEntry, VideoDescriptor};
use vodget::normalizer::Normalized;
use vodget::options::Options;
use vodget::pipeline::Context;
use vodget::progress::NullProgress;
use vodget::sources::plugin::Extractor;
use vodget::sources::Registry;

/// Extractor that always claims the target and hands back a fixed (possibly
/// empty) playlist; every "video" resolution within it fails, so it can
/// drive both the empty-playlist and all-failed-playlist paths.
struct FakePlaylistExtractor {
    entries: Vec<PlaylistEntry>,
}

#[async_trait]
impl Extractor for FakePlaylistExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    fn matches(&self, _target: &Normalized) -> bool {
        true
    }

    fn is_playlist(&self, _target: &Normalized) -> bool {
        true
    }

    async fn resolve_video(
        &self,
        _target: &Normalized,
        _transport: &Transport,
        _cancel: &CancelToken,
    ) -> Result<VideoDescriptor, PipelineError> {
        Err(PipelineError::network("fake entry always fails to resolve"))
    }

    async fn resolve_playlist(
        &self,
        _target: &Normalized,
        _transport: &Transport,
        _cancel: &CancelToken,
    ) -> Result<PlaylistDescriptor, PipelineError> {
        Ok(PlaylistDescriptor {
            id: "fake-playlist".to_string(),
            title: Some("Fake Playlist".to_string()),
            entries: self.entries.clone(),
        })
    }
}

fn make_context(extractor: FakePlaylistExtractor, opts: &Options) -> Context {
    let registry = Registry::new(vec![Box::new(extractor)]);
    let transport = Transport::new("vodget-test/1.0", std::time::Duration::from_secs(5)).unwrap();
    let progress = NullProgress::new();
    Context::new(registry, transport, progress, opts)
}

#[tokio::test]
async fn empty_playlist_is_unsupported() {
    let opts = Options::default();
    let ctx = make_context(FakePlaylistExtractor { entries: Vec::new() }, &opts);

    let err = vodget::pipeline::process(&ctx, "playlist-id-aaaaaaaaaaaaa", &opts)
        .await
        .unwrap_err();

    assert_eq!(err.category, Category::Unsupported);
    assert_eq!(err.message, "playlist has no videos");
}

#[tokio::test]
async fn all_failed_playlist_entries_is_unsupported() {
    let opts = Options::default();
    let entries = vec![
        PlaylistEntry {
            id: "a".to_string(),
            url: "https://example.com/a".to_string(),
            title: Some("A".to_string()),
        },
        PlaylistEntry {
            id: "b".to_string(),
            url: "https://example.com/b".to_string(),
            title: Some("B".to_string()),
        },
    ];
    let ctx = make_context(FakePlaylistExtractor { entries }, &opts);

    let err = vodget::pipeline::process(&ctx, "playlist-id-bbbbbbbbbbbbb", &opts)
        .await
        .unwrap_err();

    assert_eq!(err.category, Category::Unsupported);
    assert_eq!(err.message, "no playlist entries downloaded successfully");
}
