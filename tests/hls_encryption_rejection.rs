//! Integration test: an encrypted HLS media playlist is rejected end to end
//! through `pipeline::process_single_item` as `Category::Restricted` (§4.9),
//! rather than silently downloaded.

mod common;

use async_trait::async_trait;

use vodget::common::errors::{Category, PipelineError};
use vodget::common::http::Transport;
use vodget::common::types::CancelToken;
use vodget::format::descriptor::{FormatDescriptor, FormatKind, VideoDescriptor};
use vodget::normalizer::Normalized;
use vodget::options::Options;
use vodget::pipeline::{Context, ItemOutcome};
use vodget::progress::NullProgress;
use vodget::sources::plugin::Extractor;
use vodget::sources::Registry;

const ENCRYPTED_MEDIA_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-KEY:METHOD=AES-128,URI=\"https://example.com/key\"\n\
#EXTINF:4.0,\n\
seg0.ts\n\
#EXT-X-ENDLIST\n";

struct FakeAdaptiveExtractor {
    manifest_url: String,
}

#[async_trait]
impl Extractor for FakeAdaptiveExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    fn matches(&self, _target: &Normalized) -> bool {
        true
    }

    async fn resolve_video(
        &self,
        _target: &Normalized,
        _transport: &Transport,
        _cancel: &CancelToken,
    ) -> Result<VideoDescriptor, PipelineError> {
        Ok(VideoDescriptor {
            id: "enc-video".to_string(),
            title: "Encrypted Stream".to_string(),
            uploader: None,
            duration_secs: None,
            publish_date: None,
            description: None,
            thumbnail_url: None,
            formats: vec![FormatDescriptor {
                itag: None,
                kind: FormatKind::Adaptive,
                container: "ts".to_string(),
                url: None,
                manifest_url: Some(self.manifest_url.clone()),
                bitrate: None,
                width: None,
                height: None,
                fps: None,
                audio_codec: None,
                video_codec: None,
                filesize: None,
            }],
            music: None,
            source_url: "https://example.com/watch?v=enc".to_string(),
        })
    }
}

#[tokio::test]
async fn encrypted_hls_stream_is_rejected_as_restricted() {
    let mut routes = std::collections::HashMap::new();
    routes.insert(
        "/media.m3u8",
        (200, ENCRYPTED_MEDIA_PLAYLIST.as_bytes().to_vec()),
    );
    let server = common::MockServer::start(routes).await;

    let dir = tempfile::tempdir().unwrap();
    let mut opts = Options::default();
    opts.output_dir = dir.path().to_path_buf();

    let extractor = FakeAdaptiveExtractor {
        manifest_url: server.url("/media.m3u8"),
    };
    let registry = Registry::new(vec![Box::new(extractor)]);
    let transport = Transport::new("vodget-test/1.0", std::time::Duration::from_secs(5)).unwrap();
    let progress = NullProgress::new();
    let ctx = Context::new(registry, transport, progress, &opts);

    let normalized = Normalized {
        target: vodget::normalizer::NormalizedTarget::Url("https://example.com/watch?v=enc".to_string()),
        is_music: false,
    };

    let report = vodget::pipeline::process_single_item(&ctx, &normalized, &opts, None).await;

    match report.outcome {
        ItemOutcome::Failed(e) => {
            assert_eq!(e.category, Category::Restricted);
            assert!(e.message.contains("encrypted"));
        }
        other => panic!("expected a Restricted failure, got {other:?}"),
    }
}
