//! Integration test: the Segment Downloader against a real (loopback) HTTP
//! server, exercising parallel fetch + ordered concatenation + resume-state
//! cleanup together (§4.9, §4.10).

mod common;

use std::collections::HashMap;
use std::time::Duration;

use tempfile::tempdir;
use vodget::common::http::Transport;
use vodget::common::types::CancelToken;
use vodget::download::resume::{self, ResumeState};
use vodget::download::segment::{download_segments, SegmentPlan};
use vodget::progress::NullProgress;

#[tokio::test]
async fn downloads_segments_in_order_and_cleans_up() {
    let mut routes = HashMap::new();
    routes.insert("/init.bin", (200, b"INIT".to_vec()));
    routes.insert("/seg0.bin", (200, b"AAAA".to_vec()));
    routes.insert("/seg1.bin", (200, b"BBBB".to_vec()));
    routes.insert("/seg2.bin", (200, b"CCCC".to_vec()));
    let server = common::MockServer::start(routes).await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.ts");

    let transport = Transport::new("vodget-test/1.0", Duration::from_secs(5)).unwrap();
    let cancel = CancelToken::new();
    let progress = NullProgress::new();

    let plan = SegmentPlan {
        manifest_url: server.url("/manifest.mpd"),
        init_url: Some(server.url("/init.bin")),
        media_urls: vec![
            server.url("/seg0.bin"),
            server.url("/seg1.bin"),
            server.url("/seg2.bin"),
        ],
    };

    let bytes = download_segments(&transport, &plan, &dest, 4, &cancel, progress.as_ref(), "item-1")
        .await
        .unwrap();

    assert_eq!(bytes, 16);
    let contents = tokio::fs::read(&dest).await.unwrap();
    assert_eq!(contents, b"INITAAAABBBBCCCC");

    // resume sidecar and temp segment dir are cleaned up after a successful run
    let resume_path = dest.with_file_name("out.ts.resume.json");
    assert!(!resume_path.exists());
    let temp_dir = dest.with_file_name("out.ts.segments.tmp");
    assert!(!temp_dir.exists());
}

#[tokio::test]
async fn skips_already_downloaded_segments_on_rerun() {
    let mut routes = HashMap::new();
    routes.insert("/seg0.bin", (200, b"XXXX".to_vec()));
    routes.insert("/seg1.bin", (200, b"YYYY".to_vec()));
    let server = common::MockServer::start(routes).await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("clip.ts");

    let transport = Transport::new("vodget-test/1.0", Duration::from_secs(5)).unwrap();
    let cancel = CancelToken::new();
    let progress = NullProgress::new();

    let plan = SegmentPlan {
        manifest_url: server.url("/manifest.m3u8"),
        init_url: None,
        media_urls: vec![server.url("/seg0.bin"), server.url("/seg1.bin")],
    };

    // Pre-create the temp dir with the first segment already present, as if
    // a prior run had completed it before being interrupted.
    let temp_dir = dest.with_file_name("clip.ts.segments.tmp");
    tokio::fs::create_dir_all(&temp_dir).await.unwrap();
    tokio::fs::write(temp_dir.join("00000000.part"), b"XXXX").await.unwrap();

    let bytes = download_segments(&transport, &plan, &dest, 2, &cancel, progress.as_ref(), "item-2")
        .await
        .unwrap();

    assert_eq!(bytes, 8);
    let contents = tokio::fs::read(&dest).await.unwrap();
    assert_eq!(contents, b"XXXXYYYY");
}

#[tokio::test]
async fn resumes_via_sequential_path_when_next_index_is_nonzero() {
    let mut routes = HashMap::new();
    routes.insert("/seg2.bin", (200, b"CCCC".to_vec()));
    let server = common::MockServer::start(routes).await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.ts");
    let manifest_url = server.url("/manifest.m3u8");

    let transport = Transport::new("vodget-test/1.0", Duration::from_secs(5)).unwrap();
    let cancel = CancelToken::new();
    let progress = NullProgress::new();

    let plan = SegmentPlan {
        manifest_url: manifest_url.clone(),
        init_url: None,
        media_urls: vec![
            server.url("/seg0.bin"),
            server.url("/seg1.bin"),
            server.url("/seg2.bin"),
        ],
    };

    // Simulate a prior run that got through segments 0 and 1 sequentially
    // and wrote them into the `.part` accumulator before being interrupted.
    let part = dest.with_file_name("out.ts.part");
    tokio::fs::write(&part, b"AAAABBBB").await.unwrap();
    let mut state = ResumeState::fresh(manifest_url, 3);
    state.next_index = 2;
    state.bytes_written = 8;
    resume::save(&dest, &state).unwrap();

    let bytes = download_segments(&transport, &plan, &dest, 4, &cancel, progress.as_ref(), "item-3")
        .await
        .unwrap();

    assert_eq!(bytes, 12);
    let contents = tokio::fs::read(&dest).await.unwrap();
    assert_eq!(contents, b"AAAABBBBCCCC");
    assert!(!resume::resume_path(&dest).exists());
    assert!(!part.exists());
}
