//! Integration test: the Progressive Downloader's single-retry-from-zero
//! behavior on an HTTP 403 (§4.8), against a loopback server whose response
//! changes between the first and second request to the same path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use vodget::common::http::Transport;
use vodget::common::types::CancelToken;
use vodget::download::progressive::download_progressive;
use vodget::format::descriptor::{FormatDescriptor, FormatKind};
use vodget::progress::NullProgress;

/// A server that returns 403 on the first `fail_count` requests to its one
/// route, then 200 with a fixed body on every request after.
struct FlakyServer {
    addr: std::net::SocketAddr,
}

impl FlakyServer {
    async fn start(body: &'static [u8], fail_count: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                let hits = hits.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = match stream.read(&mut buf).await {
                        Ok(n) if n > 0 => n,
                        _ => return,
                    };
                    let _ = &buf[..n];

                    let attempt = hits.fetch_add(1, Ordering::SeqCst);
                    let (status_line, payload): (&str, &[u8]) = if attempt < fail_count {
                        ("403 Forbidden", b"forbidden")
                    } else {
                        ("200 OK", body)
                    };
                    let header = format!(
                        "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        payload.len()
                    );
                    let _ = stream.write_all(header.as_bytes()).await;
                    let _ = stream.write_all(payload).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { addr }
    }

    fn url(&self) -> String {
        format!("http://{}/video.mp4", self.addr)
    }
}

fn format_with_url(url: String) -> FormatDescriptor {
    FormatDescriptor {
        itag: Some(18),
        kind: FormatKind::Progressive,
        container: "mp4".to_string(),
        url: Some(url),
        manifest_url: None,
        bitrate: Some(500_000),
        width: Some(640),
        height: Some(360),
        fps: None,
        audio_codec: None,
        video_codec: None,
        filesize: None,
    }
}

#[tokio::test]
async fn retries_once_from_zero_after_a_403() {
    let server = FlakyServer::start(b"the real payload", 1).await;
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.mp4");

    let transport = Transport::new("vodget-test/1.0", std::time::Duration::from_secs(5)).unwrap();
    let cancel = CancelToken::new();
    let progress = NullProgress::new();
    let format = format_with_url(server.url());

    let result = download_progressive(&transport, &format, &dest, &cancel, progress.as_ref(), "item-1")
        .await
        .unwrap();

    assert_eq!(result.bytes_written, b"the real payload".len() as u64);
    assert!(result.retried);
    let contents = tokio::fs::read(&dest).await.unwrap();
    assert_eq!(contents, b"the real payload");
}

#[tokio::test]
async fn second_403_after_retry_surfaces_as_network_not_restricted() {
    let server = FlakyServer::start(b"unreachable", 2).await;
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.mp4");

    let transport = Transport::new("vodget-test/1.0", std::time::Duration::from_secs(5)).unwrap();
    let cancel = CancelToken::new();
    let progress = NullProgress::new();
    let format = format_with_url(server.url());

    let err = download_progressive(&transport, &format, &dest, &cancel, progress.as_ref(), "item-1")
        .await
        .unwrap_err();

    assert_eq!(err.category, vodget::common::errors::Category::Network);
}
