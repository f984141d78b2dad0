//! Shared test fixture: a minimal raw-socket HTTP/1.1 server that serves
//! fixed bodies by path. Good enough for exercising `Transport` and the
//! segment downloader without pulling in a mocking crate the pack never
//! uses for this purpose.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub struct MockServer {
    pub addr: std::net::SocketAddr,
}

impl MockServer {
    /// Spawns a background accept loop serving `routes` (path -> body, and
    /// an optional fixed status code) until the process exits. `None` for a
    /// status defaults to 200.
    pub async fn start(routes: HashMap<&'static str, (u16, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = match stream.read(&mut buf).await {
                        Ok(n) if n > 0 => n,
                        _ => return,
                    };
                    let request = String::from_utf8_lossy(&buf[..n]);
                    let path = request
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();

                    let (status, body) = routes
                        .get(path.as_str())
                        .cloned()
                        .unwrap_or((404, b"not found".to_vec()));

                    let status_line = match status {
                        200 => "200 OK",
                        403 => "403 Forbidden",
                        404 => "404 Not Found",
                        _ => "500 Internal Server Error",
                    };
                    let header = format!(
                        "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = stream.write_all(header.as_bytes()).await;
                    let _ = stream.write_all(&body).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}
