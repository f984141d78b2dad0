use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// A thread-safe, mutually exclusive shared component.
pub type Shared<T> = Arc<Mutex<T>>;

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

/// Cooperative cancellation token threaded through every I/O-bound call (§5).
/// Cloning shares the underlying flag; cancelling any clone cancels all of them.
#[derive(Clone, Debug)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    notify: Notify,
    cancelled: std::sync::atomic::AtomicBool,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                notify: Notify::new(),
                cancelled: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner
            .cancelled
            .store(true, std::sync::atomic::Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner
            .cancelled
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Resolves immediately if already cancelled, otherwise waits for `cancel()`.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.inner.notify.notified().await;
    }

    /// `Err` when cancellation has been requested. Checked at every read/loop
    /// boundary so long-running copies and worker loops react promptly (§5).
    pub fn check(&self) -> AnyResult<()> {
        if self.is_cancelled() {
            return Err("operation cancelled".into());
        }
        Ok(())
    }
}

/// Containers the Output Validator understands (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Mp4,
    WebmMkv,
    Ts,
    Mp3,
    Unknown,
}

impl ContainerKind {
    pub fn from_ext(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" | "m4v" | "mov" | "m4a" | "m4s" => Self::Mp4,
            "webm" | "mkv" => Self::WebmMkv,
            "ts" => Self::Ts,
            "mp3" => Self::Mp3,
            _ => Self::Unknown,
        }
    }
}
