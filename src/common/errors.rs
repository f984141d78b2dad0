//! Error taxonomy (§7). Mirrors the teacher's split between a typed error
//! and the surface that reports it (`RustalinkError`/`Severity`), but the
//! category drives a process exit code rather than an HTTP status.

use std::fmt;

/// Failure category (§3 "Error", §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Network,
    Filesystem,
    Restricted,
    InvalidUrl,
    Unsupported,
    UserAborted,
    Interrupted,
}

impl Category {
    /// Exit code mapping (§6, §7).
    pub fn exit_code(self) -> i32 {
        match self {
            Category::Unsupported => 1,
            Category::InvalidUrl => 2,
            Category::Restricted => 3,
            Category::Network => 4,
            Category::Filesystem => 5,
            Category::UserAborted => 6,
            Category::Interrupted => 130,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Network => "network",
            Category::Filesystem => "filesystem",
            Category::Restricted => "restricted",
            Category::InvalidUrl => "invalid-url",
            Category::Unsupported => "unsupported",
            Category::UserAborted => "user-aborted",
            Category::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// A pipeline error: a category, a message, and a `reported` flag so a
/// per-item failure is surfaced to the printer exactly once (§7 propagation
/// policy, §9 "reported boolean").
#[derive(Debug, thiserror::Error)]
#[error("{category}: {message}")]
pub struct PipelineError {
    pub category: Category,
    pub message: String,
    reported: std::sync::atomic::AtomicBool,
}

impl PipelineError {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            reported: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(Category::Network, message)
    }
    pub fn filesystem(message: impl Into<String>) -> Self {
        Self::new(Category::Filesystem, message)
    }
    pub fn restricted(message: impl Into<String>) -> Self {
        Self::new(Category::Restricted, message)
    }
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::new(Category::InvalidUrl, message)
    }
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(Category::Unsupported, message)
    }
    pub fn user_aborted(message: impl Into<String>) -> Self {
        Self::new(Category::UserAborted, message)
    }
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::new(Category::Interrupted, message)
    }

    /// True if this error was already surfaced to the user; marks it
    /// surfaced as a side effect of the first call (§7, §9).
    pub fn mark_reported(&self) -> bool {
        self.reported
            .swap(true, std::sync::atomic::Ordering::SeqCst)
    }

    pub fn is_reported(&self) -> bool {
        self.reported.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Clone for PipelineError {
    fn clone(&self) -> Self {
        Self {
            category: self.category,
            message: self.message.clone(),
            reported: std::sync::atomic::AtomicBool::new(self.is_reported()),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Restriction predicates the Metadata Resolver (§4.4) uses to map an
/// extractor failure message onto `Category::Restricted`.
pub fn looks_restricted(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    [
        "login",
        "private",
        "paywall",
        "embed-disabled",
        "embed disabled",
        "age-restrict",
        "age restrict",
        "unavailable in",
        "not available in your country",
        "playabilitystatus",
        "sign in to confirm",
    ]
    .iter()
    .any(|p| m.contains(p))
}

/// Invalid-identifier predicates (§4.4).
pub fn looks_invalid_id(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    [
        "invalid id",
        "invalid video id",
        "invalid playlist",
        "invalid url",
        "video unavailable (id)",
    ]
    .iter()
    .any(|p| m.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_taxonomy() {
        assert_eq!(Category::Unsupported.exit_code(), 1);
        assert_eq!(Category::InvalidUrl.exit_code(), 2);
        assert_eq!(Category::Restricted.exit_code(), 3);
        assert_eq!(Category::Network.exit_code(), 4);
        assert_eq!(Category::Filesystem.exit_code(), 5);
        assert_eq!(Category::UserAborted.exit_code(), 6);
        assert_eq!(Category::Interrupted.exit_code(), 130);
    }

    #[test]
    fn reported_flag_latches_once() {
        let err = PipelineError::network("timed out");
        assert!(!err.is_reported());
        assert!(!err.mark_reported());
        assert!(err.is_reported());
        assert!(err.mark_reported());
    }

    #[test]
    fn restriction_predicate_matches_known_phrases() {
        assert!(looks_restricted("Sign in to confirm your age"));
        assert!(looks_restricted("This video is private"));
        assert!(!looks_restricted("network timeout"));
    }
}
