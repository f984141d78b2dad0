//! Per-run options (§3) and the duplicate-handling session (§4.7, §5).
//! `Options` is the CLI-parsed immutable record translated from `Args` in
//! `main.rs` (§A.4); it is a distinct type from the ambient `vodget.toml`
//! config (§A.3), mirroring the teacher's split between `configs::Config`
//! (process config) and per-request parameters.

use std::path::PathBuf;

use parking_lot::Mutex;

/// How to handle a destination path that already exists (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDuplicate {
    Prompt,
    Overwrite,
    Skip,
    Rename,
}

impl Default for OnDuplicate {
    fn default() -> Self {
        Self::Prompt
    }
}

/// Quality selection request (§3, §4.5).
#[derive(Debug, Clone, Default)]
pub enum QualitySelector {
    #[default]
    Best,
    Worst,
    Itag(i64),
    /// `"<height>p"`, e.g. `"720p"`.
    Height(u32),
    /// `"<bitrate>k"`, e.g. `"128k"`.
    BitrateKbps(u64),
}

impl QualitySelector {
    /// Parses the `quality` field grammar from §3: `"best"|"worst"|"<height>p"|"<bitrate>k"`,
    /// with `""` meaning best. Unrecognized strings fall back to `Best`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "" | "best" => return Self::Best,
            "worst" => return Self::Worst,
            _ => {}
        }
        if let Some(digits) = raw.strip_suffix('p') {
            if let Ok(height) = digits.parse::<u32>() {
                return Self::Height(height);
            }
        }
        if let Some(digits) = raw.strip_suffix('k') {
            if let Ok(bitrate) = digits.parse::<u64>() {
                return Self::BitrateKbps(bitrate);
            }
        }
        Self::Best
    }
}

/// Per-run, immutable option record (§3).
#[derive(Debug, Clone)]
pub struct Options {
    pub output_template: String,
    pub output_dir: PathBuf,
    pub audio_only: bool,
    pub info_only: bool,
    pub list_formats: bool,
    pub quiet: bool,
    pub json: bool,
    pub quality: QualitySelector,
    pub container: Option<String>,
    pub segment_concurrency: usize,
    pub playlist_concurrency: usize,
    pub timeout_secs: u64,
    pub meta_overrides: Vec<(String, String)>,
    pub on_duplicate: OnDuplicate,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            output_template: "{title}.{ext}".to_string(),
            output_dir: PathBuf::from("."),
            audio_only: false,
            info_only: false,
            list_formats: false,
            quiet: false,
            json: false,
            quality: QualitySelector::default(),
            container: None,
            segment_concurrency: auto_concurrency(),
            playlist_concurrency: 1,
            timeout_secs: 30,
            meta_overrides: Vec::new(),
            on_duplicate: OnDuplicate::default(),
        }
    }
}

/// `0` means "auto": derived from CPU count, floor 4 (§3, §5).
pub fn auto_concurrency() -> usize {
    num_cpus::get().max(4)
}

pub fn resolve_concurrency(requested: usize) -> usize {
    if requested == 0 {
        auto_concurrency()
    } else {
        requested
    }
}

/// Explicit duplicate-handling session shared across a playlist run (§9
/// REDESIGN FLAGS: explicit `DuplicateSession` value replacing a global
/// duplicate-action flag). `apply_all`, once set by an interactive "always"
/// answer, short-circuits future prompts within the same session.
#[derive(Debug)]
pub struct DuplicateSession {
    default_action: OnDuplicate,
    apply_all: Mutex<Option<OnDuplicate>>,
}

impl DuplicateSession {
    pub fn new(default_action: OnDuplicate) -> Self {
        Self {
            default_action,
            apply_all: Mutex::new(None),
        }
    }

    /// The action to use for the next conflict: a sticky apply-all choice if
    /// one was set, otherwise the session default.
    pub fn effective_action(&self) -> OnDuplicate {
        self.apply_all.lock().unwrap_or(self.default_action)
    }

    pub fn set_apply_all(&self, action: OnDuplicate) {
        *self.apply_all.lock() = Some(action);
    }

    pub fn has_apply_all(&self) -> bool {
        self.apply_all.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_action_used_until_apply_all_set() {
        let session = DuplicateSession::new(OnDuplicate::Skip);
        assert_eq!(session.effective_action(), OnDuplicate::Skip);
        session.set_apply_all(OnDuplicate::Overwrite);
        assert_eq!(session.effective_action(), OnDuplicate::Overwrite);
        assert!(session.has_apply_all());
    }

    #[test]
    fn resolve_concurrency_zero_is_auto() {
        assert!(resolve_concurrency(0) >= 4);
        assert_eq!(resolve_concurrency(7), 7);
    }

    #[test]
    fn quality_selector_parses_height_and_bitrate_suffixes() {
        assert!(matches!(QualitySelector::parse("720p"), QualitySelector::Height(720)));
        assert!(matches!(QualitySelector::parse("128k"), QualitySelector::BitrateKbps(128)));
        assert!(matches!(QualitySelector::parse(""), QualitySelector::Best));
        assert!(matches!(QualitySelector::parse("worst"), QualitySelector::Worst));
        assert!(matches!(QualitySelector::parse("garbage"), QualitySelector::Best));
    }
}
