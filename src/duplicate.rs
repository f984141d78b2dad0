//! Duplicate Policy (§4.7). New module grounded in the teacher's
//! `AnyResult`/io-error propagation style; the interactive-prompt shape
//! follows the CLI idiom in `other_examples/benburkhart1-hlscp`'s
//! confirmation prompts.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use crate::common::errors::PipelineError;
use crate::options::{DuplicateSession, OnDuplicate};

/// Outcome of resolving a potential name collision for `desired`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateOutcome {
    /// Proceed, writing to this path (may equal `desired` or be a renamed
    /// variant).
    Proceed(PathBuf),
    /// Skip this item entirely.
    Skip,
}

/// Resolves whether/where to write when `desired` already exists on disk
/// (§4.7). Non-existent targets always proceed unchanged.
pub fn resolve_duplicate(
    session: &DuplicateSession,
    desired: &Path,
) -> Result<DuplicateOutcome, PipelineError> {
    if !desired.exists() {
        return Ok(DuplicateOutcome::Proceed(desired.to_path_buf()));
    }

    let action = session.effective_action();
    let action = if action == OnDuplicate::Prompt && !session.has_apply_all() {
        prompt_for_action(session, desired)?
    } else {
        action
    };

    match action {
        OnDuplicate::Overwrite => Ok(DuplicateOutcome::Proceed(desired.to_path_buf())),
        OnDuplicate::Skip => Ok(DuplicateOutcome::Skip),
        OnDuplicate::Rename => Ok(DuplicateOutcome::Proceed(rename_with_suffix(desired)?)),
        OnDuplicate::Prompt => unreachable!("prompt must resolve to a concrete action"),
    }
}

/// Interactive TTY prompt (§4.7): `o`/`s`/`r`/`q` for a one-off decision,
/// `O`/`S`/`R` to additionally latch that decision as the session's
/// apply-all for the rest of the run. On a non-TTY stdin, warns and
/// overwrites rather than blocking forever.
fn prompt_for_action(
    session: &DuplicateSession,
    desired: &Path,
) -> Result<OnDuplicate, PipelineError> {
    if !std::io::stdin().is_terminal() {
        tracing::warn!(path = %desired.display(), "destination exists, non-interactive session: overwriting");
        return Ok(OnDuplicate::Overwrite);
    }

    loop {
        print!(
            "'{}' already exists. [o]verwrite/[s]kip/[r]ename/[q]uit (uppercase = apply to all): ",
            desired.display()
        );
        std::io::stdout()
            .flush()
            .map_err(|e| PipelineError::filesystem(format!("stdout flush failed: {e}")))?;

        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| PipelineError::filesystem(format!("stdin read failed: {e}")))?;
        let choice = line.trim();

        let (action, apply_all) = match choice {
            "o" => (OnDuplicate::Overwrite, false),
            "O" => (OnDuplicate::Overwrite, true),
            "s" => (OnDuplicate::Skip, false),
            "S" => (OnDuplicate::Skip, true),
            "r" => (OnDuplicate::Rename, false),
            "R" => (OnDuplicate::Rename, true),
            "q" => return Err(PipelineError::user_aborted("aborted at duplicate prompt")),
            _ => {
                println!("unrecognized choice: {choice}");
                continue;
            }
        };

        if apply_all {
            session.set_apply_all(action);
        }
        return Ok(action);
    }
}

/// Finds the first `<stem> (N)<ext>` for `1 <= N < 10000` that doesn't
/// collide (§4.7). Exhausting the range is treated as a filesystem error
/// rather than silently overwriting.
fn rename_with_suffix(desired: &Path) -> Result<PathBuf, PipelineError> {
    let parent = desired.parent().unwrap_or_else(|| Path::new("."));
    let stem = desired
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = desired.extension().map(|e| e.to_string_lossy().to_string());

    for n in 1..10_000 {
        let candidate_name = match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = parent.join(candidate_name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(PipelineError::filesystem(
        "exhausted rename suffixes (1..10000) for duplicate output path",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn non_existent_path_proceeds_unchanged() {
        let session = DuplicateSession::new(OnDuplicate::Prompt);
        let dir = tempdir().unwrap();
        let target = dir.path().join("new.mp4");
        let outcome = resolve_duplicate(&session, &target).unwrap();
        assert_eq!(outcome, DuplicateOutcome::Proceed(target));
    }

    #[test]
    fn overwrite_session_default_skips_prompt() {
        let session = DuplicateSession::new(OnDuplicate::Overwrite);
        let dir = tempdir().unwrap();
        let target = dir.path().join("existing.mp4");
        std::fs::write(&target, b"x").unwrap();
        let outcome = resolve_duplicate(&session, &target).unwrap();
        assert_eq!(outcome, DuplicateOutcome::Proceed(target));
    }

    #[test]
    fn skip_session_default_skips() {
        let session = DuplicateSession::new(OnDuplicate::Skip);
        let dir = tempdir().unwrap();
        let target = dir.path().join("existing.mp4");
        std::fs::write(&target, b"x").unwrap();
        assert_eq!(resolve_duplicate(&session, &target).unwrap(), DuplicateOutcome::Skip);
    }

    #[test]
    fn rename_picks_first_free_suffix() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("clip.mp4");
        std::fs::write(&base, b"x").unwrap();
        std::fs::write(dir.path().join("clip (1).mp4"), b"x").unwrap();
        let renamed = rename_with_suffix(&base).unwrap();
        assert_eq!(renamed, dir.path().join("clip (2).mp4"));
    }

    #[test]
    fn rename_is_idempotent_across_repeated_calls() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("clip.mp4");
        std::fs::write(&base, b"x").unwrap();
        let first = rename_with_suffix(&base).unwrap();
        std::fs::write(&first, b"x").unwrap();
        let second = rename_with_suffix(&base).unwrap();
        assert_ne!(first, second);
    }
}
