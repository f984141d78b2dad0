//! Logging setup (§A.1). Grounded in the teacher's `common::logger` module:
//! a `tracing_subscriber::registry()` with a single formatted layer and an
//! `EnvFilter` seeded from a configured level, overridable by `RUST_LOG`.
//! The teacher's rotating file-writer layer is dropped (`vodget` is a
//! one-shot process, not an always-on service); `quiet`/`json` route the
//! human-readable log layer to stderr so it never interleaves with
//! machine-readable stdout output.

pub mod formatter;

pub use formatter::*;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initializes the global subscriber. `level` defaults to `info` unless
/// `RUST_LOG` is set; `quiet` drops the default to `warn`; `json_mode`
/// redirects the formatted layer to stderr so stdout stays clean for
/// per-item JSON records (§4.12).
pub fn init(level: Option<&str>, quiet: bool, json_mode: bool) {
    let default_level = if quiet { "warn" } else { level.unwrap_or("info") };
    let filter_str = format!("{default_level},reqwest=warn,h2=warn");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let use_ansi = !json_mode && atty_stdout();

    if json_mode {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .event_format(CustomFormatter::new(false));
        tracing_subscriber::registry().with(env_filter).with(layer).init();
    } else {
        let layer = fmt::layer()
            .event_format(CustomFormatter::new(use_ansi))
            .with_ansi(use_ansi);
        tracing_subscriber::registry().with(env_filter).with(layer).init();
    }
}

fn atty_stdout() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}
