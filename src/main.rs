// Copyright (c) 2026 appujet, notdeltaxd and contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use vodget::common::banner::{print_banner, BannerInfo};
use vodget::common::errors::Category;
use vodget::common::http::Transport;
use vodget::common::logger;
use vodget::config::Config;
use vodget::options::{OnDuplicate, Options, QualitySelector};
use vodget::pipeline::{self, Context};
use vodget::progress::{MultiBarProgress, NullProgress, ProgressSink};
use vodget::sources::direct::DirectExtractor;
use vodget::sources::youtube::cipher::CipherConfig;
use vodget::sources::youtube::YouTubeExtractor;
use vodget::sources::Registry;

/// Resolves one or more URLs/playlist ids into downloaded media artifacts
/// (§2). One positional argument per target; run continues past a failed
/// target and reports the worst category as the process exit code (§7).
#[derive(Debug, Parser)]
#[command(name = "vodget", version, about)]
struct Args {
    /// URL(s) or bare playlist id(s) to resolve and download.
    #[arg(required = true)]
    targets: Vec<String>,

    /// Output filename template; trailing `/` means "directory, derive name".
    #[arg(short = 'o', long, default_value = "{title}.{ext}")]
    output: String,

    /// Base directory all resolved paths must stay under.
    #[arg(short = 'P', long = "paths", default_value = ".")]
    output_dir: PathBuf,

    /// Download audio only (extracts with ffmpeg if present on PATH).
    #[arg(short = 'x', long)]
    audio_only: bool,

    /// Print resolved metadata and exit without downloading.
    #[arg(long)]
    info_only: bool,

    /// Print available formats and exit without downloading.
    #[arg(short = 'F', long)]
    list_formats: bool,

    /// Suppress progress bars and human-readable logs below warn.
    #[arg(short, long)]
    quiet: bool,

    /// Emit machine-readable JSON-line records instead of human output.
    #[arg(long)]
    json: bool,

    /// "best", "worst", "<height>p", or "<bitrate>k".
    #[arg(long, default_value = "best")]
    quality: String,

    /// Container/extension filter, e.g. "mp4" or "webm".
    #[arg(long)]
    format: Option<String>,

    /// Exact format itag; bypasses quality/format filtering.
    #[arg(long)]
    itag: Option<i64>,

    /// Parallel segment fetches per item; 0 = auto (CPU-derived, min 4).
    #[arg(long, default_value_t = 0)]
    segment_concurrency: usize,

    /// Parallel items within a playlist; 1 = sequential (default).
    #[arg(long, default_value_t = 1)]
    playlist_concurrency: usize,

    /// Per-HTTP-operation timeout, in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Metadata override in `field=value` form; repeatable.
    #[arg(long = "meta", value_parser = parse_meta_override)]
    meta_overrides: Vec<(String, String)>,

    /// How to handle an output path that already exists.
    #[arg(long, default_value = "prompt")]
    on_duplicate: String,

    /// Remote descrambler service URL, for YouTube signature cipher solving.
    #[arg(long)]
    cipher_remote: Option<String>,

    /// Bearer token for `--cipher-remote`.
    #[arg(long)]
    cipher_token: Option<String>,

    /// Log level (overridden by `RUST_LOG`).
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_meta_override(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected field=value, got '{raw}'"))
}

fn parse_on_duplicate(raw: &str) -> OnDuplicate {
    match raw {
        "overwrite" => OnDuplicate::Overwrite,
        "skip" => OnDuplicate::Skip,
        "rename" => OnDuplicate::Rename,
        _ => OnDuplicate::Prompt,
    }
}

fn build_options(args: &Args) -> Options {
    let quality = if let Some(itag) = args.itag {
        QualitySelector::Itag(itag)
    } else {
        QualitySelector::parse(&args.quality)
    };

    Options {
        output_template: args.output.clone(),
        output_dir: args.output_dir.clone(),
        audio_only: args.audio_only,
        info_only: args.info_only,
        list_formats: args.list_formats,
        quiet: args.quiet,
        json: args.json,
        quality,
        container: args.format.clone(),
        segment_concurrency: args.segment_concurrency,
        playlist_concurrency: args.playlist_concurrency.max(1),
        timeout_secs: args.timeout,
        meta_overrides: args.meta_overrides.clone(),
        on_duplicate: parse_on_duplicate(&args.on_duplicate),
    }
}

fn build_progress(opts: &Options) -> Arc<dyn ProgressSink> {
    let tty = std::io::IsTerminal::is_terminal(&std::io::stderr());
    if opts.quiet || opts.json || !tty {
        NullProgress::new()
    } else {
        MultiBarProgress::new()
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let opts = build_options(&args);

    logger::init(args.log_level.as_deref(), opts.quiet, opts.json);

    if !opts.quiet && !opts.json {
        print_banner(&BannerInfo::default());
    }

    std::fs::create_dir_all(&opts.output_dir).unwrap_or_else(|e| {
        error!(error = %e, "failed to create output directory");
        std::process::exit(Category::Filesystem.exit_code());
    });

    let config = Config::load().await;
    let user_agent = config
        .http
        .user_agent
        .as_deref()
        .unwrap_or(vodget::common::http::USER_AGENT);
    let transport = match Transport::new(user_agent, Duration::from_secs(opts.timeout_secs)) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "failed to build HTTP transport");
            std::process::exit(Category::Network.exit_code());
        }
    };

    let cipher_config = CipherConfig {
        remote_url: args.cipher_remote.clone(),
        remote_token: args.cipher_token.clone(),
    };
    let registry = Registry::new(vec![
        Box::new(YouTubeExtractor::new(cipher_config)),
        Box::new(DirectExtractor),
    ]);

    let progress = build_progress(&opts);
    let ctx = Context::new(registry, transport, progress, &opts);

    let interrupted = Arc::new(std::sync::atomic::AtomicBool::new(false));
    spawn_signal_handler(ctx.cancel.clone(), interrupted.clone());

    info!(targets = args.targets.len(), "vodget run starting");

    let mut worst: Option<Category> = None;
    for target in &args.targets {
        if ctx.cancel.is_cancelled() {
            break;
        }
        match pipeline::process(&ctx, target, &opts).await {
            Ok(reports) => {
                if let Some(cat) = pipeline::category_for_worst(&reports) {
                    worst = Some(match worst {
                        Some(prev) if prev.exit_code() >= cat.exit_code() => prev,
                        _ => cat,
                    });
                }
            }
            Err(e) => {
                if !e.is_reported() {
                    error!(error = %e, target, "run failed");
                }
                worst = Some(match worst {
                    Some(prev) if prev.exit_code() >= e.category.exit_code() => prev,
                    _ => e.category,
                });
            }
        }
    }

    // SIGINT always wins (§5/§7): it leaves partial artifacts for resume
    // rather than a clean result, regardless of what ran before it fired.
    if interrupted.load(std::sync::atomic::Ordering::SeqCst) {
        worst = Some(Category::Interrupted);
    }

    let code = worst.map(|c| c.exit_code()).unwrap_or(0);
    std::process::exit(code);
}

/// Cancels `cancel` on SIGINT (§5/§7): every cooperative check point in the
/// pipeline (`CancelToken::check`/`cancelled`) then surfaces
/// `PipelineError::interrupted`, and partial downloads are left in place
/// with their resume state intact rather than cleaned up.
fn spawn_signal_handler(cancel: vodget::common::types::CancelToken, interrupted: Arc<std::sync::atomic::AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received interrupt signal, cancelling in-flight work");
            interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
            cancel.cancel();
        }
    });
}
