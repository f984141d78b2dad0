//! `Process(ctx, url, opts)` orchestrator (§2 control flow). Wires every
//! other module together: Normalizer → (playlist fan-out) → Extractor →
//! Metadata Resolver → Format Selector → Path Resolver → Duplicate Policy
//! → Progressive/Segment download → Output Validator → Tagger. New
//! top-level module; the teacher has no equivalent (its entry point wires
//! a Discord gateway, not a one-shot CLI run), but every step it calls
//! into is grounded in its own file as documented there.

use std::path::PathBuf;
use std::sync::Arc;

use crate::common::errors::{Category, PipelineError, PipelineResult};
use crate::common::http::Transport;
use crate::common::types::CancelToken;
use crate::download::{self, segment::SegmentPlan};
use crate::duplicate::{self, DuplicateOutcome};
use crate::format::{self, FormatKind, SelectionMode};
use crate::format::descriptor::VideoDescriptor;
use crate::normalizer::{self, Normalized};
use crate::options::{resolve_concurrency, DuplicateSession, Options};
use crate::path_resolver;
use crate::playlist;
use crate::progress::ProgressSink;
use crate::sources::Registry;
use crate::sources::youtube::dash;
use crate::tagger::{self, PlaylistContext, SidecarRecord};
use crate::validator;

/// Shared, immutable-for-the-run collaborators (§5 "shared resources").
pub struct Context {
    pub registry: Registry,
    pub transport: Transport,
    pub cancel: CancelToken,
    pub progress: Arc<dyn ProgressSink>,
    pub duplicate_session: DuplicateSession,
}

impl Context {
    pub fn new(registry: Registry, transport: Transport, progress: Arc<dyn ProgressSink>, opts: &Options) -> Self {
        Self {
            registry,
            transport,
            cancel: CancelToken::new(),
            progress,
            duplicate_session: DuplicateSession::new(opts.on_duplicate),
        }
    }
}

#[derive(Debug)]
pub enum ItemOutcome {
    Ok {
        bytes_written: u64,
        output: PathBuf,
        retried: bool,
        had_progress: bool,
    },
    Failed(PipelineError),
    Skipped,
}

pub struct ItemReport {
    pub source_url: String,
    pub extractor_name: String,
    pub outcome: ItemOutcome,
}

/// Entry point (§2). Normalizes `url`, dispatches to an extractor, and
/// either runs the single-item path or hands off to the Playlist Driver.
pub async fn process(ctx: &Context, url: &str, opts: &Options) -> PipelineResult<Vec<ItemReport>> {
    let normalized = normalizer::normalize(url)?;

    let extractor = ctx
        .registry
        .dispatch(&normalized)
        .ok_or_else(|| PipelineError::unsupported(format!("no extractor claims '{url}'")))?;

    if extractor.is_playlist(&normalized) {
        if opts.info_only || opts.list_formats {
            let descriptor = extractor
                .resolve_playlist(&normalized, &ctx.transport, &ctx.cancel)
                .await?;
            print_playlist_info(&descriptor);
            return Ok(Vec::new());
        }
        return playlist::run_playlist(ctx, &normalized, opts).await;
    }

    if opts.info_only || opts.list_formats {
        let video = extractor
            .resolve_video(&normalized, &ctx.transport, &ctx.cancel)
            .await?;
        if opts.list_formats {
            print_formats(&video);
        } else {
            print_video_info(&video);
        }
        return Ok(Vec::new());
    }

    let report = process_single_item(ctx, &normalized, opts, None).await;
    Ok(vec![report])
}

/// Core per-item path (§4.4 through §4.14), reused by the Playlist Driver
/// for each entry.
pub async fn process_single_item(
    ctx: &Context,
    normalized: &Normalized,
    opts: &Options,
    playlist_ctx: Option<PlaylistContext>,
) -> ItemReport {
    let source_url = describe_target(normalized);

    let extractor = match ctx.registry.dispatch(normalized) {
        Some(e) => e,
        None => {
            return failed_report(&source_url, "unknown", None, PipelineError::unsupported("no extractor matched"), playlist_ctx)
        }
    };
    let extractor_name = extractor.name().to_string();

    let mut video = match extractor.resolve_video(normalized, &ctx.transport, &ctx.cancel).await {
        Ok(v) => v,
        Err(e) => return failed_report(&source_url, &extractor_name, None, e, playlist_ctx),
    };

    apply_meta_overrides(&mut video, &opts.meta_overrides);

    let mode = if opts.audio_only {
        SelectionMode::AudioOnly
    } else {
        SelectionMode::Video
    };

    let selected = match format::select_format(&video, mode, &opts.quality, opts.container.as_deref()) {
        Some(f) => f.clone(),
        None => {
            return failed_report(
                &source_url,
                &extractor_name,
                Some(&video),
                PipelineError::unsupported("no format matches the requested constraints"),
                playlist_ctx,
            )
        }
    };

    let ext = output_extension(&selected);
    let output_path = match path_resolver::resolve_output_path(
        &opts.output_dir,
        &opts.output_template,
        &video,
        Some(&ext),
        None,
        &opts.quality,
        playlist_ctx.as_ref(),
    ) {
        Ok(p) => p,
        Err(e) => return failed_report(&source_url, &extractor_name, Some(&video), e, playlist_ctx),
    };

    let outcome = resolve_and_download(ctx, opts, &video, &selected, &output_path).await;

    match outcome {
        Ok(DownloadOutcome::Written { bytes, path, retried, had_progress }) => {
            let record = SidecarRecord::for_success(
                &video,
                &extractor_name,
                &path,
                Some(selected.container.clone()),
                Some(quality_label(opts)),
                playlist_ctx,
                Vec::new(),
            );
            if let Err(e) = tagger::write_sidecar(&path, &record).await {
                tracing::warn!(error = %e, "failed to write sidecar record");
            }
            ItemReport {
                source_url,
                extractor_name,
                outcome: ItemOutcome::Ok { bytes_written: bytes, output: path, retried, had_progress },
            }
        }
        Ok(DownloadOutcome::Skipped) => {
            let record = SidecarRecord::for_failure(&source_url, &extractor_name, "skip", "destination exists", playlist_ctx);
            let _ = tagger::write_sidecar(&output_path, &record).await;
            ItemReport { source_url, extractor_name, outcome: ItemOutcome::Skipped }
        }
        Err(e) => {
            e.mark_reported();
            let record = SidecarRecord::for_failure(&source_url, &extractor_name, "error", e.to_string(), playlist_ctx);
            let _ = tagger::write_sidecar(&output_path, &record).await;
            ItemReport { source_url, extractor_name, outcome: ItemOutcome::Failed(e) }
        }
    }
}

enum DownloadOutcome {
    Written { bytes: u64, path: PathBuf, retried: bool, had_progress: bool },
    Skipped,
}

/// A loose MIME guess for a format's container string, used only to drive
/// the Output Validator's "unknown extension + mp4 mime" override (§4.11)
/// when the output template produced an extension that doesn't match the
/// selected format's real container.
fn container_mime_hint(container: &str) -> Option<&'static str> {
    match container.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => Some("video/mp4"),
        "m4a" => Some("audio/mp4"),
        _ => None,
    }
}

async fn resolve_and_download(
    ctx: &Context,
    opts: &Options,
    video: &VideoDescriptor,
    selected: &crate::format::descriptor::FormatDescriptor,
    output_path: &PathBuf,
) -> PipelineResult<DownloadOutcome> {
    let duplicate = duplicate::resolve_duplicate(&ctx.duplicate_session, output_path)?;
    let output_path = match duplicate {
        DuplicateOutcome::Skip => return Ok(DownloadOutcome::Skipped),
        DuplicateOutcome::Proceed(p) => p,
    };

    let item_id = video.id.clone();

    let (retried, had_progress) = if selected.kind == FormatKind::Adaptive {
        let manifest_url = selected
            .manifest_url
            .clone()
            .ok_or_else(|| PipelineError::unsupported("adaptive format has no manifest URL"))?;
        download_adaptive(ctx, opts, &manifest_url, &output_path, &item_id).await?;
        (false, true)
    } else {
        let result = download::progressive::download_progressive(
            &ctx.transport,
            selected,
            &output_path,
            &ctx.cancel,
            ctx.progress.as_ref(),
            &item_id,
        )
        .await?;
        download::progressive::extract_audio_if_requested(&output_path, opts.audio_only).await?;
        (result.retried, result.had_progress)
    };

    path_resolver::verify_descendant(&opts.output_dir, &output_path)?;
    let mime_hint = container_mime_hint(&selected.container);
    validator::validate_output(&output_path, mime_hint).await?;

    let bytes = tokio::fs::metadata(&output_path)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    Ok(DownloadOutcome::Written { bytes, path: output_path, retried, had_progress })
}

async fn download_adaptive(
    ctx: &Context,
    opts: &Options,
    manifest_url: &str,
    output_path: &PathBuf,
    item_id: &str,
) -> PipelineResult<()> {
    let concurrency = resolve_concurrency(opts.segment_concurrency);

    if manifest_url.contains(".m3u8") {
        let (segments, map, encrypted) =
            crate::sources::youtube::hls::resolve_playlist(ctx.transport.client(), manifest_url, &ctx.cancel).await?;
        if encrypted {
            return Err(PipelineError::restricted("HLS stream is encrypted (EXT-X-KEY METHOD != NONE)"));
        }
        let plan = SegmentPlan {
            manifest_url: manifest_url.to_string(),
            init_url: map.map(|r| r.url),
            media_urls: segments.into_iter().map(|r| r.url).collect(),
        };
        download::download_segments(&ctx.transport, &plan, output_path, concurrency, &ctx.cancel, ctx.progress.as_ref(), item_id).await?;
    } else {
        let response = ctx
            .transport
            .client()
            .get(manifest_url)
            .send()
            .await
            .map_err(|e| PipelineError::network(format!("DASH manifest fetch failed: {e}")))?;
        let text = response
            .text()
            .await
            .map_err(|e| PipelineError::network(format!("DASH manifest body read failed: {e}")))?;

        let manifest = dash::parse_mpd(&text, manifest_url)?;
        if manifest.encrypted {
            return Err(PipelineError::restricted("DASH manifest carries a DRM ContentProtection marker"));
        }

        let mode_video = !opts.audio_only;
        let rep = manifest
            .representations
            .iter()
            .filter(|r| r.is_video == mode_video)
            .max_by_key(|r| (r.height.unwrap_or(0), r.bandwidth.unwrap_or(0)))
            .or_else(|| manifest.representations.iter().max_by_key(|r| r.bandwidth.unwrap_or(0)))
            .ok_or_else(|| PipelineError::unsupported("DASH manifest has no usable representation"))?;

        let plan = SegmentPlan {
            manifest_url: manifest_url.to_string(),
            init_url: rep.init_url.clone(),
            media_urls: rep.media_urls.clone(),
        };
        download::download_segments(&ctx.transport, &plan, output_path, concurrency, &ctx.cancel, ctx.progress.as_ref(), item_id).await?;
    }
    Ok(())
}

fn output_extension(format: &crate::format::descriptor::FormatDescriptor) -> String {
    if format.kind == FormatKind::Adaptive {
        let manifest = format.manifest_url.as_deref().unwrap_or("");
        if manifest.contains(".mpd") {
            "mp4".to_string()
        } else {
            "ts".to_string()
        }
    } else {
        format.container.clone()
    }
}

fn quality_label(opts: &Options) -> String {
    match &opts.quality {
        crate::options::QualitySelector::Best => "best".to_string(),
        crate::options::QualitySelector::Worst => "worst".to_string(),
        crate::options::QualitySelector::Itag(i) => format!("itag:{i}"),
        crate::options::QualitySelector::Height(h) => format!("{h}p"),
        crate::options::QualitySelector::BitrateKbps(k) => format!("{k}k"),
    }
}

fn apply_meta_overrides(video: &mut VideoDescriptor, overrides: &[(String, String)]) {
    for (key, value) in overrides {
        match key.as_str() {
            "title" => video.title = value.clone(),
            "author" | "uploader" => video.uploader = Some(value.clone()),
            "artist" | "album" => {
                let music = video.music.get_or_insert_with(|| crate::format::descriptor::MusicMetadata {
                    album: None,
                    artist: None,
                    track_number: None,
                    release_date: None,
                });
                if key == "artist" {
                    music.artist = Some(value.clone());
                } else {
                    music.album = Some(value.clone());
                }
            }
            _ => tracing::debug!(key, "unrecognized meta override field, ignoring"),
        }
    }
}

fn describe_target(normalized: &Normalized) -> String {
    match &normalized.target {
        crate::normalizer::NormalizedTarget::Url(u) => u.clone(),
        crate::normalizer::NormalizedTarget::PlaylistId(id) => id.clone(),
    }
}

/// Builds a failure report for an error that happened before an output
/// path existed (extractor dispatch, metadata resolution, format
/// selection, path resolution itself). No sidecar is written here — §6
/// ties the sidecar to an output artifact, which doesn't exist yet.
fn failed_report(
    source_url: &str,
    extractor_name: &str,
    _video: Option<&VideoDescriptor>,
    error: PipelineError,
    _playlist_ctx: Option<PlaylistContext>,
) -> ItemReport {
    error.mark_reported();
    ItemReport {
        source_url: source_url.to_string(),
        extractor_name: extractor_name.to_string(),
        outcome: ItemOutcome::Failed(error),
    }
}

fn print_video_info(video: &VideoDescriptor) {
    match serde_json::to_string_pretty(&serde_json::json!({
        "id": video.id,
        "title": video.title,
        "uploader": video.uploader,
        "duration_secs": video.duration_secs,
        "source_url": video.source_url,
    })) {
        Ok(s) => println!("{s}"),
        Err(e) => tracing::error!(error = %e, "failed to render video info"),
    }
}

fn print_formats(video: &VideoDescriptor) {
    for f in &video.formats {
        println!(
            "itag={:<6} kind={:?} container={:<5} height={:<5} bitrate={}",
            f.itag.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string()),
            f.kind,
            f.container,
            f.height.map(|h| h.to_string()).unwrap_or_else(|| "-".to_string()),
            f.bitrate.map(|b| b.to_string()).unwrap_or_else(|| "-".to_string()),
        );
    }
}

fn print_playlist_info(playlist: &crate::format::descriptor::PlaylistDescriptor) {
    println!("playlist {} ({} entries)", playlist.id, playlist.entries.len());
    for entry in &playlist.entries {
        println!("  {} {}", entry.id, entry.title.as_deref().unwrap_or("(untitled)"));
    }
}

pub fn category_for_worst(reports: &[ItemReport]) -> Option<Category> {
    reports
        .iter()
        .filter_map(|r| match &r.outcome {
            ItemOutcome::Failed(e) => Some(e.category),
            _ => None,
        })
        .max_by_key(|c| c.exit_code())
}
