//! Playlist Driver (§4.12). Resolves a playlist descriptor, then runs the
//! per-item path from `pipeline::process_single_item` over each entry —
//! sequentially by default (§9 Open Question: this spec's source had both
//! variants; sequential is the documented default here), with an optional
//! N-way override via `playlist_concurrency`. New module: the teacher has
//! no playlist concept, so this follows the per-item result aggregation
//! idiom already established in `pipeline.rs`.

use futures::stream::{self, StreamExt};

use crate::common::errors::{PipelineError, PipelineResult};
use crate::normalizer::{Normalized, NormalizedTarget};
use crate::options::Options;
use crate::pipeline::{self, Context, ItemOutcome, ItemReport};
use crate::tagger::PlaylistContext;

/// Runs every entry of the playlist `target` resolves to, aggregating
/// per-item outcomes and emitting a final summary line (§4.12). Returns
/// `Unsupported` if the playlist itself has no entries, or if every entry
/// failed.
pub async fn run_playlist(ctx: &Context, target: &Normalized, opts: &Options) -> PipelineResult<Vec<ItemReport>> {
    let extractor = ctx
        .registry
        .dispatch(target)
        .ok_or_else(|| PipelineError::unsupported("no extractor claims this playlist"))?;

    let descriptor = extractor.resolve_playlist(target, &ctx.transport, &ctx.cancel).await?;

    if descriptor.entries.is_empty() {
        return Err(PipelineError::unsupported("playlist has no videos"));
    }

    let total = descriptor.entries.len();
    let concurrency = opts.playlist_concurrency.max(1);

    let reports = if concurrency == 1 {
        let mut reports = Vec::with_capacity(total);
        for (index, entry) in descriptor.entries.iter().enumerate() {
            ctx.cancel
                .check()
                .map_err(|_| PipelineError::interrupted("playlist run cancelled"))?;
            let entry_target = Normalized {
                target: NormalizedTarget::Url(entry.url.clone()),
                is_music: target.is_music,
            };
            let playlist_ctx = PlaylistContext {
                id: descriptor.id.clone(),
                title: descriptor.title.clone(),
                index,
                total,
            };
            let report = pipeline::process_single_item(ctx, &entry_target, opts, Some(playlist_ctx)).await;
            emit_item_record(opts, &report, index, total, &descriptor.id, descriptor.title.as_deref());
            reports.push(report);
        }
        reports
    } else {
        let entries: Vec<_> = descriptor.entries.iter().cloned().enumerate().collect();
        stream::iter(entries)
            .map(|(index, entry)| {
                let entry_target = Normalized {
                    target: NormalizedTarget::Url(entry.url.clone()),
                    is_music: target.is_music,
                };
                let playlist_ctx = PlaylistContext {
                    id: descriptor.id.clone(),
                    title: descriptor.title.clone(),
                    index,
                    total,
                };
                async move { pipeline::process_single_item(ctx, &entry_target, opts, Some(playlist_ctx)).await }
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await
    };

    let (ok, failed, skipped, bytes) = summarize(&reports);
    print_summary(ok, failed, skipped, total, bytes);

    if ok == 0 {
        return Err(PipelineError::unsupported("no playlist entries downloaded successfully"));
    }

    Ok(reports)
}

fn summarize(reports: &[ItemReport]) -> (usize, usize, usize, u64) {
    let mut ok = 0;
    let mut failed = 0;
    let mut skipped = 0;
    let mut bytes = 0u64;
    for r in reports {
        match &r.outcome {
            ItemOutcome::Ok { bytes_written, .. } => {
                ok += 1;
                bytes += bytes_written;
            }
            ItemOutcome::Failed(_) => failed += 1,
            ItemOutcome::Skipped => skipped += 1,
        }
    }
    (ok, failed, skipped, bytes)
}

fn print_summary(ok: usize, failed: usize, skipped: usize, total: usize, bytes: u64) {
    println!("OK={ok} FAIL={failed} SKIP={skipped} TOTAL={total} SIZE={bytes}");
}

fn emit_item_record(opts: &Options, report: &ItemReport, index: usize, total: usize, playlist_id: &str, playlist_title: Option<&str>) {
    if !opts.json {
        match &report.outcome {
            ItemOutcome::Ok { output, .. } => {
                println!("OK   [{}/{}] {} -> {}", index + 1, total, report.source_url, output.display());
            }
            ItemOutcome::Failed(e) => {
                println!("FAIL [{}/{}] {}: {}", index + 1, total, report.source_url, e);
            }
            ItemOutcome::Skipped => {
                println!("SKIP [{}/{}] {}", index + 1, total, report.source_url);
            }
        }
        return;
    }

    let (status, extra) = match &report.outcome {
        ItemOutcome::Ok { bytes_written, output, retried, had_progress } => (
            "ok",
            serde_json::json!({
                "output": output.to_string_lossy(),
                "bytes": bytes_written,
                "retried": retried,
                "had_progress": had_progress,
            }),
        ),
        ItemOutcome::Failed(e) => ("error", serde_json::json!({ "error": e.to_string() })),
        ItemOutcome::Skipped => ("skip", serde_json::json!({})),
    };

    let mut record = serde_json::json!({
        "type": "item",
        "status": status,
        "url": report.source_url,
        "playlist_id": playlist_id,
        "playlist_title": playlist_title,
        "index": index,
        "total": total,
    });
    if let (Some(obj), Some(extra_obj)) = (record.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            obj.insert(k.clone(), v.clone());
        }
    }
    println!("{record}");
}
