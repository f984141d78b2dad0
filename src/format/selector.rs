//! Format Selector (§4.5). Generalizes the teacher's itag-priority audio
//! picker (`clients/common.rs::select_best_audio_format`) into the full
//! decision order the spec requires: itag exact match, mode filter,
//! container filter with fallback, then ranking.

use crate::format::descriptor::{FormatDescriptor, FormatKind, VideoDescriptor};
use crate::options::QualitySelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Video,
    AudioOnly,
}

/// Picks one format from `video.formats` per §4.5's decision order:
/// 1. An explicit itag always wins if present, regardless of mode/container.
/// 2. Otherwise filter by mode (audio-only vs video-capable).
/// 3. Apply the requested container if any formats match it; otherwise fall
///    back to the unfiltered set (container is a preference, not a hard
///    requirement, §4.5 edge case).
/// 4. Rank the remaining candidates:
///    - `Best` + video mode: highest resolution, tie-break by bitrate.
///    - `Worst`: lowest resolution (or bitrate for audio), tie-break by
///      lowest bitrate.
///    - `Best` + audio mode: highest bitrate.
/// Adaptive (HLS/DASH) formats are included in the candidate pool and rank
/// alongside progressive ones; if nothing else matches, the caller falls
/// through to the Segment Planner (§4.9) using any remaining `Adaptive`
/// format.
pub fn select_format<'a>(
    video: &'a VideoDescriptor,
    mode: SelectionMode,
    quality: &QualitySelector,
    container: Option<&str>,
) -> Option<&'a FormatDescriptor> {
    if let QualitySelector::Itag(target) = quality {
        if let Some(f) = video.formats.iter().find(|f| f.itag == Some(*target)) {
            return Some(f);
        }
    }

    let mode_filtered: Vec<&FormatDescriptor> = video
        .formats
        .iter()
        .filter(|f| match mode {
            SelectionMode::Video => f.is_video_capable(),
            SelectionMode::AudioOnly => f.is_audio_capable(),
        })
        .collect();

    if mode_filtered.is_empty() {
        return None;
    }

    let candidates: Vec<&FormatDescriptor> = match container {
        Some(want) => {
            let matched: Vec<&FormatDescriptor> = mode_filtered
                .iter()
                .copied()
                .filter(|f| f.container.eq_ignore_ascii_case(want))
                .collect();
            if matched.is_empty() {
                mode_filtered
            } else {
                matched
            }
        }
        None => mode_filtered,
    };

    match (mode, quality) {
        (SelectionMode::Video, QualitySelector::Worst) => candidates
            .into_iter()
            .min_by_key(|f| (f.height.unwrap_or(u32::MAX), f.bitrate.unwrap_or(u64::MAX))),
        (SelectionMode::Video, QualitySelector::Height(target)) => {
            closest_at_or_below(candidates, *target, |f| f.height.unwrap_or(0))
        }
        (SelectionMode::Video, _) => candidates
            .into_iter()
            .max_by_key(|f| (f.height.unwrap_or(0), f.bitrate.unwrap_or(0))),
        (SelectionMode::AudioOnly, QualitySelector::Worst) => {
            candidates.into_iter().min_by_key(|f| f.bitrate.unwrap_or(u64::MAX))
        }
        (SelectionMode::AudioOnly, QualitySelector::BitrateKbps(target)) => {
            closest_at_or_below(candidates, target.saturating_mul(1000), |f| f.bitrate.unwrap_or(0))
        }
        (SelectionMode::Video, QualitySelector::BitrateKbps(target)) => {
            closest_at_or_below(candidates, target.saturating_mul(1000), |f| f.bitrate.unwrap_or(0))
        }
        (SelectionMode::AudioOnly, QualitySelector::Height(_)) => {
            candidates.into_iter().max_by_key(|f| f.bitrate.unwrap_or(0))
        }
        (SelectionMode::AudioOnly, _) => {
            candidates.into_iter().max_by_key(|f| f.bitrate.unwrap_or(0))
        }
    }
}

/// Picks the candidate whose `metric` is the largest value `<= target`; if
/// none qualify (every candidate exceeds the target), falls back to the
/// candidate with the smallest `metric` overall (closest available above).
fn closest_at_or_below<T, K, F>(candidates: Vec<&T>, target: K, metric: F) -> Option<&T>
where
    K: Ord + Copy,
    F: Fn(&T) -> K,
{
    let under_or_eq = candidates
        .iter()
        .copied()
        .filter(|f| metric(f) <= target)
        .max_by_key(|f| metric(f));
    under_or_eq.or_else(|| candidates.into_iter().min_by_key(|f| metric(f)))
}

/// True when the selected format still needs segment planning (§4.9).
pub fn needs_segment_planning(format: &FormatDescriptor) -> bool {
    format.kind == FormatKind::Adaptive && format.url.is_none() && format.manifest_url.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(itag: i64, kind: FormatKind, height: u32, bitrate: u64, container: &str) -> FormatDescriptor {
        FormatDescriptor {
            itag: Some(itag),
            kind,
            container: container.to_string(),
            url: Some("https://example.com/x".to_string()),
            manifest_url: None,
            bitrate: Some(bitrate),
            width: None,
            height: Some(height),
            fps: None,
            audio_codec: None,
            video_codec: None,
            filesize: None,
        }
    }

    fn video(formats: Vec<FormatDescriptor>) -> VideoDescriptor {
        VideoDescriptor {
            id: "abc".into(),
            title: "t".into(),
            uploader: None,
            duration_secs: None,
            publish_date: None,
            description: None,
            thumbnail_url: None,
            formats,
            music: None,
            source_url: "https://example.com".into(),
        }
    }

    #[test]
    fn itag_exact_match_bypasses_everything() {
        let v = video(vec![
            fmt(18, FormatKind::Progressive, 360, 500_000, "mp4"),
            fmt(137, FormatKind::VideoOnly, 1080, 4_000_000, "mp4"),
        ]);
        let picked = select_format(&v, SelectionMode::AudioOnly, &QualitySelector::Itag(137), None).unwrap();
        assert_eq!(picked.itag, Some(137));
    }

    #[test]
    fn best_video_picks_highest_resolution() {
        let v = video(vec![
            fmt(18, FormatKind::Progressive, 360, 500_000, "mp4"),
            fmt(22, FormatKind::Progressive, 720, 2_000_000, "mp4"),
        ]);
        let picked = select_format(&v, SelectionMode::Video, &QualitySelector::Best, None).unwrap();
        assert_eq!(picked.height, Some(720));
    }

    #[test]
    fn container_preference_falls_back_when_unmatched() {
        let v = video(vec![fmt(18, FormatKind::Progressive, 360, 500_000, "mp4")]);
        let picked = select_format(&v, SelectionMode::Video, &QualitySelector::Best, Some("webm")).unwrap();
        assert_eq!(picked.container, "mp4");
    }

    #[test]
    fn height_target_picks_closest_at_or_below() {
        let v = video(vec![
            fmt(18, FormatKind::Progressive, 360, 500_000, "mp4"),
            fmt(22, FormatKind::Progressive, 720, 2_000_000, "mp4"),
            fmt(137, FormatKind::VideoOnly, 1080, 4_000_000, "mp4"),
        ]);
        let picked = select_format(&v, SelectionMode::Video, &QualitySelector::Height(720), None).unwrap();
        assert_eq!(picked.height, Some(720));
    }

    #[test]
    fn height_target_below_everything_falls_back_to_smallest() {
        let v = video(vec![
            fmt(22, FormatKind::Progressive, 720, 2_000_000, "mp4"),
            fmt(137, FormatKind::VideoOnly, 1080, 4_000_000, "mp4"),
        ]);
        let picked = select_format(&v, SelectionMode::Video, &QualitySelector::Height(240), None).unwrap();
        assert_eq!(picked.height, Some(720));
    }

    #[test]
    fn bitrate_target_picks_closest_at_or_below_kbps() {
        let v = video(vec![
            fmt(139, FormatKind::AudioOnly, 0, 48_000, "m4a"),
            fmt(140, FormatKind::AudioOnly, 0, 128_000, "m4a"),
            fmt(141, FormatKind::AudioOnly, 0, 256_000, "m4a"),
        ]);
        let picked = select_format(&v, SelectionMode::AudioOnly, &QualitySelector::BitrateKbps(128), None).unwrap();
        assert_eq!(picked.bitrate, Some(128_000));
    }
}
