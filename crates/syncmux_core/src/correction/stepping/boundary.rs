//! Boundary refinement: binary search, silence snap, video snap.
//!
//! Timeline bookkeeping matters here. The binary search runs on the
//! reference timeline; silence detection runs on the target timeline (that
//! is where the cut lands); video snapping runs on the reference timeline
//! and is only accepted if the snapped position, converted back through the
//! before-delay, still sits inside the silence zone.

use std::path::Path;

use serde_json::Value;

use super::scan::delay_for_chunk;
use super::silence::{snap_boundary_to_silence, BoundaryAudit};
use crate::config::{SegmentSettings, SteppingSettings};
use crate::io::{argv, CommandRunner};

/// Locate the reference-timeline boundary where the delay flips from
/// `delay_before` to `delay_after` inside the zone, then snap it.
///
/// Returns the final boundary (reference timeline) and the audit record of
/// the snap decisions.
#[allow(clippy::too_many_arguments)]
pub fn find_boundary_in_zone(
    ref_pcm: &[i32],
    target_pcm: &[i32],
    sample_rate: u32,
    zone_start_s: f64,
    zone_end_s: f64,
    delay_before: i64,
    delay_after: i64,
    ref_file: Option<&Path>,
    target_file: Option<&Path>,
    segment: &SegmentSettings,
    stepping: &SteppingSettings,
    runner: &CommandRunner,
) -> (f64, Option<BoundaryAudit>) {
    let logger = runner.logger().clone();
    logger.message(&format!(
        "  [SteppingCorrector] Stage 2: Performing fine scan in zone {:.1}s - {:.1}s...",
        zone_start_s, zone_end_s
    ));

    let chunk_samples = (segment.fine_chunk_s * sample_rate as f64) as usize;
    let locality_samples = (segment.search_locality_s * sample_rate as f64) as usize;
    let mut low = (zone_start_s * sample_rate as f64) as usize;
    let mut high = (zone_end_s * sample_rate as f64) as usize;

    for _ in 0..segment.fine_iterations {
        if high.saturating_sub(low) < chunk_samples {
            break;
        }
        let mid = (low + high) / 2;
        match delay_for_chunk(
            ref_pcm,
            target_pcm,
            mid,
            chunk_samples,
            sample_rate,
            locality_samples,
            segment.min_confidence_ratio,
        ) {
            Some((delay_ms, _)) => {
                if (delay_ms - delay_before).abs() < (delay_ms - delay_after).abs() {
                    low = mid;
                } else {
                    high = mid;
                }
            }
            None => {
                // Unmeasurable chunk (silence); skip past it.
                low += chunk_samples;
            }
        }
    }

    let boundary_ref_s = high as f64 / sample_rate as f64;
    let boundary_target_s = boundary_ref_s + delay_before as f64 / 1000.0;
    logger.message(&format!(
        "    - [Boundary Detection] Initial position: ref {:.3}s, target {:.3}s (ref + {}ms delay)",
        boundary_ref_s, boundary_target_s, delay_before
    ));

    // Silence snap on the target timeline.
    let (snapped_target_s, mut audit) = snap_boundary_to_silence(
        target_pcm,
        sample_rate,
        boundary_target_s,
        target_file,
        stepping,
        runner,
    );
    if let Some(audit) = audit.as_mut() {
        audit.target_time_s = snapped_target_s;
        audit.delay_change_ms = delay_after - delay_before;
    }
    let mut final_ref_s = snapped_target_s - delay_before as f64 / 1000.0;

    if (snapped_target_s - boundary_target_s).abs() > 0.001 {
        logger.message(&format!(
            "    - [After Audio Snap] ref {:.3}s (moved {:+.3}s), target {:.3}s (silence center)",
            final_ref_s,
            snapped_target_s - boundary_target_s,
            snapped_target_s
        ));
    }

    // Optional video snap on the reference timeline.
    if stepping.snap_to_video_frames {
        if let (Some(ref_file), Some(audit_ref)) = (ref_file, audit.as_mut()) {
            let snapped =
                snap_boundary_to_keyframe(ref_file, final_ref_s, stepping, runner);
            if (snapped - final_ref_s).abs() > 0.001 {
                let snapped_target = snapped + delay_before as f64 / 1000.0;
                let inside_zone = audit_ref.no_silence_found
                    || (snapped_target >= audit_ref.zone_start
                        && snapped_target <= audit_ref.zone_end);
                if inside_zone {
                    logger.message(&format!(
                        "    - [Video Snap] Moved boundary to keyframe: ref {:.3}s -> {:.3}s",
                        final_ref_s, snapped
                    ));
                    final_ref_s = snapped;
                    audit_ref.video_snap_applied = true;
                } else {
                    logger.message(&format!(
                        "    - [Video Snap] Keyframe at {:.3}s leaves the silence zone [{:.3}s - {:.3}s]; keeping audio snap",
                        snapped, audit_ref.zone_start, audit_ref.zone_end
                    ));
                    audit_ref.video_snap_skipped = true;
                }
            }
        }
    }

    let final_target_s = final_ref_s + delay_before as f64 / 1000.0;
    let delta = delay_after - delay_before;
    logger.message(&format!(
        "    - [Final Boundary] ref {:.3}s, target {:.3}s, action {} {}ms",
        final_ref_s,
        final_target_s,
        if delta > 0 { "ADD" } else { "REMOVE" },
        delta.abs()
    ));

    (final_ref_s, audit)
}

/// Keyframe timestamps of the first video stream, sorted.
pub fn get_keyframes(video_file: &Path, runner: &CommandRunner) -> Vec<f64> {
    let cmd = argv([
        "ffprobe".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v:0".to_string(),
        "-show_entries".to_string(),
        "packet=pts_time,flags".to_string(),
        "-of".to_string(),
        "json".to_string(),
        video_file.to_string_lossy().into_owned(),
    ]);
    let Ok(output) = runner.run(&cmd) else {
        return Vec::new();
    };
    parse_keyframe_packets(&output)
}

/// Parse keyframe pts out of ffprobe packet JSON.
pub fn parse_keyframe_packets(json_text: &str) -> Vec<f64> {
    let Ok(json) = serde_json::from_str::<Value>(json_text) else {
        return Vec::new();
    };
    let mut keyframes: Vec<f64> = json
        .get("packets")
        .and_then(|p| p.as_array())
        .map(|packets| {
            packets
                .iter()
                .filter(|p| {
                    p.get("flags")
                        .and_then(|f| f.as_str())
                        .is_some_and(|f| f.contains('K'))
                })
                .filter_map(|p| {
                    p.get("pts_time")
                        .and_then(|t| t.as_str())
                        .and_then(|t| t.parse().ok())
                })
                .collect()
        })
        .unwrap_or_default();
    keyframes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    keyframes
}

fn snap_boundary_to_keyframe(
    video_file: &Path,
    boundary_s: f64,
    settings: &SteppingSettings,
    runner: &CommandRunner,
) -> f64 {
    let keyframes = get_keyframes(video_file, runner);
    if keyframes.is_empty() {
        runner
            .logger()
            .message("    - [Video Snap] No keyframes detected, keeping audio-based boundary");
        return boundary_s;
    }

    let nearest = keyframes
        .iter()
        .copied()
        .min_by(|a, b| {
            (a - boundary_s)
                .abs()
                .partial_cmp(&(b - boundary_s).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(boundary_s);

    if (nearest - boundary_s).abs() <= settings.video_snap_max_offset_s {
        nearest
    } else {
        runner.logger().message(&format!(
            "    - [Video Snap] Nearest keyframe at {:.3}s is too far ({:+.3}s > {:.1}s)",
            nearest,
            nearest - boundary_s,
            settings.video_snap_max_offset_s
        ));
        boundary_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ToolPaths;
    use crate::logging::{JobLogger, LogConfig};
    use std::sync::Arc;

    fn runner() -> CommandRunner {
        let logger = Arc::new(JobLogger::sink_only("bnd", LogConfig::default(), None));
        CommandRunner::new(logger, ToolPaths::bare())
    }

    fn wideband(i: usize) -> f64 {
        ((i * i % 1223) as f64 / 1223.0 - 0.5) + (i as f64 * 0.05).sin()
    }

    #[test]
    fn binary_search_localizes_transition() {
        // Target drops 2400 samples (300 ms at 8 kHz) at ref position 20 s:
        // before the cut delay = 0, after the cut the target is early by
        // 300 ms (content removed from the target).
        let sr = 8000u32;
        let cut_ref_s = 20.0;
        let cut_sample = (cut_ref_s * sr as f64) as usize;
        let removed = (0.3 * sr as f64) as usize;

        let reference: Vec<i32> = (0..sr as usize * 40).map(|i| (wideband(i) * 1e8) as i32).collect();
        let mut target = reference[..cut_sample].to_vec();
        target.extend_from_slice(&reference[cut_sample + removed..]);

        let mut segment = SegmentSettings::default();
        segment.fine_chunk_s = 1.0;
        segment.search_locality_s = 2.0;
        segment.fine_iterations = 16;
        segment.min_confidence_ratio = 2.0;
        let mut stepping = SteppingSettings::default();
        stepping.snap_to_silence = false;
        stepping.snap_to_video_frames = false;

        let (boundary, _) = find_boundary_in_zone(
            &reference,
            &target,
            sr,
            10.0,
            30.0,
            0,
            300,
            None,
            None,
            &segment,
            &stepping,
            &runner(),
        );
        assert!(
            (boundary - cut_ref_s).abs() < 2.0,
            "boundary {} expected near {}",
            boundary,
            cut_ref_s
        );
    }

    #[test]
    fn keyframe_packets_parse_and_sort() {
        let json = r#"{"packets": [
            {"pts_time": "4.0", "flags": "K__"},
            {"pts_time": "0.0", "flags": "K__"},
            {"pts_time": "1.0", "flags": "___"},
            {"pts_time": "2.0", "flags": "K__"}
        ]}"#;
        let kf = parse_keyframe_packets(json);
        assert_eq!(kf, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn malformed_packet_json_yields_empty() {
        assert!(parse_keyframe_packets("not json").is_empty());
        assert!(parse_keyframe_packets("{}").is_empty());
    }
}
