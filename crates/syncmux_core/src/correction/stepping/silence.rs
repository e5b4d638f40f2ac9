//! Silence, speech, and transient detection for boundary snapping.
//!
//! Boundaries must land in quiet spots of the *target* audio so the cut is
//! inaudible. Three detection backends are available; smart fusion scores
//! every candidate zone with silence depth, distance, duration, and
//! speech/transient avoidance.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::SteppingSettings;
use crate::io::{argv, CommandRunner};
use crate::models::SilenceDetectionMethod;

const I32_FULL_SCALE: f64 = 2_147_483_648.0;
const DB_FLOOR: f64 = -96.0;

/// A detected silence zone: `(start_s, end_s, avg_db)`.
pub type SilenceZone = (f64, f64, f64);

/// Audit record of one boundary snap decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryAudit {
    pub zone_start: f64,
    pub zone_end: f64,
    pub snap_point: f64,
    pub avg_db: f64,
    pub score: f64,
    pub overlaps_speech: bool,
    pub near_transient: bool,
    pub duration: f64,
    pub no_silence_found: bool,
    /// Final boundary on the target timeline.
    pub target_time_s: f64,
    pub delay_change_ms: i64,
    pub video_snap_applied: bool,
    pub video_snap_skipped: bool,
}

impl BoundaryAudit {
    fn no_silence(boundary_s: f64) -> Self {
        Self {
            zone_start: boundary_s,
            zone_end: boundary_s,
            snap_point: boundary_s,
            avg_db: 0.0,
            score: 0.0,
            overlaps_speech: false,
            near_transient: false,
            duration: 0.0,
            no_silence_found: true,
            target_time_s: boundary_s,
            delay_change_ms: 0,
            video_snap_applied: false,
            video_snap_skipped: false,
        }
    }
}

/// Frame-accurate silence zones via the external silencedetect filter.
///
/// The filter does not report an average level; it is approximated as
/// `threshold - 5` dB (consumers needing a true average recompute from PCM).
pub fn find_silence_zones_ffmpeg(
    audio_file: &Path,
    start_s: f64,
    end_s: f64,
    threshold_db: f64,
    min_duration_s: f64,
    runner: &CommandRunner,
) -> Vec<SilenceZone> {
    let duration = end_s - start_s;
    if duration <= 0.0 {
        return Vec::new();
    }

    let cmd = argv([
        "ffmpeg".to_string(),
        "-ss".to_string(),
        format!("{}", start_s),
        "-t".to_string(),
        format!("{}", duration),
        "-i".to_string(),
        audio_file.to_string_lossy().into_owned(),
        "-af".to_string(),
        format!("silencedetect=noise={}dB:d={}", threshold_db, min_duration_s),
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ]);

    let Ok(output) = runner.run(&cmd) else {
        runner
            .logger()
            .warn("[silencedetect] filter run failed; no zones from ffmpeg");
        return Vec::new();
    };

    parse_silencedetect_output(&output, start_s, threshold_db)
}

/// Parse silence_start/silence_end pairs, offsetting by the seek position.
pub fn parse_silencedetect_output(output: &str, seek_offset_s: f64, threshold_db: f64) -> Vec<SilenceZone> {
    let mut zones = Vec::new();
    let mut pending_start: Option<f64> = None;

    for line in output.lines() {
        if let Some(value) = field_after(line, "silence_start:") {
            pending_start = value.parse::<f64>().ok().map(|v| v + seek_offset_s);
        } else if let Some(value) = field_after(line, "silence_end:") {
            if let (Some(start), Ok(end)) = (pending_start.take(), value.parse::<f64>()) {
                // The filter does not report average dB; estimate just below
                // the threshold.
                zones.push((start, end + seek_offset_s, threshold_db - 5.0));
            }
        }
    }
    zones
}

fn field_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let pos = line.find(key)?;
    let rest = line[pos + key.len()..].trim_start();
    Some(rest.split_whitespace().next().unwrap_or(""))
}

/// RMS-windowed silence zones over decoded PCM (50 ms windows).
pub fn find_silence_zones_rms(
    pcm: &[i32],
    sample_rate: u32,
    start_s: f64,
    end_s: f64,
    threshold_db: f64,
    min_duration_ms: f64,
) -> Vec<SilenceZone> {
    let start_sample = ((start_s * sample_rate as f64) as usize).min(pcm.len());
    let end_sample = ((end_s * sample_rate as f64) as usize).min(pcm.len());
    if end_sample <= start_sample {
        return Vec::new();
    }

    let window_size = ((0.05 * sample_rate as f64) as usize).max(1);
    let min_silence_s = min_duration_ms / 1000.0;

    let mut zones = Vec::new();
    let mut current_start: Option<f64> = None;
    let mut current_dbs: Vec<f64> = Vec::new();

    let mut pos = start_sample;
    while pos < end_sample {
        let window_end = (pos + window_size).min(end_sample);
        let db = rms_db(&pcm[pos..window_end]);
        let is_silence = db < threshold_db;

        if is_silence {
            if current_start.is_none() {
                current_start = Some(pos as f64 / sample_rate as f64);
                current_dbs.clear();
            }
            current_dbs.push(db);
        } else if let Some(zone_start) = current_start.take() {
            let zone_end = pos as f64 / sample_rate as f64;
            if zone_end - zone_start >= min_silence_s {
                let avg = current_dbs.iter().sum::<f64>() / current_dbs.len() as f64;
                zones.push((zone_start, zone_end, avg));
            }
        }
        pos = window_end;
    }

    if let Some(zone_start) = current_start {
        let zone_end = end_sample as f64 / sample_rate as f64;
        if zone_end - zone_start >= min_silence_s && !current_dbs.is_empty() {
            let avg = current_dbs.iter().sum::<f64>() / current_dbs.len() as f64;
            zones.push((zone_start, zone_end, avg));
        }
    }

    zones
}

fn rms_db(window: &[i32]) -> f64 {
    if window.is_empty() {
        return DB_FLOOR;
    }
    let rms = (window
        .iter()
        .map(|&s| (s as f64).powi(2))
        .sum::<f64>()
        / window.len() as f64)
        .sqrt();
    if rms > 1e-10 {
        20.0 * (rms / I32_FULL_SCALE).log10()
    } else {
        DB_FLOOR
    }
}

/// Speech regions from an energy + zero-crossing-rate detector.
///
/// Voiced audio sits in a characteristic ZCR band at speaking level; this is
/// the dependency-free stand-in for a full VAD and is only consulted when
/// speech avoidance is enabled.
pub fn detect_speech_regions(
    pcm: &[i32],
    sample_rate: u32,
    start_s: f64,
    end_s: f64,
    frame_duration_ms: u32,
) -> Vec<(f64, f64)> {
    let start_sample = ((start_s * sample_rate as f64) as usize).min(pcm.len());
    let end_sample = ((end_s * sample_rate as f64) as usize).min(pcm.len());
    let frame = ((frame_duration_ms as f64 / 1000.0 * sample_rate as f64) as usize).max(1);

    let mut regions = Vec::new();
    let mut speech_start: Option<f64> = None;

    let mut pos = start_sample;
    while pos + frame <= end_sample {
        let window = &pcm[pos..pos + frame];
        let db = rms_db(window);
        let zcr = zero_crossing_rate(window);
        let is_speech = db > -35.0 && (0.02..=0.35).contains(&zcr);
        let t = pos as f64 / sample_rate as f64;

        if is_speech && speech_start.is_none() {
            speech_start = Some(t);
        } else if !is_speech {
            if let Some(start) = speech_start.take() {
                regions.push((start, t));
            }
        }
        pos += frame;
    }
    if let Some(start) = speech_start {
        regions.push((start, end_s));
    }
    regions
}

fn zero_crossing_rate(window: &[i32]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let crossings = window
        .windows(2)
        .filter(|pair| (pair[0] >= 0) != (pair[1] >= 0))
        .count();
    crossings as f64 / (window.len() - 1) as f64
}

/// Transients: sudden RMS jumps between adjacent 10 ms windows.
pub fn detect_transients(
    pcm: &[i32],
    sample_rate: u32,
    start_s: f64,
    end_s: f64,
    threshold_db: f64,
) -> Vec<f64> {
    let start_sample = ((start_s * sample_rate as f64) as usize).min(pcm.len());
    let end_sample = ((end_s * sample_rate as f64) as usize).min(pcm.len());
    let window_size = ((0.01 * sample_rate as f64) as usize).max(1);

    let mut transients = Vec::new();
    let mut prev_db: Option<f64> = None;
    let mut pos = start_sample;
    while pos + window_size <= end_sample {
        let db = rms_db(&pcm[pos..pos + window_size]);
        if let Some(prev) = prev_db {
            if db - prev >= threshold_db {
                transients.push(pos as f64 / sample_rate as f64);
            }
        }
        prev_db = Some(db);
        pos += window_size;
    }
    transients
}

/// Snap a boundary to the best-scoring silence zone near it.
///
/// Returns the snapped position (target timeline) and an audit record; when
/// no zone is found the original boundary is kept and the audit flags the
/// missing silence guarantee.
pub fn snap_boundary_to_silence(
    target_pcm: &[i32],
    sample_rate: u32,
    boundary_s: f64,
    target_file: Option<&Path>,
    settings: &SteppingSettings,
    runner: &CommandRunner,
) -> (f64, Option<BoundaryAudit>) {
    if !settings.snap_to_silence {
        return (boundary_s, None);
    }
    let logger = runner.logger().clone();
    logger.message(&format!(
        "    - [Smart Boundary] Analyzing target audio near {:.3}s...",
        boundary_s
    ));

    let window = settings.silence_search_window_s;
    let search_start = (boundary_s - window).max(0.0);
    let search_end = boundary_s + window;

    let zones = collect_zones(
        target_pcm,
        sample_rate,
        search_start,
        search_end,
        target_file,
        settings,
        runner,
    );

    if zones.is_empty() {
        logger.message(&format!(
            "    - [Silence Snap] No silence zones found within ±{}s window; using raw boundary",
            window
        ));
        return (boundary_s, Some(BoundaryAudit::no_silence(boundary_s)));
    }

    let (speech_regions, transients) = if settings.silence_detection_method
        == SilenceDetectionMethod::SmartFusion
    {
        let speech = if settings.vad_enabled && settings.vad_avoid_speech {
            detect_speech_regions(
                target_pcm,
                sample_rate,
                search_start,
                search_end,
                settings.vad_frame_duration_ms,
            )
        } else {
            Vec::new()
        };
        let transients = if settings.transient_detection_enabled {
            detect_transients(
                target_pcm,
                sample_rate,
                search_start,
                search_end,
                settings.transient_threshold_db,
            )
        } else {
            Vec::new()
        };
        (speech, transients)
    } else {
        (Vec::new(), Vec::new())
    };

    let mut best: Option<BoundaryAudit> = None;
    for &(zone_start, zone_end, avg_db) in &zones {
        // Snap to the zone center: farthest from both cut edges.
        let snap_point = (zone_start + zone_end) / 2.0;
        let duration = zone_end - zone_start;

        let mut score = 0.0;
        score += ((settings.silence_threshold_db - avg_db) / 10.0).max(0.0)
            * settings.fusion_weight_silence;
        let distance = (snap_point - boundary_s).abs();
        score += ((window - distance) / window).max(0.0) * 5.0;
        score += duration.min(1.0) * settings.fusion_weight_duration;

        let overlaps_speech = speech_regions
            .iter()
            .any(|&(s, e)| snap_point >= s && snap_point <= e);
        if overlaps_speech {
            score -= settings.fusion_weight_no_speech * 2.0;
        } else {
            score += settings.fusion_weight_no_speech;
        }

        let avoid_window_s = settings.transient_avoid_window_ms / 1000.0;
        let near_transient = transients
            .iter()
            .any(|&t| (snap_point - t).abs() < avoid_window_s);
        if near_transient {
            score -= settings.fusion_weight_no_transient;
        } else {
            score += settings.fusion_weight_no_transient;
        }

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(BoundaryAudit {
                zone_start,
                zone_end,
                snap_point,
                avg_db,
                score,
                overlaps_speech,
                near_transient,
                duration,
                no_silence_found: false,
                target_time_s: snap_point,
                delay_change_ms: 0,
                video_snap_applied: false,
                video_snap_skipped: false,
            });
        }
    }

    let best = best.expect("zones is non-empty");
    logger.message(&format!(
        "    - [Smart Boundary] Found silence zone [{:.3}s - {:.3}s, {:.1}dB]",
        best.zone_start, best.zone_end, best.avg_db
    ));
    logger.message(&format!(
        "    - [Smart Boundary] Snapping: {:.3}s -> {:.3}s (offset: {:+.3}s, score {:.1})",
        boundary_s,
        best.snap_point,
        best.snap_point - boundary_s,
        best.score
    ));

    (best.snap_point, Some(best))
}

fn collect_zones(
    target_pcm: &[i32],
    sample_rate: u32,
    search_start: f64,
    search_end: f64,
    target_file: Option<&Path>,
    settings: &SteppingSettings,
    runner: &CommandRunner,
) -> Vec<SilenceZone> {
    let rms = || {
        find_silence_zones_rms(
            target_pcm,
            sample_rate,
            search_start,
            search_end,
            settings.silence_threshold_db,
            settings.silence_min_duration_ms,
        )
    };
    let ffmpeg = |path: &Path| {
        find_silence_zones_ffmpeg(
            path,
            search_start,
            search_end,
            settings.ffmpeg_silence_noise,
            settings.ffmpeg_silence_duration,
            runner,
        )
    };

    match settings.silence_detection_method {
        SilenceDetectionMethod::RmsBasic => rms(),
        SilenceDetectionMethod::FfmpegSilencedetect => {
            target_file.map(ffmpeg).unwrap_or_default()
        }
        SilenceDetectionMethod::SmartFusion => {
            let zones = target_file.map(ffmpeg).unwrap_or_default();
            if zones.is_empty() {
                rms()
            } else {
                zones
            }
        }
    }
}
