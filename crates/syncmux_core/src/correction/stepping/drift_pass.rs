//! Per-segment internal drift analysis.
//!
//! Stepping and drift rarely coexist, but when a long segment drifts
//! internally the EDL records a per-segment rate so assembly can
//! time-stretch just that span.

use super::scan::delay_for_chunk;
use crate::analysis::{linear_regression, median};
use crate::config::SegmentSettings;
use crate::correction::edl::AudioSegment;
use crate::logging::JobLogger;

const SCAN_CHUNK_S: f64 = 5.0;
/// Segments shorter than this keep their coarse delay estimate.
const MIN_SEGMENT_FOR_DRIFT_S: f64 = 20.0;
const MAX_EDGE_BUFFER_S: f64 = 30.0;

/// Sample delays inside every long-enough segment, fit a slope, and record
/// it on segments where the fit is trustworthy.
pub fn analyze_internal_drift(
    mut edl: Vec<AudioSegment>,
    ref_pcm: &[i32],
    target_pcm: &[i32],
    sample_rate: u32,
    codec_name: &str,
    settings: &SegmentSettings,
    logger: &JobLogger,
) -> Vec<AudioSegment> {
    logger.message(&format!(
        "  [SteppingCorrector] Stage 2.5: Analyzing segments for internal drift (Codec: {})...",
        codec_name
    ));

    let pcm_duration_s = target_pcm.len() as f64 / sample_rate as f64;
    let chunk_samples = (SCAN_CHUNK_S * sample_rate as f64) as usize;
    let locality_samples = (settings.search_locality_s * sample_rate as f64) as usize;
    let segment_count = edl.len();

    for i in 0..segment_count {
        let segment_start_s = edl[i].start_s;
        let segment_end_s = edl
            .get(i + 1)
            .map(|next| next.start_s)
            .unwrap_or(pcm_duration_s);
        let duration_s = segment_end_s - segment_start_s;

        if duration_s < 1.0 {
            logger.message(&format!(
                "    - Skipping segment {:.2}s-{:.2}s: too short ({:.2}s)",
                segment_start_s, segment_end_s, duration_s
            ));
            continue;
        }
        if duration_s < MIN_SEGMENT_FOR_DRIFT_S {
            continue;
        }

        logger.message(&format!(
            "    - Scanning segment from {:.2}s to {:.2}s (target timeline)...",
            segment_start_s, segment_end_s
        ));

        // ~1 scan per 20 s, min 5, away from the edges where the stepping
        // transitions live.
        let num_scans = ((duration_s / 20.0) as usize).max(5);
        let edge = (duration_s * settings.drift_scan_buffer_pct / 100.0).min(MAX_EDGE_BUFFER_S);
        let window_start = segment_start_s + edge;
        let window_end = segment_end_s - edge - SCAN_CHUNK_S;
        if window_end <= window_start {
            continue;
        }

        let base_delay_s = edl[i].delay_ms as f64 / 1000.0;
        let mut times = Vec::new();
        let mut delays = Vec::new();
        for k in 0..num_scans {
            let t_target =
                window_start + (window_end - window_start) * k as f64 / (num_scans - 1).max(1) as f64;
            let t_ref = t_target - base_delay_s;
            if t_ref < 0.0 {
                continue;
            }
            let start_sample = (t_ref * sample_rate as f64) as usize;
            if let Some((delay_ms, _)) = delay_for_chunk(
                ref_pcm,
                target_pcm,
                start_sample,
                chunk_samples,
                sample_rate,
                locality_samples,
                settings.min_confidence_ratio,
            ) {
                times.push(t_ref);
                delays.push(delay_ms as f64);
            }
        }

        if times.len() < 4 {
            continue;
        }

        // Outlier rejection around the median.
        let med = median(&delays);
        let std_dev = {
            let mean = delays.iter().sum::<f64>() / delays.len() as f64;
            (delays.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / delays.len() as f64).sqrt()
        };
        let (filtered_times, filtered_delays): (Vec<f64>, Vec<f64>) = if std_dev > 0.0 {
            times
                .iter()
                .zip(delays.iter())
                .filter(|(_, &d)| (d - med).abs() < settings.drift_outlier_sensitivity * std_dev)
                .map(|(&t, &d)| (t, d))
                .unzip()
        } else {
            (times, delays)
        };

        if filtered_times.len() < 4 {
            logger.message("      [STABLE] Not enough consistent points after outlier rejection.");
            continue;
        }

        let (slope, _, r_squared) = linear_regression(&filtered_times, &filtered_delays);
        if r_squared > settings.drift_r2_threshold && slope.abs() > settings.drift_slope_threshold {
            logger.message(&format!(
                "      [DRIFT DETECTED] Found internal drift of {:+.2} ms/s in segment (R²={:.2}).",
                slope, r_squared
            ));
            edl[i].drift_rate_ms_s = slope;
        } else {
            logger.message(&format!(
                "      [STABLE] Segment is internally stable (slope={:+.2} ms/s, R²={:.2}).",
                slope, r_squared
            ));
        }
    }

    edl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{JobLogger, LogConfig};

    #[test]
    fn short_segments_are_left_untouched() {
        let logger = JobLogger::sink_only("dp", LogConfig::default(), None);
        let edl = vec![
            AudioSegment::new(0.0, 0, 0.0),
            AudioSegment::new(10.0, 100, 100.0),
        ];
        let sr = 8000u32;
        let pcm = vec![0i32; sr as usize * 15];
        let out = analyze_internal_drift(
            edl.clone(),
            &pcm,
            &pcm,
            sr,
            "flac",
            &SegmentSettings::default(),
            &logger,
        );
        assert_eq!(out, edl);
    }
}
