//! Coarse delay scanning for stepping correction.
//!
//! Works over mono int32 PCM. The scan slides a window across the reference
//! and finds where each window's content sits inside a locality-bounded
//! search region of the target; the offset between the two positions is the
//! local delay (positive = target early, same convention as analysis).

use crate::analysis::methods::support::xcorr_full;
use crate::analysis::median;
use crate::config::{SegmentSettings, SteppingSettings};
use crate::logging::JobLogger;

// For int32 PCM, a standard deviation under this is silence; correlating it
// only finds noise.
const SILENCE_STD_I32: f64 = 100.0;

/// One coarse scan observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoarsePoint {
    /// Reference-timeline timestamp of the scan window (s).
    pub time_s: f64,
    pub delay_ms: i64,
    pub delay_raw: f64,
}

/// Best placement of `needle` inside `haystack` by normalized
/// cross-correlation, with a peak/median confidence ratio.
///
/// Returns `(offset, ratio)` where `haystack[offset..offset+needle.len()]`
/// best matches the needle.
pub fn find_offset_in_window(needle: &[f64], haystack: &[f64]) -> Option<(usize, f64)> {
    if needle.len() < 100 || haystack.len() < needle.len() {
        return None;
    }

    let (c, _zero_lag) = xcorr_full(needle, haystack);
    // Placements p map to linear index (len(haystack) - 1 - p).
    let max_placement = haystack.len() - needle.len();
    let mut valid: Vec<f64> = Vec::with_capacity(max_placement + 1);
    for p in 0..=max_placement {
        valid.push(c[haystack.len() - 1 - p]);
    }

    let mut best_p = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (p, &v) in valid.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_p = p;
        }
    }

    let noise_floor = median(&valid) + 1e-9;
    Some((best_p, best_val / noise_floor))
}

/// Measure the delay of the target against one reference window.
///
/// Returns `(delay_ms, delay_raw)` or `None` when either side is silent,
/// the window overruns a buffer, or the match confidence ratio is below the
/// configured minimum.
pub fn delay_for_chunk(
    ref_pcm: &[i32],
    target_pcm: &[i32],
    start_sample: usize,
    num_samples: usize,
    sample_rate: u32,
    locality_samples: usize,
    min_confidence_ratio: f64,
) -> Option<(i64, f64)> {
    let end_sample = start_sample + num_samples;
    if end_sample > ref_pcm.len() {
        return None;
    }
    let ref_chunk = &ref_pcm[start_sample..end_sample];

    let search_start = start_sample.saturating_sub(locality_samples);
    let search_end = (start_sample + num_samples + locality_samples).min(target_pcm.len());
    if search_end <= search_start {
        return None;
    }
    let window = &target_pcm[search_start..search_end];

    if ref_chunk.len() < 100 || window.len() < ref_chunk.len() {
        return None;
    }

    let (ref_norm, ref_std) = normalize_i32(ref_chunk);
    let (win_norm, win_std) = normalize_i32(window);
    if ref_std < SILENCE_STD_I32 || win_std < SILENCE_STD_I32 {
        return None;
    }

    let (offset, ratio) = find_offset_in_window(&ref_norm, &win_norm)?;
    if ratio < min_confidence_ratio {
        return None;
    }

    let target_pos = search_start + offset;
    let delay_samples = start_sample as i64 - target_pos as i64;
    let delay_raw = delay_samples as f64 / sample_rate as f64 * 1000.0;
    Some((delay_raw.round() as i64, delay_raw))
}

pub(crate) fn normalize_i32(samples: &[i32]) -> (Vec<f64>, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let std = (samples
        .iter()
        .map(|&s| (s as f64 - mean).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();
    let normalized = samples
        .iter()
        .map(|&s| (s as f64 - mean) / (std + 1e-9))
        .collect();
    (normalized, std)
}

/// Slide the coarse window across the scannable range and collect delay
/// observations.
pub fn perform_coarse_scan(
    ref_pcm: &[i32],
    target_pcm: &[i32],
    sample_rate: u32,
    segment: &SegmentSettings,
    stepping: &SteppingSettings,
    logger: &JobLogger,
) -> Vec<CoarsePoint> {
    logger.message("  [SteppingCorrector] Stage 1: Performing coarse scan to find delay zones...");

    let chunk_samples = (segment.coarse_chunk_s * sample_rate as f64) as usize;
    let step_samples = (segment.coarse_step_s * sample_rate as f64) as usize;
    let locality_samples = (segment.search_locality_s * sample_rate as f64) as usize;

    let usable = ref_pcm.len().min(target_pcm.len());
    let duration_s = ref_pcm.len() as f64 / sample_rate as f64;
    let scan_start_s = duration_s * (stepping.scan_start_percentage / 100.0);
    let scan_end_s = duration_s * (stepping.scan_end_percentage / 100.0);
    let start_offset = (scan_start_s * sample_rate as f64) as usize;
    let scan_end_limit = ((scan_end_s * sample_rate as f64) as usize).min(usable);
    let scan_end_point = scan_end_limit.saturating_sub(chunk_samples + step_samples);

    let mut coarse_map = Vec::new();
    if step_samples == 0 {
        return coarse_map;
    }
    let mut start_sample = start_offset;
    while start_sample < scan_end_point {
        if let Some((delay_ms, delay_raw)) = delay_for_chunk(
            ref_pcm,
            target_pcm,
            start_sample,
            chunk_samples,
            sample_rate,
            locality_samples,
            segment.min_confidence_ratio,
        ) {
            let time_s = start_sample as f64 / sample_rate as f64;
            logger.message(&format!(
                "    - Coarse point at {:.1}s: delay = {}ms (raw: {:.3}ms)",
                time_s, delay_ms, delay_raw
            ));
            coarse_map.push(CoarsePoint {
                time_s,
                delay_ms,
                delay_raw,
            });
        }
        start_sample += step_samples;
    }
    coarse_map
}

/// Drop coarse points that fall inside invalid cluster time ranges
/// (filtered stepping mode).
pub fn filter_coarse_map(
    coarse_map: Vec<CoarsePoint>,
    invalid_ranges: &[(f64, f64)],
    logger: &JobLogger,
) -> Vec<CoarsePoint> {
    if invalid_ranges.is_empty() {
        return coarse_map;
    }
    let before = coarse_map.len();
    let filtered: Vec<CoarsePoint> = coarse_map
        .into_iter()
        .filter(|point| {
            !invalid_ranges
                .iter()
                .any(|&(start, end)| point.time_s >= start && point.time_s <= end)
        })
        .collect();
    logger.message(&format!(
        "  [Filtered Stepping] Filtered {} coarse scan points from invalid clusters, retained {}",
        before - filtered.len(),
        filtered.len()
    ));
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_i32(len: usize, amp: f64) -> Vec<i32> {
        (0..len)
            .map(|i| {
                let v = ((i as f64 * 0.07).sin() + ((i * i % 977) as f64 / 977.0 - 0.5)) * amp;
                v as i32
            })
            .collect()
    }

    #[test]
    fn finds_needle_position() {
        let haystack: Vec<f64> = (0..4000)
            .map(|i| ((i * i % 499) as f64 / 499.0 - 0.5) + (i as f64 * 0.03).sin())
            .collect();
        let needle = haystack[1200..2200].to_vec();
        let (offset, ratio) = find_offset_in_window(&needle, &haystack).unwrap();
        assert_eq!(offset, 1200);
        assert!(ratio > 2.0, "ratio {}", ratio);
    }

    #[test]
    fn delay_for_chunk_measures_target_shift() {
        let sr = 8000u32;
        let base = tone_i32(sr as usize * 10, 1e7);
        // Target content 800 samples (100 ms) earlier than reference.
        let shift = 800usize;
        let mut reference = vec![0i32; shift];
        reference.extend_from_slice(&base[..base.len() - shift]);

        let result = delay_for_chunk(&reference, &base, 16000, 8000, sr, 4000, 2.0);
        let (delay_ms, delay_raw) = result.expect("delay should be measurable");
        assert_eq!(delay_ms, 100);
        assert!((delay_raw - 100.0).abs() < 1.0);
    }

    #[test]
    fn silence_yields_none() {
        let sr = 8000u32;
        let silent = vec![0i32; sr as usize * 5];
        let result = delay_for_chunk(&silent, &silent, 8000, 8000, sr, 4000, 2.0);
        assert!(result.is_none());
    }

    #[test]
    fn overrun_yields_none() {
        let sr = 8000u32;
        let pcm = tone_i32(sr as usize, 1e7);
        assert!(delay_for_chunk(&pcm, &pcm, 7000, 8000, sr, 100, 2.0).is_none());
    }

    #[test]
    fn filter_coarse_map_drops_invalid_ranges() {
        let logger = JobLogger::sink_only("scan", crate::logging::LogConfig::default(), None);
        let map = vec![
            CoarsePoint { time_s: 10.0, delay_ms: 0, delay_raw: 0.0 },
            CoarsePoint { time_s: 50.0, delay_ms: 120, delay_raw: 120.0 },
            CoarsePoint { time_s: 90.0, delay_ms: 0, delay_raw: 0.0 },
        ];
        let filtered = filter_coarse_map(map, &[(40.0, 60.0)], &logger);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|p| p.time_s != 50.0));
    }
}
