//! Peak confidence normalization for correlation results.
//!
//! Shared by the peak-based kernels to convert raw correlation peaks into a
//! comparable 0-100 confidence score.

/// Normalize peak confidence against the noise floor and second-best peak.
///
/// Combines three ratios with empirically tuned scales:
/// 1. peak / median of |c| (prominence over the noise floor), x5
/// 2. peak / second-best peak outside a 1% neighborhood (uniqueness), x8
/// 3. peak / std-dev of the lower-90% background (SNR), x1.5
///
/// The sum is divided by 3 and clamped to [0, 100].
pub fn normalize_peak_confidence(correlation: &[f64], peak_idx: usize) -> f64 {
    if correlation.is_empty() || peak_idx >= correlation.len() {
        return 0.0;
    }

    let abs_corr: Vec<f64> = correlation.iter().map(|v| v.abs()).collect();
    let peak_value = abs_corr[peak_idx];

    let noise_floor = median(&abs_corr);
    let prominence_ratio = peak_value / (noise_floor + 1e-9);

    // Exclude the peak's 1% neighborhood so sidelobes do not count as the
    // second-best match.
    let neighbor_range = (abs_corr.len() / 100).max(1);
    let mask_start = peak_idx.saturating_sub(neighbor_range);
    let mask_end = (peak_idx + neighbor_range + 1).min(abs_corr.len());
    let second_best = abs_corr
        .iter()
        .enumerate()
        .filter(|(i, _)| *i < mask_start || *i >= mask_end)
        .map(|(_, &v)| v)
        .fold(f64::NEG_INFINITY, f64::max);
    let second_best = if second_best.is_finite() {
        second_best
    } else {
        noise_floor
    };
    let uniqueness_ratio = peak_value / (second_best + 1e-9);

    let threshold_90 = percentile(&abs_corr, 90.0);
    let background: Vec<f64> = abs_corr.iter().copied().filter(|&v| v < threshold_90).collect();
    let bg_stddev = if background.len() > 10 {
        std_dev(&background)
    } else {
        1e-9
    };
    let snr_ratio = peak_value / (bg_stddev + 1e-9);

    let confidence = (prominence_ratio * 5.0 + uniqueness_ratio * 8.0 + snr_ratio * 1.5) / 3.0;
    confidence.clamp(0.0, 100.0)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.is_empty() {
        0.0
    } else if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharp_peak_scores_high() {
        let mut corr = vec![0.01; 1000];
        corr[500] = 1.0;
        let confidence = normalize_peak_confidence(&corr, 500);
        assert!(confidence > 50.0, "got {}", confidence);
    }

    #[test]
    fn flat_array_scores_low() {
        let corr = vec![0.5; 1000];
        let confidence = normalize_peak_confidence(&corr, 500);
        assert!(confidence < 20.0, "got {}", confidence);
    }

    #[test]
    fn two_equal_peaks_score_lower_than_one() {
        let mut one_peak = vec![0.01; 1000];
        one_peak[200] = 1.0;
        let mut two_peaks = one_peak.clone();
        two_peaks[800] = 1.0;
        let single = normalize_peak_confidence(&one_peak, 200);
        let double = normalize_peak_confidence(&two_peaks, 200);
        assert!(double < single);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(normalize_peak_confidence(&[], 0), 0.0);
    }

    #[test]
    fn result_is_clamped() {
        let mut corr = vec![1e-12; 2000];
        corr[1000] = 1e6;
        let confidence = normalize_peak_confidence(&corr, 1000);
        assert!(confidence <= 100.0);
    }
}
