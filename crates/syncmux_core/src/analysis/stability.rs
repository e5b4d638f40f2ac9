//! Sync stability metrics.
//!
//! After delay selection, the spread of accepted-chunk delays is a cheap
//! signal for marginal correlations: a high std-dev with a confident winner
//! usually means the source has timing structure the single delay cannot
//! express.

use super::types::{mean_and_std, ChunkResult, StabilityMetrics};
use crate::config::AnalysisSettings;
use crate::logging::JobLogger;

/// Compute stability metrics over accepted chunks and warn when the spread
/// exceeds the configured variance threshold.
pub fn evaluate_stability(
    chunks: &[ChunkResult],
    settings: &AnalysisSettings,
    source_key: &str,
    logger: &JobLogger,
) -> Option<StabilityMetrics> {
    let accepted: Vec<&ChunkResult> = chunks.iter().filter(|c| c.accepted).collect();
    if accepted.len() < settings.sync_stability_min_chunks as usize {
        return None;
    }

    let delays: Vec<f64> = accepted.iter().map(|c| c.raw_delay_ms).collect();
    let (_, std_dev) = mean_and_std(&delays);

    let rounded: Vec<i64> = accepted.iter().map(|c| c.delay_ms).collect();
    let spread = rounded.iter().max().unwrap() - rounded.iter().min().unwrap();

    let threshold = settings.sync_stability_variance_threshold;
    let unstable = threshold > 0.0 && std_dev > threshold;

    if unstable {
        logger.warn(&format!(
            "[Stability] {} delay spread is high: std-dev {:.1}ms over {} chunks (threshold {:.1}ms, spread {}ms)",
            source_key,
            std_dev,
            accepted.len(),
            threshold,
            spread
        ));
    }

    Some(StabilityMetrics {
        accepted_chunks: accepted.len(),
        delay_std_dev_ms: std_dev,
        delay_spread_ms: spread,
        unstable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{JobLogger, LogConfig};

    fn logger() -> JobLogger {
        JobLogger::sink_only("stab", LogConfig::default(), None)
    }

    fn chunks(delays: &[f64]) -> Vec<ChunkResult> {
        delays
            .iter()
            .enumerate()
            .map(|(i, &d)| ChunkResult::new(d, 95.0, i as f64 * 10.0, 5.0))
            .collect()
    }

    #[test]
    fn stable_series_is_not_flagged() {
        let metrics = evaluate_stability(
            &chunks(&[100.0, 100.2, 99.8, 100.1]),
            &AnalysisSettings::default(),
            "Source 2",
            &logger(),
        )
        .unwrap();
        assert!(!metrics.unstable);
        assert!(metrics.delay_std_dev_ms < 1.0);
    }

    #[test]
    fn wide_spread_is_flagged() {
        let metrics = evaluate_stability(
            &chunks(&[100.0, 130.0, 70.0, 160.0]),
            &AnalysisSettings::default(),
            "Source 2",
            &logger(),
        )
        .unwrap();
        assert!(metrics.unstable);
        assert_eq!(metrics.delay_spread_ms, 90);
    }

    #[test]
    fn too_few_chunks_yields_none() {
        let metrics = evaluate_stability(
            &chunks(&[100.0]),
            &AnalysisSettings::default(),
            "Source 2",
            &logger(),
        );
        assert!(metrics.is_none());
    }
}
