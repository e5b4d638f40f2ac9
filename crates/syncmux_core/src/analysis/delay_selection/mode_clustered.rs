//! Clustered mode selection.

use super::{cluster_raw_average, mode_of, DelaySelection, DelaySelector, SelectorConfig};
use crate::analysis::types::ChunkResult;

/// Most common rounded delay, widened by the cluster tolerance to absorb
/// vote-splitting between adjacent millisecond bins; the winner is the
/// rounded mean of the cluster's raw values.
pub struct ModeClusteredSelector;

impl DelaySelector for ModeClusteredSelector {
    fn name(&self) -> &'static str {
        "Mode (Clustered)"
    }

    fn select(&self, chunks: &[ChunkResult], config: &SelectorConfig) -> Option<DelaySelection> {
        if chunks.len() < config.min_accepted_chunks {
            return None;
        }
        let mode = mode_of(chunks)?;
        let (raw_avg, used) = cluster_raw_average(chunks, mode, config.cluster_tolerance_ms)?;

        Some(DelaySelection {
            delay_ms: raw_avg.round() as i64,
            raw_delay_ms: raw_avg,
            method: self.name().to_string(),
            chunks_used: used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::delay_selection::make_chunks;

    #[test]
    fn absorbs_vote_splitting_across_bins() {
        // Raw values straddle the 100/101 boundary; plain mode would split.
        let chunks = make_chunks(&[
            (100.4, 0.0),
            (100.6, 1.0),
            (100.5, 2.0),
            (99.8, 3.0),
            (300.0, 4.0),
        ]);
        let result = ModeClusteredSelector
            .select(&chunks, &SelectorConfig::default())
            .unwrap();
        assert_eq!(result.chunks_used, 4);
        // Winner comes from rounding the cluster's raw mean, once.
        let expected_raw = (100.4 + 100.6 + 100.5 + 99.8) / 4.0;
        assert!((result.raw_delay_ms - expected_raw).abs() < 1e-9);
        assert_eq!(result.delay_ms, expected_raw.round() as i64);
    }
}
