//! Simple mode (most common) selection.

use super::{mode_of, DelaySelection, DelaySelector, SelectorConfig};
use crate::analysis::types::ChunkResult;

/// Winner is the most common rounded delay; its raw value is the mean over
/// the chunks that voted for it.
pub struct ModeSelector;

impl DelaySelector for ModeSelector {
    fn name(&self) -> &'static str {
        "Mode (Most Common)"
    }

    fn select(&self, chunks: &[ChunkResult], config: &SelectorConfig) -> Option<DelaySelection> {
        if chunks.len() < config.min_accepted_chunks {
            return None;
        }
        let winner = mode_of(chunks)?;

        let matching: Vec<f64> = chunks
            .iter()
            .filter(|c| c.delay_ms == winner)
            .map(|c| c.raw_delay_ms)
            .collect();
        let raw = matching.iter().sum::<f64>() / matching.len() as f64;

        Some(DelaySelection {
            delay_ms: winner,
            raw_delay_ms: raw,
            method: self.name().to_string(),
            chunks_used: matching.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::delay_selection::make_chunks;

    #[test]
    fn picks_most_common_rounded_value() {
        let chunks = make_chunks(&[
            (-1000.5, 10.0),
            (-1000.7, 20.0),
            (-1000.6, 30.0),
            (-500.0, 40.0),
        ]);
        let result = ModeSelector.select(&chunks, &SelectorConfig::default()).unwrap();
        assert_eq!(result.delay_ms, -1001);
        assert_eq!(result.chunks_used, 3);
        assert!((result.raw_delay_ms - (-1000.6)).abs() < 1e-9);
    }

    #[test]
    fn too_few_chunks_returns_none() {
        let chunks = make_chunks(&[(10.0, 0.0)]);
        assert!(ModeSelector.select(&chunks, &SelectorConfig::default()).is_none());
    }
}
