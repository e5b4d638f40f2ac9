//! Average selection.

use super::{DelaySelection, DelaySelector, SelectorConfig};
use crate::analysis::types::ChunkResult;

/// Mean of all raw delays, rounded once at the end.
pub struct AverageSelector;

impl DelaySelector for AverageSelector {
    fn name(&self) -> &'static str {
        "Average"
    }

    fn select(&self, chunks: &[ChunkResult], config: &SelectorConfig) -> Option<DelaySelection> {
        if chunks.is_empty() || chunks.len() < config.min_accepted_chunks {
            return None;
        }
        let raw_avg =
            chunks.iter().map(|c| c.raw_delay_ms).sum::<f64>() / chunks.len() as f64;

        Some(DelaySelection {
            delay_ms: raw_avg.round() as i64,
            raw_delay_ms: raw_avg,
            method: self.name().to_string(),
            chunks_used: chunks.len(),
        })
    }
}
