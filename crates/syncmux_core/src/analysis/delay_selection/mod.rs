//! Delay selection strategies.
//!
//! Reduce accepted per-chunk measurements to one `(rounded, raw)` winner.
//! Every strategy carries raw values through its reduction and rounds the
//! winner exactly once; a chunk's own rounded delay is never returned as the
//! representative value.

mod average;
mod first_stable;
mod mode;
mod mode_clustered;
mod mode_early;

pub use average::AverageSelector;
pub use first_stable::FirstStableSelector;
pub use mode::ModeSelector;
pub use mode_clustered::ModeClusteredSelector;
pub use mode_early::ModeEarlySelector;

use super::types::{ChunkResult, DelaySelection};
use crate::config::AnalysisSettings;
use crate::models::DelaySelectionMode;

/// Tuning knobs for the selectors.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub min_accepted_chunks: usize,
    /// [First Stable] Consecutive chunks required for stability.
    pub first_stable_min_chunks: usize,
    /// [First Stable] Skip segments below the minimum instead of using them.
    pub first_stable_skip_unstable: bool,
    /// [Early Cluster] Number of leading chunks forming the early window.
    pub early_cluster_window: usize,
    /// [Early Cluster] Chunks required inside the early window.
    pub early_cluster_threshold: usize,
    /// Rounded delays within this distance belong to the same cluster.
    pub cluster_tolerance_ms: i64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_accepted_chunks: 3,
            first_stable_min_chunks: 3,
            first_stable_skip_unstable: false,
            early_cluster_window: 10,
            early_cluster_threshold: 5,
            cluster_tolerance_ms: 1,
        }
    }
}

impl From<&AnalysisSettings> for SelectorConfig {
    fn from(settings: &AnalysisSettings) -> Self {
        Self {
            min_accepted_chunks: settings.min_accepted_chunks as usize,
            first_stable_min_chunks: settings.first_stable_min_chunks as usize,
            first_stable_skip_unstable: settings.first_stable_skip_unstable,
            early_cluster_window: settings.early_cluster_window as usize,
            early_cluster_threshold: settings.early_cluster_threshold as usize,
            cluster_tolerance_ms: 1,
        }
    }
}

/// A reduction strategy over accepted chunks.
pub trait DelaySelector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reduce accepted chunks to a winner, or `None` when the strategy
    /// cannot decide (the caller falls back to `Mode`).
    fn select(&self, chunks: &[ChunkResult], config: &SelectorConfig) -> Option<DelaySelection>;
}

/// Create the selector for the configured mode.
pub fn get_selector(mode: DelaySelectionMode) -> Box<dyn DelaySelector> {
    match mode {
        DelaySelectionMode::Mode => Box::new(ModeSelector),
        DelaySelectionMode::ModeClustered => Box::new(ModeClusteredSelector),
        DelaySelectionMode::ModeEarly => Box::new(ModeEarlySelector),
        DelaySelectionMode::FirstStable => Box::new(FirstStableSelector),
        DelaySelectionMode::Average => Box::new(AverageSelector),
    }
}

/// Most common rounded delay across chunks.
pub(crate) fn mode_of(chunks: &[ChunkResult]) -> Option<i64> {
    let mut counts = std::collections::HashMap::new();
    for c in chunks {
        *counts.entry(c.delay_ms).or_insert(0usize) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(delay, count)| (count, std::cmp::Reverse(delay)))
        .map(|(delay, _)| delay)
}

/// Average of raw delays over chunks whose rounded delay sits within
/// `tolerance` of `center`. Returns `(raw_avg, member_count)`.
pub(crate) fn cluster_raw_average(
    chunks: &[ChunkResult],
    center: i64,
    tolerance: i64,
) -> Option<(f64, usize)> {
    let members: Vec<f64> = chunks
        .iter()
        .filter(|c| (c.delay_ms - center).abs() <= tolerance)
        .map(|c| c.raw_delay_ms)
        .collect();
    if members.is_empty() {
        return None;
    }
    let avg = members.iter().sum::<f64>() / members.len() as f64;
    Some((avg, members.len()))
}

#[cfg(test)]
pub(crate) fn make_chunks(delays: &[(f64, f64)]) -> Vec<ChunkResult> {
    delays
        .iter()
        .map(|&(raw, start)| ChunkResult::new(raw, 95.0, start, 5.0))
        .collect()
}
