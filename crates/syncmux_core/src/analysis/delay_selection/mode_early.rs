//! Early-cluster mode selection.

use super::{cluster_raw_average, DelaySelection, DelaySelector, ModeClusteredSelector, SelectorConfig};
use crate::analysis::types::ChunkResult;

/// Prioritizes clusters that are already stable in the early portion of the
/// file, where sync tends to be most reliable and mid-file edits have not
/// yet interfered. Falls back to Mode (Clustered).
pub struct ModeEarlySelector;

impl DelaySelector for ModeEarlySelector {
    fn name(&self) -> &'static str {
        "Mode (Early Cluster)"
    }

    fn select(&self, chunks: &[ChunkResult], config: &SelectorConfig) -> Option<DelaySelection> {
        if chunks.len() < config.min_accepted_chunks {
            return None;
        }

        let window = config.early_cluster_window.min(chunks.len());
        let tolerance = config.cluster_tolerance_ms;

        // Candidate cluster centers are the distinct rounded delays.
        let mut centers: Vec<i64> = chunks.iter().map(|c| c.delay_ms).collect();
        centers.sort_unstable();
        centers.dedup();

        // An early-stable cluster has at least `early_cluster_threshold`
        // members among the first `window` chunks.
        let mut early_stable: Vec<(i64, usize, usize)> = Vec::new(); // (center, early_count, first_idx)
        for &center in &centers {
            let mut early_count = 0;
            let mut first_idx = None;
            for (idx, chunk) in chunks.iter().enumerate() {
                if (chunk.delay_ms - center).abs() <= tolerance {
                    if idx < window {
                        early_count += 1;
                    }
                    if first_idx.is_none() {
                        first_idx = Some(idx);
                    }
                }
            }
            if early_count >= config.early_cluster_threshold {
                early_stable.push((center, early_count, first_idx.unwrap_or(usize::MAX)));
            }
        }

        if let Some(&(center, _, _)) = early_stable
            .iter()
            .min_by_key(|&&(_, _, first_idx)| first_idx)
        {
            let (raw_avg, used) = cluster_raw_average(chunks, center, tolerance)?;
            return Some(DelaySelection {
                delay_ms: raw_avg.round() as i64,
                raw_delay_ms: raw_avg,
                method: self.name().to_string(),
                chunks_used: used,
            });
        }

        // No early-stable cluster; clustered mode decides instead.
        ModeClusteredSelector.select(chunks, config).map(|mut sel| {
            sel.method = format!("{} (fallback)", self.name());
            sel
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::delay_selection::make_chunks;

    #[test]
    fn prefers_cluster_stable_in_early_window() {
        // First five chunks at -1000, the rest at -2000. The later cluster is
        // bigger, but the early one wins.
        let mut points = Vec::new();
        for i in 0..5 {
            points.push((-1000.0, i as f64 * 10.0));
        }
        for i in 5..13 {
            points.push((-2000.0, i as f64 * 10.0));
        }
        let chunks = make_chunks(&points);
        let config = SelectorConfig {
            early_cluster_window: 10,
            early_cluster_threshold: 5,
            ..Default::default()
        };
        let result = ModeEarlySelector.select(&chunks, &config).unwrap();
        assert_eq!(result.delay_ms, -1000);
    }

    #[test]
    fn earliest_qualifying_cluster_wins_over_later_one() {
        // Two clusters both qualify in the early window; the one appearing
        // first is chosen.
        let chunks = make_chunks(&[
            (-100.0, 0.0),
            (-200.0, 1.0),
            (-100.0, 2.0),
            (-200.0, 3.0),
            (-100.0, 4.0),
            (-200.0, 5.0),
        ]);
        let config = SelectorConfig {
            min_accepted_chunks: 3,
            early_cluster_window: 6,
            early_cluster_threshold: 3,
            ..Default::default()
        };
        let result = ModeEarlySelector.select(&chunks, &config).unwrap();
        assert_eq!(result.delay_ms, -100);
    }

    #[test]
    fn falls_back_to_clustered_mode() {
        let chunks = make_chunks(&[
            (-100.0, 0.0),
            (-200.0, 1.0),
            (-300.0, 2.0),
            (-1000.0, 3.0),
            (-1000.0, 4.0),
            (-1000.0, 5.0),
        ]);
        let config = SelectorConfig {
            early_cluster_window: 3,
            early_cluster_threshold: 3,
            ..Default::default()
        };
        let result = ModeEarlySelector.select(&chunks, &config).unwrap();
        assert_eq!(result.delay_ms, -1000);
        assert!(result.method.contains("fallback"));
    }
}
