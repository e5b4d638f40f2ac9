//! First stable segment selection.

use super::{DelaySelection, DelaySelector, SelectorConfig};
use crate::analysis::types::ChunkResult;

/// Groups chunks in sequence into segments whose consecutive rounded delays
/// differ by at most 1 ms, then returns the first segment that satisfies the
/// stability criteria. The winner is the rounded mean of the segment's raw
/// delays, never the first chunk's own rounded value.
pub struct FirstStableSelector;

struct Segment {
    anchor_delay: i64,
    raw_delays: Vec<f64>,
    start_s: f64,
}

impl Segment {
    fn raw_average(&self) -> f64 {
        self.raw_delays.iter().sum::<f64>() / self.raw_delays.len() as f64
    }
}

impl DelaySelector for FirstStableSelector {
    fn name(&self) -> &'static str {
        "First Stable"
    }

    fn select(&self, chunks: &[ChunkResult], config: &SelectorConfig) -> Option<DelaySelection> {
        if chunks.len() < config.first_stable_min_chunks {
            return None;
        }

        let mut segments: Vec<Segment> = Vec::new();
        let mut current = Segment {
            anchor_delay: chunks[0].delay_ms,
            raw_delays: vec![chunks[0].raw_delay_ms],
            start_s: chunks[0].start_s,
        };

        for chunk in &chunks[1..] {
            if (chunk.delay_ms - current.anchor_delay).abs() <= 1 {
                current.raw_delays.push(chunk.raw_delay_ms);
            } else {
                segments.push(current);
                current = Segment {
                    anchor_delay: chunk.delay_ms,
                    raw_delays: vec![chunk.raw_delay_ms],
                    start_s: chunk.start_s,
                };
            }
        }
        segments.push(current);

        let chosen = if config.first_stable_skip_unstable {
            segments
                .iter()
                .find(|s| s.raw_delays.len() >= config.first_stable_min_chunks)?
        } else {
            segments.first()?
        };

        let raw_avg = chosen.raw_average();
        tracing::debug!(
            "first stable segment: {} chunks starting at {:.1}s, raw avg {:.3}ms",
            chosen.raw_delays.len(),
            chosen.start_s,
            raw_avg
        );

        Some(DelaySelection {
            delay_ms: raw_avg.round() as i64,
            raw_delay_ms: raw_avg,
            method: self.name().to_string(),
            chunks_used: chosen.raw_delays.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::delay_selection::make_chunks;

    fn config(min_chunks: usize, skip_unstable: bool) -> SelectorConfig {
        SelectorConfig {
            first_stable_min_chunks: min_chunks,
            first_stable_skip_unstable: skip_unstable,
            ..Default::default()
        }
    }

    #[test]
    fn skips_short_segments_when_configured() {
        // Two-chunk segment at 0, then five chunks at 120.
        let chunks = make_chunks(&[
            (0.0, 0.0),
            (0.3, 10.0),
            (120.0, 20.0),
            (120.2, 30.0),
            (119.8, 40.0),
            (120.1, 50.0),
            (120.0, 60.0),
        ]);
        let result = FirstStableSelector.select(&chunks, &config(3, true)).unwrap();
        assert_eq!(result.delay_ms, 120);
        assert_eq!(result.chunks_used, 5);
    }

    #[test]
    fn uses_first_segment_without_skip() {
        let chunks = make_chunks(&[
            (0.0, 0.0),
            (0.3, 10.0),
            (120.0, 20.0),
            (120.2, 30.0),
            (119.8, 40.0),
        ]);
        let result = FirstStableSelector.select(&chunks, &config(3, false)).unwrap();
        assert_eq!(result.delay_ms, 0);
        assert_eq!(result.chunks_used, 2);
    }

    #[test]
    fn none_when_no_segment_qualifies() {
        let chunks = make_chunks(&[(0.0, 0.0), (100.0, 10.0), (200.0, 20.0)]);
        assert!(FirstStableSelector.select(&chunks, &config(3, true)).is_none());
    }

    #[test]
    fn winner_rounds_segment_raw_average() {
        // Anchors at 100 but raw values pull the average to 100.6 -> 101.
        let chunks = make_chunks(&[(100.4, 0.0), (100.7, 10.0), (100.7, 20.0)]);
        let result = FirstStableSelector.select(&chunks, &config(3, true)).unwrap();
        assert_eq!(result.delay_ms, 101);
    }
}
