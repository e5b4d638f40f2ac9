//! Core types for sync analysis.

use serde::{Deserialize, Serialize};

use crate::io::RunnerError;

/// One correlation measurement.
///
/// `delay_ms == raw_delay_ms.round()` at the point of production; every
/// later reduction carries the raw value separately and rounds exactly once
/// on output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Rounded delay (ms).
    pub delay_ms: i64,
    /// Unrounded delay (ms).
    pub raw_delay_ms: f64,
    /// Match confidence, 0-100.
    pub match_pct: f64,
    /// Chunk start on the reference timeline (s).
    pub start_s: f64,
    /// True iff `match_pct` met the configured minimum.
    pub accepted: bool,
}

impl ChunkResult {
    pub fn new(raw_delay_ms: f64, match_pct: f64, start_s: f64, min_match_pct: f64) -> Self {
        Self {
            delay_ms: raw_delay_ms.round() as i64,
            raw_delay_ms,
            match_pct,
            start_s,
            accepted: match_pct >= min_match_pct,
        }
    }
}

/// Winner of a delay-selection reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelaySelection {
    pub delay_ms: i64,
    pub raw_delay_ms: f64,
    /// Name of the strategy that produced the winner (fallbacks annotate).
    pub method: String,
    /// Chunks contributing to the winner.
    pub chunks_used: usize,
}

/// Audio stream chosen for correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSelection {
    /// 0-based audio stream index (ffmpeg `-map 0:a:N`).
    pub stream_index: usize,
    /// Container-assigned track id.
    pub track_id: u64,
    /// Language of the selected track.
    pub language: String,
    /// Codec id of the selected track.
    pub codec_id: String,
    /// Log-friendly description.
    pub description: String,
}

/// Errors from the analysis subsystem.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("source file not found: {0}")]
    SourceNotFound(String),

    #[error("no audio stream available in {0}")]
    NoAudioStream(String),

    #[error("decode produced no samples for {0}")]
    EmptyDecode(String),

    #[error("invalid audio data: {0}")]
    InvalidAudio(String),

    #[error("insufficient accepted chunks: got {accepted} of {required} required")]
    InsufficientChunks { accepted: usize, required: usize },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("videodiff error {error:.2} outside accepted range [{min:.2}, {max:.2}]")]
    VideoDiffOutOfRange { error: f64, min: f64, max: f64 },

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Delay std-dev summary for one source, used for stability warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityMetrics {
    pub accepted_chunks: usize,
    pub delay_std_dev_ms: f64,
    pub delay_spread_ms: i64,
    /// Above the configured variance threshold.
    pub unstable: bool,
}

/// Mean and (population) standard deviation of a slice.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Median of a slice (interpolated for even lengths).
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_result_rounds_once() {
        let r = ChunkResult::new(-178.555, 80.0, 12.0, 5.0);
        assert_eq!(r.delay_ms, -179);
        assert!((r.raw_delay_ms - -178.555).abs() < 1e-12);
        assert!(r.accepted);
    }

    #[test]
    fn chunk_result_rejects_below_threshold() {
        let r = ChunkResult::new(10.0, 4.9, 0.0, 5.0);
        assert!(!r.accepted);
    }

    #[test]
    fn median_interpolates_even_lengths() {
        assert_eq!(median(&[1.0, 3.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn mean_and_std_basics() {
        let (mean, std) = mean_and_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 2.0).abs() < 1e-12);
    }
}
