//! DTW over MFCC frames.

use super::support::widen;
use super::CorrelationKernel;
use crate::analysis::features::{dtw_path, frame_duration_ms, mfcc};
use crate::analysis::types::{AnalysisError, AnalysisResult};

/// Dynamic time warping over MFCC features. Handles tempo variation; the
/// reported delay is the median frame offset along the optimal warping path,
/// and confidence falls off with the average path cost.
pub struct Dtw;

impl CorrelationKernel for Dtw {
    fn name(&self) -> &'static str {
        "DTW (Dynamic Time Warping)"
    }

    fn find_delay(
        &self,
        reference: &[f32],
        target: &[f32],
        sample_rate: u32,
    ) -> AnalysisResult<(f64, f64)> {
        let ref_mfcc = mfcc(&widen(reference), sample_rate);
        let tgt_mfcc = mfcc(&widen(target), sample_rate);
        if ref_mfcc.is_empty() || tgt_mfcc.is_empty() {
            return Err(AnalysisError::InvalidAudio(
                "chunk too short for MFCC frames".to_string(),
            ));
        }

        let (path, total_cost) = dtw_path(&ref_mfcc, &tgt_mfcc).ok_or_else(|| {
            AnalysisError::InvalidAudio("DTW produced no alignment path".to_string())
        })?;

        // Median offset is robust against the degenerate corners of the path.
        let mut offsets: Vec<f64> = path
            .iter()
            .map(|&(ref_frame, tgt_frame)| ref_frame as f64 - tgt_frame as f64)
            .collect();
        offsets.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median_offset = offsets[offsets.len() / 2];

        let delay_ms = median_offset * frame_duration_ms(sample_rate);

        let avg_cost = if path.is_empty() {
            f64::INFINITY
        } else {
            total_cost / path.len() as f64
        };
        let confidence = (100.0 - avg_cost * 0.5).clamp(0.0, 100.0);

        Ok((delay_ms, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_audio_reports_zero_offset() {
        let kernel = Dtw;
        let s: Vec<f32> = (0..48000)
            .map(|i| (i as f32 * 0.02).sin() * ((i / 4800) % 3) as f32)
            .collect();
        let (delay_ms, confidence) = kernel.find_delay(&s, &s, 48000).unwrap();
        assert!(delay_ms.abs() < frame_duration_ms(48000), "delay {}", delay_ms);
        assert!(confidence > 90.0, "confidence {}", confidence);
    }

    #[test]
    fn short_chunk_errors() {
        assert!(Dtw.find_delay(&[0.0; 64], &[0.0; 64], 48000).is_err());
    }
}
