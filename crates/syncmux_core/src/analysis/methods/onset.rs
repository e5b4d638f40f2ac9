//! Onset envelope correlation.

use super::support::{argmax, circular_lag, gcc, normalize, widen, Weighting};
use super::CorrelationKernel;
use crate::analysis::confidence::normalize_peak_confidence;
use crate::analysis::features::{frame_duration_ms, onset_strength};
use crate::analysis::types::{AnalysisError, AnalysisResult};

/// Correlates onset-strength envelopes rather than raw waveforms, matching
/// *when things happen* instead of how they sound. Robust to different
/// mixes. The envelopes themselves are aligned with GCC-PHAT.
pub struct Onset;

impl CorrelationKernel for Onset {
    fn name(&self) -> &'static str {
        "Onset Detection"
    }

    fn find_delay(
        &self,
        reference: &[f32],
        target: &[f32],
        sample_rate: u32,
    ) -> AnalysisResult<(f64, f64)> {
        let ref_env = onset_strength(&widen(reference), sample_rate);
        let tgt_env = onset_strength(&widen(target), sample_rate);
        if ref_env.is_empty() || tgt_env.is_empty() {
            return Err(AnalysisError::InvalidAudio(
                "chunk too short for onset envelope".to_string(),
            ));
        }

        let ref_env = normalize(&ref_env);
        let tgt_env = normalize(&tgt_env);

        let (c, n) = gcc(&ref_env, &tgt_env, Weighting::Phat);
        let k = argmax(&c);
        let lag_frames = circular_lag(k, n);
        let delay_ms = lag_frames as f64 * frame_duration_ms(sample_rate);
        let confidence = normalize_peak_confidence(&c, k);
        Ok((delay_ms, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_train(len: usize, period: usize, phase: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; len];
        let mut i = phase;
        while i < len {
            for j in i..(i + 64).min(len) {
                v[j] = 0.9;
            }
            i += period;
        }
        v
    }

    #[test]
    fn recovers_frame_scale_shift() {
        let kernel = Onset;
        let sr = 48000;
        // Target clicks start ~4096 samples (8 frames) earlier than reference.
        let shift = 4096;
        let reference = click_train(sr * 2, 19000, shift);
        let target = click_train(sr * 2, 19000, 0);
        let (delay_ms, _) = kernel.find_delay(&reference, &target, sr as u32).unwrap();
        let expected = shift as f64 / sr as f64 * 1000.0;
        assert!(
            (delay_ms - expected).abs() < 2.0 * frame_duration_ms(sr as u32),
            "delay {} expected ~{}",
            delay_ms,
            expected
        );
    }

    #[test]
    fn short_chunk_errors() {
        assert!(Onset.find_delay(&[0.0; 256], &[0.0; 256], 48000).is_err());
    }
}
