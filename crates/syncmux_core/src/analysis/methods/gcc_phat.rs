//! Generalized cross-correlation with phase transform.

use super::support::{argmax, circular_lag, gcc, widen, Weighting};
use super::CorrelationKernel;
use crate::analysis::confidence::normalize_peak_confidence;
use crate::analysis::types::{AnalysisError, AnalysisResult};

/// GCC-PHAT: only phase information contributes to the delay estimate.
pub struct GccPhat;

impl CorrelationKernel for GccPhat {
    fn name(&self) -> &'static str {
        "Phase Correlation (GCC-PHAT)"
    }

    fn find_delay(
        &self,
        reference: &[f32],
        target: &[f32],
        sample_rate: u32,
    ) -> AnalysisResult<(f64, f64)> {
        if reference.is_empty() || target.is_empty() {
            return Err(AnalysisError::InvalidAudio("empty audio chunk".to_string()));
        }

        let (c, n) = gcc(&widen(reference), &widen(target), Weighting::Phat);
        let k = argmax(&c);
        let lag = circular_lag(k, n);
        let delay_ms = lag as f64 / sample_rate as f64 * 1000.0;
        let confidence = normalize_peak_confidence(&c, k);
        Ok((delay_ms, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise_like(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (((i * 31 + 11) % 7919) as f32 / 7919.0 - 0.5) + (i as f32 * 0.021).sin())
            .collect()
    }

    #[test]
    fn recovers_known_shift() {
        let kernel = GccPhat;
        let shift = 240; // 5 ms at 48 kHz
        let base = noise_like(48000);
        let mut reference = vec![0.0f32; shift];
        reference.extend_from_slice(&base[..48000 - shift]);
        let (delay_ms, confidence) = kernel.find_delay(&reference, &base, 48000).unwrap();
        assert!((delay_ms - 5.0).abs() < 0.5, "delay {}", delay_ms);
        assert!(confidence > 10.0, "confidence {}", confidence);
    }

    #[test]
    fn empty_input_errors() {
        assert!(GccPhat.find_delay(&[], &[0.0], 48000).is_err());
    }
}
