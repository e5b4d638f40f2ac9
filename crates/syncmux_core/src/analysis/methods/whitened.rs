//! Whitened cross-correlation.

use super::support::{argmax, circular_lag, gcc, widen, Weighting};
use super::CorrelationKernel;
use crate::analysis::confidence::normalize_peak_confidence;
use crate::analysis::types::{AnalysisError, AnalysisResult};

/// Equalizes both magnitude spectra before the conjugate product, making the
/// estimate robust to spectral differences between the two masters.
pub struct Whitened;

impl CorrelationKernel for Whitened {
    fn name(&self) -> &'static str {
        "Whitened Cross-Correlation"
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

        let (c, n) = gcc(&widen(reference), &widen(target), Weighting::Whiten);
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

    #[test]
    fn recovers_shift_despite_spectral_tilt() {
        let kernel = Whitened;
        let shift = 96usize; // 2 ms
        let base: Vec<f32> = (0..48000)
            .map(|i| (((i * 13 + 5) % 8191) as f32 / 8191.0 - 0.5) + (i as f32 * 0.011).sin())
            .collect();
        let mut reference = vec![0.0f32; shift];
        reference.extend_from_slice(&base[..48000 - shift]);
        // Tilt the target's spectrum with a simple one-pole smoother.
        let mut tilted = base.clone();
        for i in 1..tilted.len() {
            tilted[i] = 0.7 * tilted[i] + 0.3 * tilted[i - 1];
        }
        let (delay_ms, _) = kernel.find_delay(&reference, &tilted, 48000).unwrap();
        assert!((delay_ms - 2.0).abs() < 0.5, "delay {}", delay_ms);
    }
}
