//! GCC with smoothed coherence transform weighting.

use super::support::{argmax, circular_lag, gcc, widen, Weighting};
use super::CorrelationKernel;
use crate::analysis::types::{AnalysisError, AnalysisResult};

/// GCC-SCOT weights by coherence instead of pure phase, which holds up
/// better when one side is noisier than the other.
pub struct GccScot;

impl CorrelationKernel for GccScot {
    fn name(&self) -> &'static str {
        "GCC-SCOT"
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

        let (c, n) = gcc(&widen(reference), &widen(target), Weighting::Scot);
        let k = argmax(&c);
        let lag = circular_lag(k, n);
        let delay_ms = lag as f64 / sample_rate as f64 * 1000.0;

        // Peak over mean, scaled x10 and capped.
        let mean = c.iter().sum::<f64>() / c.len() as f64;
        let confidence = (c[k] / (mean + 1e-9) * 10.0).min(100.0);

        Ok((delay_ms, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_known_shift() {
        let kernel = GccScot;
        let shift = 480usize;
        let base: Vec<f32> = (0..48000)
            .map(|i| (((i * 17 + 3) % 6007) as f32 / 6007.0 - 0.5) + (i as f32 * 0.017).sin())
            .collect();
        let mut reference = vec![0.0f32; shift];
        reference.extend_from_slice(&base[..48000 - shift]);
        let (delay_ms, confidence) = kernel.find_delay(&reference, &base, 48000).unwrap();
        assert!((delay_ms - 10.0).abs() < 0.5, "delay {}", delay_ms);
        assert!(confidence > 0.0);
        assert!(confidence <= 100.0);
    }
}
