//! Standard cross-correlation with optional parabolic peak refinement.

use super::support::{argmax, normalize, widen, xcorr_full};
use super::CorrelationKernel;
use crate::analysis::types::{AnalysisError, AnalysisResult};

/// Standard Cross-Correlation on zero-mean / unit-std waveforms.
pub struct Scc {
    peak_fit: bool,
}

impl Scc {
    pub fn new(peak_fit: bool) -> Self {
        Self { peak_fit }
    }
}

impl CorrelationKernel for Scc {
    fn name(&self) -> &'static str {
        "Standard Correlation (SCC)"
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

        let r = normalize(&widen(reference));
        let t = normalize(&widen(target));

        let (c, zero_lag) = xcorr_full(&r, &t);
        let k = argmax(&c);
        let mut lag_samples = k as f64 - zero_lag as f64;

        // Parabolic sub-sample fit around the peak.
        if self.peak_fit && k > 0 && k + 1 < c.len() {
            let (y1, y2, y3) = (c[k - 1], c[k], c[k + 1]);
            let denom = y1 - 2.0 * y2 + y3;
            if denom.abs() > 1e-12 {
                let delta = 0.5 * (y1 - y3) / denom;
                if delta.abs() < 1.0 {
                    lag_samples += delta;
                }
            }
        }

        let delay_ms = lag_samples / sample_rate as f64 * 1000.0;

        let ref_energy: f64 = r.iter().map(|x| x * x).sum();
        let tgt_energy: f64 = t.iter().map(|x| x * x).sum();
        let match_pct = (c[k] / ((ref_energy * tgt_energy).sqrt() + 1e-9) * 100.0).clamp(0.0, 100.0);

        Ok((delay_ms, match_pct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise_like(len: usize) -> Vec<f32> {
        // Deterministic wide-band signal.
        (0..len)
            .map(|i| (((i * i + 7) % 9973) as f32 / 9973.0 - 0.5) + (i as f32 * 0.013).sin())
            .collect()
    }

    #[test]
    fn identical_signals_have_zero_delay_and_high_match() {
        let scc = Scc::new(false);
        let s = noise_like(48000);
        let (delay_ms, match_pct) = scc.find_delay(&s, &s, 48000).unwrap();
        assert!(delay_ms.abs() < 0.05, "delay {}", delay_ms);
        assert!(match_pct > 90.0, "match {}", match_pct);
    }

    #[test]
    fn early_target_yields_positive_delay() {
        let scc = Scc::new(false);
        let shift = 480; // 10 ms at 48 kHz
        let base = noise_like(48000);
        // Reference contains the content `shift` samples later than target.
        let mut reference = vec![0.0f32; shift];
        reference.extend_from_slice(&base[..48000 - shift]);
        let (delay_ms, _) = scc.find_delay(&reference, &base, 48000).unwrap();
        assert!((delay_ms - 10.0).abs() < 0.5, "delay {}", delay_ms);
    }

    #[test]
    fn late_target_yields_negative_delay() {
        let scc = Scc::new(false);
        let shift = 960; // 20 ms
        let base = noise_like(48000);
        let mut target = vec![0.0f32; shift];
        target.extend_from_slice(&base[..48000 - shift]);
        let (delay_ms, _) = scc.find_delay(&base, &target, 48000).unwrap();
        assert!((delay_ms + 20.0).abs() < 0.5, "delay {}", delay_ms);
    }

    #[test]
    fn peak_fit_stays_within_one_sample() {
        let with_fit = Scc::new(true);
        let without = Scc::new(false);
        let s = noise_like(24000);
        let (a, _) = with_fit.find_delay(&s, &s, 48000).unwrap();
        let (b, _) = without.find_delay(&s, &s, 48000).unwrap();
        assert!((a - b).abs() <= 1000.0 / 48000.0);
    }

    #[test]
    fn empty_chunk_is_rejected() {
        let scc = Scc::new(false);
        assert!(scc.find_delay(&[], &[1.0], 48000).is_err());
        assert!(scc.find_delay(&[1.0], &[], 48000).is_err());
    }
}
