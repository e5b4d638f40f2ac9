//! Mel-spectrogram correlation.

use super::support::{argmax, circular_lag, gcc, normalize, widen, Weighting};
use super::CorrelationKernel;
use crate::analysis::confidence::normalize_peak_confidence;
use crate::analysis::features::{frame_duration_ms, mel_spectrogram, power_to_db};
use crate::analysis::types::{AnalysisError, AnalysisResult};

/// Averages the dB mel spectrogram across bands into a 1-D sequence per
/// side, then aligns the sequences with GCC-PHAT. Captures joint
/// time/frequency structure at frame resolution.
pub struct Spectrogram;

impl CorrelationKernel for Spectrogram {
    fn name(&self) -> &'static str {
        "Spectrogram Correlation"
    }

    fn find_delay(
        &self,
        reference: &[f32],
        target: &[f32],
        sample_rate: u32,
    ) -> AnalysisResult<(f64, f64)> {
        let ref_seq = band_average(&widen(reference), sample_rate)?;
        let tgt_seq = band_average(&widen(target), sample_rate)?;

        let ref_seq = normalize(&ref_seq);
        let tgt_seq = normalize(&tgt_seq);

        let (c, n) = gcc(&ref_seq, &tgt_seq, Weighting::Phat);
        let k = argmax(&c);
        let lag_frames = circular_lag(k, n);
        let delay_ms = lag_frames as f64 * frame_duration_ms(sample_rate);
        let confidence = normalize_peak_confidence(&c, k);
        Ok((delay_ms, confidence))
    }
}

fn band_average(samples: &[f64], sample_rate: u32) -> AnalysisResult<Vec<f64>> {
    let mel_db = power_to_db(&mel_spectrogram(samples, sample_rate));
    if mel_db.is_empty() || mel_db[0].is_empty() {
        return Err(AnalysisError::InvalidAudio(
            "chunk too short for mel spectrogram".to_string(),
        ));
    }
    let frames = mel_db[0].len();
    Ok((0..frames)
        .map(|t| mel_db.iter().map(|band| band[t]).sum::<f64>() / mel_db.len() as f64)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_shift_for_identical_audio() {
        let kernel = Spectrogram;
        let s: Vec<f32> = (0..96000)
            .map(|i| ((i as f32 * 0.01).sin() * ((i / 9600) % 2) as f32))
            .collect();
        let (delay_ms, _) = kernel.find_delay(&s, &s, 48000).unwrap();
        assert!(delay_ms.abs() < 1e-9, "delay {}", delay_ms);
    }

    #[test]
    fn short_chunk_errors() {
        assert!(Spectrogram.find_delay(&[0.0; 100], &[0.0; 100], 48000).is_err());
    }
}
