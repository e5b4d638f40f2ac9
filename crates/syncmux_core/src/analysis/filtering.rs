//! Audio pre-filtering for correlation.
//!
//! Band-pass isolates dialogue frequencies with a Butterworth IIR cascade;
//! low-pass is a windowed-sinc FIR. Filter design failure degrades to
//! passthrough with a warning rather than aborting analysis.

use std::f64::consts::PI;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

use crate::config::AnalysisSettings;
use crate::logging::JobLogger;
use crate::models::FilteringMethod;

/// Apply the configured filtering method to both analysis buffers.
pub fn apply_configured_filter(
    ref_pcm: &mut Vec<f32>,
    tgt_pcm: &mut Vec<f32>,
    sample_rate: u32,
    settings: &AnalysisSettings,
    logger: &JobLogger,
) {
    match settings.filtering_method {
        FilteringMethod::None => {}
        FilteringMethod::DialogueBandPass => {
            logger.message("Applying Dialogue Band-Pass filter...");
            let lowcut = settings.filter_bandpass_lowcut_hz;
            let highcut = settings.filter_bandpass_highcut_hz;
            let order = settings.filter_bandpass_order as usize;
            *ref_pcm = apply_bandpass(ref_pcm, sample_rate, lowcut, highcut, order, logger);
            *tgt_pcm = apply_bandpass(tgt_pcm, sample_rate, lowcut, highcut, order, logger);
        }
        FilteringMethod::LowPass => {
            let cutoff = settings.audio_bandlimit_hz;
            if cutoff > 0.0 {
                logger.message(&format!("Applying Low-Pass filter at {} Hz...", cutoff));
                let taps = settings.filter_lowpass_taps as usize;
                *ref_pcm = apply_lowpass(ref_pcm, sample_rate, cutoff, taps, logger);
                *tgt_pcm = apply_lowpass(tgt_pcm, sample_rate, cutoff, taps, logger);
            }
        }
    }
}

/// Butterworth band-pass: a high-pass cascade at `lowcut` followed by a
/// low-pass cascade at `highcut`.
///
/// Returns the input unchanged (with a warning) when the cutoffs cannot be
/// realized at this sample rate.
pub fn apply_bandpass(
    samples: &[f32],
    sample_rate: u32,
    lowcut_hz: f64,
    highcut_hz: f64,
    order: usize,
    logger: &JobLogger,
) -> Vec<f32> {
    match try_bandpass(samples, sample_rate, lowcut_hz, highcut_hz, order) {
        Some(filtered) => filtered,
        None => {
            logger.warn(&format!(
                "Band-pass filter design failed ({}-{} Hz @ {} Hz), using unfiltered waveform",
                lowcut_hz, highcut_hz, sample_rate
            ));
            samples.to_vec()
        }
    }
}

fn try_bandpass(
    samples: &[f32],
    sample_rate: u32,
    lowcut_hz: f64,
    highcut_hz: f64,
    order: usize,
) -> Option<Vec<f32>> {
    let nyquist = sample_rate as f64 / 2.0;
    if !(0.0 < lowcut_hz && lowcut_hz < highcut_hz && highcut_hz < nyquist) || order == 0 {
        return None;
    }

    let fs = (sample_rate as f64).hz();
    let mut sections: Vec<DirectForm2Transposed<f64>> = Vec::new();
    for q in butterworth_q_ladder(order) {
        let hp = Coefficients::<f64>::from_params(Type::HighPass, fs, lowcut_hz.hz(), q).ok()?;
        let lp = Coefficients::<f64>::from_params(Type::LowPass, fs, highcut_hz.hz(), q).ok()?;
        sections.push(DirectForm2Transposed::<f64>::new(hp));
        sections.push(DirectForm2Transposed::<f64>::new(lp));
    }

    let mut out = Vec::with_capacity(samples.len());
    for &sample in samples {
        let mut x = sample as f64;
        for section in &mut sections {
            x = section.run(x);
        }
        out.push(x as f32);
    }
    Some(out)
}

/// Q values of the second-order sections of an order-N Butterworth cascade.
///
/// Odd orders carry their real pole as a Q=0.5 section.
fn butterworth_q_ladder(order: usize) -> Vec<f64> {
    let pairs = order / 2;
    let mut qs: Vec<f64> = (0..pairs)
        .map(|k| 1.0 / (2.0 * (PI * (2 * k + 1) as f64 / (2.0 * order as f64)).sin()))
        .collect();
    if order % 2 == 1 {
        qs.push(0.5);
    }
    qs
}

/// Windowed-sinc FIR low-pass with `num_taps` taps and a Hamming window.
pub fn apply_lowpass(
    samples: &[f32],
    sample_rate: u32,
    cutoff_hz: f64,
    num_taps: usize,
    logger: &JobLogger,
) -> Vec<f32> {
    let nyquist = sample_rate as f64 / 2.0;
    if cutoff_hz <= 0.0 || num_taps < 3 {
        return samples.to_vec();
    }
    let cutoff = cutoff_hz.min(nyquist - 1.0);
    let normalized = cutoff / nyquist;
    if !(0.0..1.0).contains(&normalized) {
        logger.warn(&format!(
            "Low-pass filter design failed ({} Hz @ {} Hz), using unfiltered waveform",
            cutoff_hz, sample_rate
        ));
        return samples.to_vec();
    }

    let coeffs = design_lowpass_fir(num_taps, normalized);
    apply_fir(samples, &coeffs)
}

fn design_lowpass_fir(num_taps: usize, normalized_cutoff: f64) -> Vec<f64> {
    let m = num_taps as f64 - 1.0;
    let mut coeffs: Vec<f64> = (0..num_taps)
        .map(|i| {
            let n = i as f64;
            let centered = n - m / 2.0;
            let sinc = if centered.abs() < 1e-10 {
                2.0 * normalized_cutoff
            } else {
                (2.0 * PI * normalized_cutoff * centered).sin() / (PI * centered)
            };
            let window = 0.54 - 0.46 * (2.0 * PI * n / m).cos();
            sinc * window
        })
        .collect();

    // Unity gain at DC.
    let sum: f64 = coeffs.iter().sum();
    if sum.abs() > 1e-10 {
        for c in &mut coeffs {
            *c /= sum;
        }
    }
    coeffs
}

fn apply_fir(samples: &[f32], coeffs: &[f64]) -> Vec<f32> {
    let mut out = vec![0.0f32; samples.len()];
    for i in 0..samples.len() {
        let mut acc = 0.0f64;
        for (j, &c) in coeffs.iter().enumerate() {
            if i >= j {
                acc += samples[i - j] as f64 * c;
            }
        }
        out[i] = acc as f32;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{JobLogger, LogConfig};

    fn logger() -> JobLogger {
        JobLogger::sink_only("filter", LogConfig::default(), None)
    }

    fn tone(freq: f64, sample_rate: u32, seconds: f64) -> Vec<f32> {
        let n = (sample_rate as f64 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate as f64).sin() as f32)
            .collect()
    }

    fn energy(samples: &[f32]) -> f64 {
        samples.iter().map(|&x| (x as f64).powi(2)).sum()
    }

    #[test]
    fn butterworth_ladder_matches_known_values() {
        let q2 = butterworth_q_ladder(2);
        assert_eq!(q2.len(), 1);
        assert!((q2[0] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);

        let q4 = butterworth_q_ladder(4);
        assert!((q4[0] - 1.3066).abs() < 1e-3);
        assert!((q4[1] - 0.5412).abs() < 1e-3);

        let q5 = butterworth_q_ladder(5);
        assert_eq!(q5.len(), 3);
        assert_eq!(q5[2], 0.5);
    }

    #[test]
    fn bandpass_attenuates_out_of_band_tone() {
        let log = logger();
        let sr = 48000;
        let in_band = tone(1000.0, sr, 0.2);
        let out_of_band = tone(8000.0, sr, 0.2);

        let in_filtered = apply_bandpass(&in_band, sr, 300.0, 3400.0, 5, &log);
        let out_filtered = apply_bandpass(&out_of_band, sr, 300.0, 3400.0, 5, &log);

        // Skip the settle-in region.
        let half = in_band.len() / 2;
        let kept = energy(&in_filtered[half..]) / energy(&in_band[half..]);
        let removed = energy(&out_filtered[half..]) / energy(&out_of_band[half..]);
        assert!(kept > 0.5, "in-band tone should survive, ratio {}", kept);
        assert!(removed < 0.05, "out-of-band tone should vanish, ratio {}", removed);
    }

    #[test]
    fn invalid_bandpass_degrades_to_passthrough() {
        let log = logger();
        let samples = tone(1000.0, 48000, 0.01);
        // highcut above nyquist: unrealizable
        let out = apply_bandpass(&samples, 48000, 300.0, 30000.0, 5, &log);
        assert_eq!(out, samples);
    }

    #[test]
    fn lowpass_attenuates_high_freq() {
        let log = logger();
        let sr = 48000;
        let mixed: Vec<f32> = tone(100.0, sr, 0.1)
            .iter()
            .zip(tone(5000.0, sr, 0.1))
            .map(|(a, b)| a + b)
            .collect();

        let filtered = apply_lowpass(&mixed, sr, 500.0, 101, &log);
        let half = mixed.len() / 2;
        assert!(energy(&filtered[half..]) < energy(&mixed[half..]));
    }

    #[test]
    fn zero_cutoff_is_passthrough() {
        let log = logger();
        let samples = vec![1.0f32, 2.0, 3.0];
        assert_eq!(apply_lowpass(&samples, 48000, 0.0, 101, &log), samples);
    }
}
