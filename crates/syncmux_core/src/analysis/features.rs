//! Frame-level audio features for the feature-domain kernels.
//!
//! Mel spectrograms, MFCCs, and onset-strength envelopes computed over a
//! Hann-windowed STFT. Frame timing matches the hop convention the kernels
//! use to convert frame lags back to milliseconds.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// STFT / feature frame hop in samples.
pub const HOP_LENGTH: usize = 512;
/// STFT window length in samples.
pub const N_FFT: usize = 2048;
/// Mel bands for spectrogram correlation and onset envelopes.
pub const N_MELS: usize = 64;
/// MFCC coefficients per frame.
pub const N_MFCC: usize = 13;

/// Power spectrogram: frames x (N_FFT/2 + 1) bins.
pub fn power_spectrogram(samples: &[f64]) -> Vec<Vec<f64>> {
    if samples.len() < N_FFT {
        return Vec::new();
    }
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(N_FFT);

    let window: Vec<f64> = (0..N_FFT)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / N_FFT as f64).cos())
        .collect();

    let num_frames = (samples.len() - N_FFT) / HOP_LENGTH + 1;
    let bins = N_FFT / 2 + 1;
    let mut frames = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * HOP_LENGTH;
        let mut buf: Vec<Complex<f64>> = samples[start..start + N_FFT]
            .iter()
            .zip(window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        fft.process(&mut buf);
        frames.push(buf[..bins].iter().map(|c| c.norm_sqr()).collect());
    }
    frames
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank: N_MELS filters x bins.
fn mel_filterbank(sample_rate: u32, bins: usize) -> Vec<Vec<f64>> {
    let f_max = sample_rate as f64 / 2.0;
    let mel_max = hz_to_mel(f_max);
    let mel_points: Vec<f64> = (0..N_MELS + 2)
        .map(|i| mel_max * i as f64 / (N_MELS + 1) as f64)
        .collect();
    let bin_freqs: Vec<f64> = (0..bins)
        .map(|b| b as f64 * f_max / (bins - 1) as f64)
        .collect();

    let mut bank = Vec::with_capacity(N_MELS);
    for m in 0..N_MELS {
        let lower = mel_to_hz(mel_points[m]);
        let center = mel_to_hz(mel_points[m + 1]);
        let upper = mel_to_hz(mel_points[m + 2]);
        let filter: Vec<f64> = bin_freqs
            .iter()
            .map(|&f| {
                if f <= lower || f >= upper {
                    0.0
                } else if f <= center {
                    (f - lower) / (center - lower + 1e-12)
                } else {
                    (upper - f) / (upper - center + 1e-12)
                }
            })
            .collect();
        bank.push(filter);
    }
    bank
}

/// Mel power spectrogram: N_MELS bands x frames.
pub fn mel_spectrogram(samples: &[f64], sample_rate: u32) -> Vec<Vec<f64>> {
    let power = power_spectrogram(samples);
    if power.is_empty() {
        return Vec::new();
    }
    let bins = power[0].len();
    let bank = mel_filterbank(sample_rate, bins);
    let num_frames = power.len();

    let mut mel = vec![vec![0.0; num_frames]; N_MELS];
    for (t, frame) in power.iter().enumerate() {
        for (m, filter) in bank.iter().enumerate() {
            mel[m][t] = filter
                .iter()
                .zip(frame.iter())
                .map(|(&w, &p)| w * p)
                .sum();
        }
    }
    mel
}

/// Convert a mel power spectrogram to dB relative to its maximum, with an
/// 80 dB floor.
pub fn power_to_db(mel: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let max_power = mel
        .iter()
        .flat_map(|row| row.iter())
        .fold(1e-10f64, |a, &b| a.max(b));
    mel.iter()
        .map(|row| {
            row.iter()
                .map(|&p| {
                    let db = 10.0 * (p.max(1e-10) / max_power).log10();
                    db.max(-80.0)
                })
                .collect()
        })
        .collect()
}

/// Onset-strength envelope: per-frame mean of the positive spectral flux of
/// the dB mel spectrogram.
pub fn onset_strength(samples: &[f64], sample_rate: u32) -> Vec<f64> {
    let mel_db = power_to_db(&mel_spectrogram(samples, sample_rate));
    if mel_db.is_empty() || mel_db[0].len() < 2 {
        return Vec::new();
    }
    let num_frames = mel_db[0].len();
    let mut envelope = Vec::with_capacity(num_frames - 1);
    for t in 1..num_frames {
        let flux: f64 = mel_db
            .iter()
            .map(|band| (band[t] - band[t - 1]).max(0.0))
            .sum::<f64>()
            / mel_db.len() as f64;
        envelope.push(flux);
    }
    envelope
}

/// MFCC matrix: N_MFCC coefficients x frames (DCT-II over the dB mel bands).
pub fn mfcc(samples: &[f64], sample_rate: u32) -> Vec<Vec<f64>> {
    let mel_db = power_to_db(&mel_spectrogram(samples, sample_rate));
    if mel_db.is_empty() {
        return Vec::new();
    }
    let num_frames = mel_db[0].len();
    let n = N_MELS as f64;

    let mut out = vec![vec![0.0; num_frames]; N_MFCC];
    for t in 0..num_frames {
        for (k, row) in out.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (m, band) in mel_db.iter().enumerate() {
                acc += band[t] * (PI * k as f64 * (m as f64 + 0.5) / n).cos();
            }
            // Orthonormal DCT-II scaling.
            let scale = if k == 0 {
                (1.0 / n).sqrt()
            } else {
                (2.0 / n).sqrt()
            };
            row[t] = acc * scale;
        }
    }
    out
}

/// DTW alignment of two feature matrices (coefficients x frames) under the
/// euclidean frame distance.
///
/// Returns the warping path as `(ref_frame, tgt_frame)` pairs from start to
/// end, and the accumulated cost of the full path.
pub fn dtw_path(x: &[Vec<f64>], y: &[Vec<f64>]) -> Option<(Vec<(usize, usize)>, f64)> {
    let nx = x.first()?.len();
    let ny = y.first()?.len();
    if nx == 0 || ny == 0 {
        return None;
    }

    let dist = |i: usize, j: usize| -> f64 {
        x.iter()
            .zip(y.iter())
            .map(|(xr, yr)| (xr[i] - yr[j]).powi(2))
            .sum::<f64>()
            .sqrt()
    };

    let mut acc = vec![vec![f64::INFINITY; ny]; nx];
    acc[0][0] = dist(0, 0);
    for i in 0..nx {
        for j in 0..ny {
            if i == 0 && j == 0 {
                continue;
            }
            let mut best = f64::INFINITY;
            if i > 0 {
                best = best.min(acc[i - 1][j]);
            }
            if j > 0 {
                best = best.min(acc[i][j - 1]);
            }
            if i > 0 && j > 0 {
                best = best.min(acc[i - 1][j - 1]);
            }
            acc[i][j] = dist(i, j) + best;
        }
    }

    // Backtrack from the end.
    let mut path = vec![(nx - 1, ny - 1)];
    let (mut i, mut j) = (nx - 1, ny - 1);
    while i > 0 || j > 0 {
        let (ni, nj) = if i == 0 {
            (i, j - 1)
        } else if j == 0 {
            (i - 1, j)
        } else {
            let diag = acc[i - 1][j - 1];
            let up = acc[i - 1][j];
            let left = acc[i][j - 1];
            if diag <= up && diag <= left {
                (i - 1, j - 1)
            } else if up <= left {
                (i - 1, j)
            } else {
                (i, j - 1)
            }
        };
        i = ni;
        j = nj;
        path.push((i, j));
    }
    path.reverse();

    Some((path, acc[nx - 1][ny - 1]))
}

/// Frame duration in milliseconds at the module hop length.
pub fn frame_duration_ms(sample_rate: u32) -> f64 {
    HOP_LENGTH as f64 / sample_rate as f64 * 1000.0
}
