//! Shared FFT machinery for the correlation kernels.
//!
//! Delay sign convention used throughout: a positive lag means the matching
//! content sits *earlier* in the target than in the reference, i.e. the
//! target track must be delayed by that amount to align.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Cross-spectrum weighting applied by the generalized kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Plain conjugate product.
    None,
    /// Divide by the cross-spectrum magnitude (phase transform).
    Phat,
    /// Divide by the geometric mean of the auto-spectra.
    Scot,
    /// Normalize each spectrum's magnitude before the product.
    Whiten,
}

/// Generalized cross-correlation of two real sequences.
///
/// Zero-pads both inputs to `n = len(ref) + len(tgt) - 1`, applies the
/// requested weighting to the cross-spectrum, and returns the magnitude of
/// the circular correlation together with `n`. Peak index `k` maps to lag
/// `k` when `k <= n/2`, else `k - n`.
pub fn gcc(reference: &[f64], target: &[f64], weighting: Weighting) -> (Vec<f64>, usize) {
    let n = reference.len() + target.len() - 1;
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut r: Vec<Complex<f64>> = reference.iter().map(|&x| Complex::new(x, 0.0)).collect();
    r.resize(n, Complex::new(0.0, 0.0));
    let mut t: Vec<Complex<f64>> = target.iter().map(|&x| Complex::new(x, 0.0)).collect();
    t.resize(n, Complex::new(0.0, 0.0));

    fft.process(&mut r);
    fft.process(&mut t);

    let mut g: Vec<Complex<f64>> = r
        .iter()
        .zip(t.iter())
        .map(|(a, b)| {
            let cross = a * b.conj();
            match weighting {
                Weighting::None => cross,
                Weighting::Phat => cross / (cross.norm() + 1e-9),
                Weighting::Scot => {
                    let denom = (a.norm_sqr() * b.norm_sqr()).sqrt() + 1e-9;
                    cross / denom
                }
                Weighting::Whiten => {
                    let wa = a / (a.norm() + 1e-9);
                    let wb = b / (b.norm() + 1e-9);
                    wa * wb.conj()
                }
            }
        })
        .collect();

    ifft.process(&mut g);

    let scale = 1.0 / n as f64;
    let magnitudes: Vec<f64> = g.iter().map(|c| c.norm() * scale).collect();
    (magnitudes, n)
}

/// Translate a circular correlation peak index into a signed lag.
pub fn circular_lag(peak_idx: usize, n: usize) -> i64 {
    if peak_idx as f64 > n as f64 / 2.0 {
        peak_idx as i64 - n as i64
    } else {
        peak_idx as i64
    }
}

/// Full linear cross-correlation `c[i] = sum_l ref[l] * tgt[l - lag]` with
/// `lag = i - (len(tgt) - 1)`.
///
/// Returns `(values, zero_lag_index)`.
pub fn xcorr_full(reference: &[f64], target: &[f64]) -> (Vec<f64>, usize) {
    let (circ, n) = gcc(reference, target, Weighting::None);
    let zero_lag = target.len() - 1;
    let out_len = reference.len() + target.len() - 1;

    // Reorder the circular array into linear lag order
    // [-(len(tgt)-1) .. +(len(ref)-1)].
    let mut linear = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let lag = i as i64 - zero_lag as i64;
        let idx = lag.rem_euclid(n as i64) as usize;
        linear.push(circ[idx]);
    }
    (linear, zero_lag)
}

/// Index of the maximum value; ties resolve to the first occurrence.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

/// Normalize to zero mean and unit standard deviation.
pub fn normalize(signal: &[f64]) -> Vec<f64> {
    let n = signal.len() as f64;
    if signal.is_empty() {
        return Vec::new();
    }
    let mean = signal.iter().sum::<f64>() / n;
    let std = (signal.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    signal.iter().map(|x| (x - mean) / (std + 1e-9)).collect()
}

/// Widen f32 analysis samples to the f64 the kernels work in.
pub fn widen(samples: &[f32]) -> Vec<f64> {
    samples.iter().map(|&x| x as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize) -> Vec<f64> {
        (0..len).map(|i| (i as f64 * 0.1).sin()).collect()
    }

    #[test]
    fn xcorr_peak_at_zero_for_identical() {
        let s = sine(512);
        let (c, zero_lag) = xcorr_full(&s, &s);
        assert_eq!(argmax(&c), zero_lag);
    }

    #[test]
    fn xcorr_positive_lag_when_target_is_early() {
        // Target content occurs `shift` samples earlier than in the
        // reference, so the required delay (lag) is +shift.
        let shift = 40usize;
        let base = sine(1024);
        let reference: Vec<f64> = {
            let mut v = vec![0.0; shift];
            v.extend_from_slice(&base[..1024 - shift]);
            v
        };
        let target = base;
        let (c, zero_lag) = xcorr_full(&reference, &target);
        let lag = argmax(&c) as i64 - zero_lag as i64;
        assert!(
            (lag - shift as i64).abs() <= 1,
            "expected lag ~{}, got {}",
            shift,
            lag
        );
    }

    #[test]
    fn gcc_phat_finds_same_shift() {
        let shift = 25usize;
        let base: Vec<f64> = (0..2048).map(|i| ((i * i) as f64 * 0.37).sin()).collect();
        let mut reference = vec![0.0; shift];
        reference.extend_from_slice(&base[..2048 - shift]);
        let (c, n) = gcc(&reference, &base, Weighting::Phat);
        let lag = circular_lag(argmax(&c), n);
        assert!(
            (lag - shift as i64).abs() <= 1,
            "expected lag ~{}, got {}",
            shift,
            lag
        );
    }

    #[test]
    fn circular_lag_wraps_negative() {
        assert_eq!(circular_lag(0, 100), 0);
        assert_eq!(circular_lag(10, 100), 10);
        assert_eq!(circular_lag(99, 100), -1);
    }

    #[test]
    fn normalize_produces_zero_mean_unit_std() {
        let v = normalize(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mean = v.iter().sum::<f64>() / v.len() as f64;
        let std = (v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / v.len() as f64).sqrt();
        assert!(mean.abs() < 1e-9);
        assert!((std - 1.0).abs() < 1e-6);
    }
}
