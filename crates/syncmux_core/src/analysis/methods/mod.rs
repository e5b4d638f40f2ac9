//! Correlation kernels.
//!
//! Each kernel takes two equal-length sample slices plus the sample rate and
//! returns `(delay_ms, confidence)` with confidence in 0-100. Kernels never
//! mutate their inputs. Positive delay means the target's content is early
//! and the target track must be delayed to align with the reference.

mod dtw;
mod gcc_phat;
mod gcc_scot;
mod onset;
mod scc;
mod spectrogram;
pub(crate) mod support;
mod whitened;

use std::collections::HashMap;

use once_cell::sync::Lazy;

pub use dtw::Dtw;
pub use gcc_phat::GccPhat;
pub use gcc_scot::GccScot;
pub use onset::Onset;
pub use scc::Scc;
pub use spectrogram::Spectrogram;
pub use whitened::Whitened;

use super::types::AnalysisResult;
use crate::models::CorrelationMethod;

/// A delay-estimation kernel.
pub trait CorrelationKernel: Send + Sync {
    /// Display name, matching the settings string.
    fn name(&self) -> &'static str;

    /// Estimate `(delay_ms, confidence)` between two equal-length chunks.
    fn find_delay(
        &self,
        reference: &[f32],
        target: &[f32],
        sample_rate: u32,
    ) -> AnalysisResult<(f64, f64)>;
}

type KernelFactory = fn(bool) -> Box<dyn CorrelationKernel>;

/// Kernel registry, built once per process and read concurrently afterwards.
static REGISTRY: Lazy<HashMap<CorrelationMethod, KernelFactory>> = Lazy::new(|| {
    let mut map: HashMap<CorrelationMethod, KernelFactory> = HashMap::new();
    map.insert(CorrelationMethod::Scc, |peak_fit| {
        Box::new(Scc::new(peak_fit))
    });
    map.insert(CorrelationMethod::GccPhat, |_| Box::new(GccPhat));
    map.insert(CorrelationMethod::GccScot, |_| Box::new(GccScot));
    map.insert(CorrelationMethod::Whitened, |_| Box::new(Whitened));
    map.insert(CorrelationMethod::Onset, |_| Box::new(Onset));
    map.insert(CorrelationMethod::Dtw, |_| Box::new(Dtw));
    map.insert(CorrelationMethod::Spectrogram, |_| Box::new(Spectrogram));
    map
});

/// Create the kernel for a configured method.
///
/// `peak_fit` only affects SCC; frame-level kernels have no sub-sample peak
/// to refine.
pub fn create_kernel(method: CorrelationMethod, peak_fit: bool) -> Box<dyn CorrelationKernel> {
    REGISTRY
        .get(&method)
        .map(|factory| factory(peak_fit))
        .unwrap_or_else(|| Box::new(Scc::new(peak_fit)))
}

/// Names of every registered kernel.
pub fn available_kernels() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.keys().map(|m| m.name()).collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_method() {
        for method in [
            CorrelationMethod::Scc,
            CorrelationMethod::GccPhat,
            CorrelationMethod::GccScot,
            CorrelationMethod::Whitened,
            CorrelationMethod::Onset,
            CorrelationMethod::Dtw,
            CorrelationMethod::Spectrogram,
        ] {
            let kernel = create_kernel(method, true);
            assert_eq!(kernel.name(), method.name());
        }
    }

    #[test]
    fn available_kernels_lists_seven() {
        assert_eq!(available_kernels().len(), 7);
    }
}
