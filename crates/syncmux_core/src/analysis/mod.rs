//! Sync analysis: decoding, correlation, delay selection, diagnosis.
//!
//! The orchestrator's analysis step composes these pieces:
//!
//! 1. stream selection and decode (`decode`)
//! 2. optional pre-filtering (`filtering`)
//! 3. chunk extraction (`chunks`)
//! 4. correlation kernels (`methods`)
//! 5. delay selection (`delay_selection`)
//! 6. drift/stepping diagnosis (`drift`)
//! 7. container delay rebasing and global shift (`container_delays`,
//!    `global_shift`)

mod chunks;
pub mod confidence;
mod container_delays;
mod decode;
pub mod delay_selection;
pub mod drift;
pub mod features;
pub mod filtering;
mod global_shift;
mod lang;
mod media_probe;
pub mod methods;
mod run;
mod stability;
pub mod types;
mod videodiff;

pub use chunks::{extract_chunk_pairs, ChunkPair};
pub use confidence::normalize_peak_confidence;
pub use container_delays::{
    calculate_delay_chain, get_container_delay_info, parse_container_delays, ContainerDelayInfo,
};
pub use decode::{
    decode_audio, decode_audio_i32, select_audio_stream, DEFAULT_ANALYSIS_SAMPLE_RATE,
};
pub use delay_selection::{get_selector, DelaySelector, SelectorConfig};
pub use drift::{
    diagnose, dbscan_1d, format_chunk_range, linear_regression, ClusterInfo, Diagnosis,
    QualityThresholds, SteppingDiagnosis, PAL_DRIFT_RATE_MS_PER_S,
};
pub use global_shift::{apply_global_shift, calculate_global_shift, GlobalShift};
pub use lang::normalize_lang;
pub use media_probe::{
    default_layout, get_audio_codec_name, get_audio_properties, get_display_aspect_ratio,
    get_video_framerate,
};
pub use methods::{available_kernels, create_kernel, CorrelationKernel};
pub use run::{run_audio_correlation, CorrelationRun};
pub use stability::evaluate_stability;
pub use types::{
    mean_and_std, median, AnalysisError, AnalysisResult, ChunkResult, DelaySelection,
    StabilityMetrics, TrackSelection,
};
pub use videodiff::{parse_videodiff_output, run_videodiff};
