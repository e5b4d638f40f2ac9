//! Audio correction: PAL, linear drift, stepping.
//!
//! Dispatch rules: PAL and linear drift are cross-exclusive with stepping
//! (the diagnosis emits exactly one), and none of the correctors run on
//! source-separated stems. Every corrector replaces its targets with a
//! lossless FLAC and keeps the original as a preserved sibling.

mod edl;
mod items;
mod linear;
mod pal;
mod resample;
pub mod stepping;

pub use edl::{edl_is_well_formed, generate_edl_from_chunks, segment_at, AudioSegment};
pub use items::split_corrected_pair;
pub use linear::run_linear_correction;
pub use pal::run_pal_correction;
pub use resample::{
    build_tempo_filter, drift_tempo_ratio, engine_failure_hint, pal_tempo_ratio, resample_command,
};
pub use stepping::{
    run_stepping_correction, SteppingCorrector, SteppingOutcome,
};

use crate::analysis::{AnalysisError, SteppingDiagnosis};
use crate::io::RunnerError;

/// Stepping flag stored per `"{source}_{track_id}"` after diagnosis.
#[derive(Debug, Clone)]
pub struct SteppingFlag {
    /// The globally-selected delay at diagnosis time (QA anchor).
    pub base_delay_ms: i64,
    /// The source contributes no audio; Phase A still runs so subtitles get
    /// a verified EDL.
    pub subs_only: bool,
    /// Cluster validation outcome from the diagnosis.
    pub diagnosis: Option<SteppingDiagnosis>,
}

#[derive(Debug, thiserror::Error)]
pub enum CorrectionError {
    #[error("track {track} has no extracted payload to correct")]
    MissingPayload { track: String },

    #[error("resample failed for {file}{hint}: {source}")]
    ResampleFailed {
        file: String,
        hint: String,
        #[source]
        source: RunnerError,
    },

    #[error("EDL assembly failed: {message}")]
    AssemblyFailed { message: String },

    #[error("stepping correction failed for {source_id}: {message}")]
    SteppingFailed { source_id: String, message: String },

    /// The assembled correction failed its QA re-correlation. There is no
    /// safe fallback for a stepping-detected source.
    #[error("corrected track for {source_id} failed the QA re-correlation")]
    QaFailed { source_id: String },

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
