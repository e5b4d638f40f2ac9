//! Data model: enums, track identity, job specs and plans.

mod enums;
mod jobs;
mod media;

pub use enums::{
    AnalysisMode, CorrelationMethod, DelaySelectionMode, FillMode, FilteringMethod, JobStatus,
    ResampleEngine, SilenceDetectionMethod, SnapMode, SteppingCorrectionMode,
    SteppingFallbackMode, SteppingQualityMode, StyleFilterMode, SubtitleRounding,
    SubtitleSyncMode, SyncMode, TrackType,
};
pub use jobs::{
    Delays, JobResult, JobSpec, LayoutEntry, PlanItem, StyleFilterConfig, REFERENCE_SOURCE,
};
pub use media::{source_from_flag_key, track_id_from_flag_key, StreamProps, Track};
