//! Job context and accumulated state.
//!
//! `JobContext` is the read-only side: spec, settings, directories, and the
//! command runner. `JobState` is the mutable pipeline value that stages
//! populate strictly forward; later stages only consume fields earlier
//! stages wrote.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::analysis::{ChunkResult, ContainerDelayInfo};
use crate::config::Settings;
use crate::correction::{AudioSegment, SteppingFlag};
use crate::io::CommandRunner;
use crate::logging::JobLogger;
use crate::models::{Delays, JobSpec, PlanItem, REFERENCE_SOURCE};
use crate::subtitles::ClampReport;

pub struct JobContext {
    pub spec: JobSpec,
    pub settings: Settings,
    pub job_name: String,
    /// Job-scoped temp directory (under temp_root).
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub runner: CommandRunner,
}

impl JobContext {
    pub fn logger(&self) -> &Arc<JobLogger> {
        self.runner.logger()
    }

    pub fn reference_path(&self) -> Option<&PathBuf> {
        self.spec.sources.get(REFERENCE_SOURCE)
    }
}

/// Running outputs of the pipeline.
#[derive(Default)]
pub struct JobState {
    // Analysis outputs.
    pub delays: Delays,
    pub source1_container: Option<ContainerDelayInfo>,
    pub reference_framerate: Option<f64>,
    /// Per-source accepted chunk series (diagnostics, reporting).
    pub analysis_chunks: BTreeMap<String, Vec<ChunkResult>>,
    /// `"{source}_{track_id}"` -> measured PAL drift rate (ms/s).
    pub pal_drift_flags: BTreeMap<String, f64>,
    /// `"{source}_{track_id}"` -> measured linear drift rate (ms/s).
    pub linear_drift_flags: BTreeMap<String, f64>,
    /// `"{source}_{track_id}"` -> stepping flag.
    pub segment_flags: BTreeMap<String, SteppingFlag>,

    // Extraction outputs.
    pub items: Vec<PlanItem>,
    /// Reference video dimensions for subtitle rescale.
    pub reference_resolution: Option<(u32, u32)>,

    // Correction outputs.
    pub stepping_edls: BTreeMap<String, Vec<AudioSegment>>,

    // Subtitle outputs.
    pub clamp_reports: BTreeMap<String, ClampReport>,

    // Chapter / attachment outputs.
    pub chapters_xml: Option<PathBuf>,
    pub attachments: Vec<PathBuf>,

    // Mux outputs.
    pub tokens: Vec<String>,
    pub output_path: Option<PathBuf>,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Whether a step's work remains before mux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Skipped(String),
}
