//! Chapter step: extract, snap, shift, normalize the reference's chapters.

use crate::chapters::process_chapters;
use crate::orchestrator::context::{JobContext, JobState, StepOutcome};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;

pub struct ChaptersStep;

impl ChaptersStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChaptersStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ChaptersStep {
    fn name(&self) -> &str {
        "Chapters"
    }

    fn validate_input(&self, ctx: &JobContext, _state: &JobState) -> StepResult<()> {
        if ctx.reference_path().is_none() {
            return Err(StepError::invalid_input("job is missing Source 1"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &JobContext, state: &mut JobState) -> StepResult<StepOutcome> {
        let reference = ctx.reference_path().expect("validated");
        let chapters_xml = process_chapters(
            reference,
            &ctx.temp_dir,
            &ctx.settings.chapters,
            state.delays.global_shift_ms,
            &ctx.runner,
        )?;

        match chapters_xml {
            Some(path) => {
                state.chapters_xml = Some(path);
                Ok(StepOutcome::Success)
            }
            None => Ok(StepOutcome::Skipped(
                "reference has no chapters".to_string(),
            )),
        }
    }

    fn validate_output(&self, _ctx: &JobContext, state: &JobState) -> StepResult<()> {
        if let Some(path) = &state.chapters_xml {
            if !path.exists() {
                return Err(StepError::invalid_output(format!(
                    "chapter XML missing on disk: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}
