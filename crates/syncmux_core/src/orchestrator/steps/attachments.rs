//! Attachment step: pull font attachments from the designated source.

use super::analyze::is_subtitle_file;
use crate::extraction::extract_font_attachments;
use crate::orchestrator::context::{JobContext, JobState, StepOutcome};
use crate::orchestrator::errors::StepResult;
use crate::orchestrator::step::PipelineStep;

pub struct AttachmentsStep;

impl AttachmentsStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AttachmentsStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for AttachmentsStep {
    fn name(&self) -> &str {
        "Attachments"
    }

    fn validate_input(&self, _ctx: &JobContext, _state: &JobState) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &JobContext, state: &mut JobState) -> StepResult<StepOutcome> {
        let Some(source_key) = ctx.spec.effective_attachment_source().map(str::to_string) else {
            return Ok(StepOutcome::Skipped("no attachment source".to_string()));
        };
        let Some(container) = ctx.spec.sources.get(&source_key) else {
            return Ok(StepOutcome::Skipped(format!(
                "attachment source '{}' not among sources",
                source_key
            )));
        };
        if is_subtitle_file(container) {
            return Ok(StepOutcome::Skipped(
                "attachment source is a loose subtitle file".to_string(),
            ));
        }

        // An empty result is fine: a source without font attachments simply
        // contributes none.
        state.attachments =
            extract_font_attachments(container, &ctx.temp_dir, &ctx.runner, &source_key)?;
        Ok(StepOutcome::Success)
    }
}
