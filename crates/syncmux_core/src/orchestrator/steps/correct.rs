//! Correction step: dispatch PAL, linear drift, and stepping correctors.

use crate::correction::{run_linear_correction, run_pal_correction, run_stepping_correction};
use crate::orchestrator::context::{JobContext, JobState, StepOutcome};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;

pub struct CorrectStep;

impl CorrectStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CorrectStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for CorrectStep {
    fn name(&self) -> &str {
        "Correct"
    }

    fn validate_input(&self, _ctx: &JobContext, state: &JobState) -> StepResult<()> {
        let any_flags = !state.pal_drift_flags.is_empty()
            || !state.linear_drift_flags.is_empty()
            || !state.segment_flags.is_empty();
        if any_flags && state.items.is_empty() {
            return Err(StepError::invalid_input(
                "correction flagged but no tracks were extracted",
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &JobContext, state: &mut JobState) -> StepResult<StepOutcome> {
        if state.pal_drift_flags.is_empty()
            && state.linear_drift_flags.is_empty()
            && state.segment_flags.is_empty()
        {
            return Ok(StepOutcome::Skipped(
                "no timing pathology was diagnosed".to_string(),
            ));
        }

        run_pal_correction(
            &mut state.items,
            &state.pal_drift_flags,
            &ctx.settings.segment,
            &ctx.runner,
        )?;

        run_linear_correction(
            &mut state.items,
            &state.linear_drift_flags,
            &ctx.settings.segment,
            &ctx.runner,
        )?;

        state.stepping_edls = run_stepping_correction(
            &mut state.items,
            &state.segment_flags,
            &ctx.spec.sources,
            &ctx.temp_dir,
            &ctx.settings,
            &ctx.runner,
        )?;

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &JobContext, state: &JobState) -> StepResult<()> {
        // Preserved pairing: every corrected item has exactly one preserved
        // sibling with the same (source, id).
        for item in state.items.iter().filter(|i| i.is_corrected) {
            let siblings = state
                .items
                .iter()
                .filter(|other| {
                    other.is_preserved
                        && other.track.source == item.track.source
                        && other.track.id == item.track.id
                })
                .count();
            if siblings != 1 {
                return Err(StepError::invalid_output(format!(
                    "corrected track {} has {} preserved siblings (expected 1)",
                    item.track.flag_key(),
                    siblings
                )));
            }
        }
        // And the EDL invariant for every stored stepping EDL.
        for (source, edl) in &state.stepping_edls {
            if !crate::correction::edl_is_well_formed(edl) {
                return Err(StepError::invalid_output(format!(
                    "stepping EDL for {} violates ordering invariants",
                    source
                )));
            }
        }
        Ok(())
    }
}
