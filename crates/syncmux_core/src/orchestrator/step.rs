//! Pipeline step trait.

use super::context::{JobContext, JobState, StepOutcome};
use super::errors::StepResult;

/// One stage of the job pipeline.
///
/// The runner calls `validate_input`, `execute`, then `validate_output`
/// (when execute succeeded), in that order.
pub trait PipelineStep: Send + Sync {
    fn name(&self) -> &str;

    /// Check preconditions (files exist, earlier stages ran).
    fn validate_input(&self, ctx: &JobContext, state: &JobState) -> StepResult<()>;

    /// Do the work and record results in `state`.
    fn execute(&self, ctx: &JobContext, state: &mut JobState) -> StepResult<StepOutcome>;

    /// Check the step produced what later stages expect.
    fn validate_output(&self, _ctx: &JobContext, _state: &JobState) -> StepResult<()> {
        Ok(())
    }
}
