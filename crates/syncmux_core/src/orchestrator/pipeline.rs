//! Pipeline runner.

use super::context::{JobContext, JobState, StepOutcome};
use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;

/// Runs a sequence of steps with validation around each and cooperative
/// cancellation at step boundaries.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Execute the steps in order. Any failure short-circuits; the caller
    /// decides what to do with the temp directory.
    pub fn run(&self, ctx: &JobContext, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let logger = ctx.logger().clone();
        let mut result = PipelineRunResult::default();

        for step in &self.steps {
            if logger.cancel_requested() {
                logger.warn(&format!("Pipeline cancelled before step '{}'", step.name()));
                return Err(PipelineError::Cancelled {
                    job_name: ctx.job_name.clone(),
                });
            }

            let step_name = step.name().to_string();
            logger.phase(&step_name);

            if let Err(e) = step.validate_input(ctx, state) {
                logger.error(&format!("Input validation failed: {}", e));
                return Err(PipelineError::step_failed(&ctx.job_name, &step_name, e));
            }

            let outcome = step.execute(ctx, state).map_err(|e| {
                logger.error(&format!("Execution failed: {}", e));
                if e.is_cancellation() {
                    PipelineError::Cancelled {
                        job_name: ctx.job_name.clone(),
                    }
                } else {
                    PipelineError::step_failed(&ctx.job_name, &step_name, e)
                }
            })?;

            match outcome {
                StepOutcome::Success => {
                    if let Err(e) = step.validate_output(ctx, state) {
                        logger.error(&format!("Output validation failed: {}", e));
                        return Err(PipelineError::step_failed(&ctx.job_name, &step_name, e));
                    }
                    logger.success(&format!("{} completed", step_name));
                    result.steps_completed.push(step_name);
                }
                StepOutcome::Skipped(reason) => {
                    logger.message(&format!("{} skipped: {}", step_name, reason));
                    result.steps_skipped.push(step_name);
                }
            }
        }

        logger.success("Pipeline completed successfully");
        Ok(result)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Which steps ran and which were skipped.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::io::{CommandRunner, ToolPaths};
    use crate::logging::{JobLogger, LogConfig, LogSink};
    use crate::models::JobSpec;
    use crate::orchestrator::errors::{StepError, StepResult};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingStep {
        name: &'static str,
        runs: Arc<AtomicUsize>,
        fail: bool,
        skip: bool,
    }

    impl PipelineStep for RecordingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn validate_input(&self, _ctx: &JobContext, _state: &JobState) -> StepResult<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &JobContext, _state: &mut JobState) -> StepResult<StepOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(StepError::Other("boom".to_string()))
            } else if self.skip {
                Ok(StepOutcome::Skipped("nothing to do".to_string()))
            } else {
                Ok(StepOutcome::Success)
            }
        }
    }

    struct CancellingSink {
        cancelled: AtomicBool,
    }

    impl LogSink for CancellingSink {
        fn emit(&self, _line: &str) {}
        fn cancel_requested(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

    fn test_ctx(sink: Option<crate::logging::SharedSink>) -> JobContext {
        let logger = Arc::new(JobLogger::sink_only("pipe", LogConfig::default(), sink));
        JobContext {
            spec: JobSpec::default(),
            settings: Settings::default(),
            job_name: "pipe".to_string(),
            temp_dir: std::env::temp_dir(),
            output_dir: std::env::temp_dir(),
            runner: CommandRunner::new(logger, ToolPaths::bare()),
        }
    }

    fn step(name: &'static str, runs: &Arc<AtomicUsize>) -> RecordingStep {
        RecordingStep {
            name,
            runs: Arc::clone(runs),
            fail: false,
            skip: false,
        }
    }

    #[test]
    fn steps_run_in_order_and_record_outcomes() {
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(step("One", &runs))
            .with_step(RecordingStep {
                name: "Two",
                runs: Arc::clone(&runs),
                fail: false,
                skip: true,
            });
        let ctx = test_ctx(None);
        let mut state = JobState::new();
        let result = pipeline.run(&ctx, &mut state).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(result.steps_completed, vec!["One"]);
        assert_eq!(result.steps_skipped, vec!["Two"]);
    }

    #[test]
    fn failure_short_circuits() {
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(RecordingStep {
                name: "Boom",
                runs: Arc::clone(&runs),
                fail: true,
                skip: false,
            })
            .with_step(step("Never", &runs));
        let ctx = test_ctx(None);
        let mut state = JobState::new();
        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        assert!(err.to_string().contains("Boom"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_stops_before_next_step() {
        let sink = Arc::new(CancellingSink {
            cancelled: AtomicBool::new(true),
        });
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new().with_step(step("One", &runs));
        let ctx = test_ctx(Some(sink));
        let mut state = JobState::new();
        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
