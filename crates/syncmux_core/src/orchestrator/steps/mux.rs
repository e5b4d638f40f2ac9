//! Mux step: build the token stream, write the response file, invoke the
//! muxer.

use crate::io::argv;
use crate::mux::{build_tokens, write_options_file, MuxPlan};
use crate::orchestrator::context::{JobContext, JobState, StepOutcome};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;

pub struct MuxStep;

impl MuxStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MuxStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for MuxStep {
    fn name(&self) -> &str {
        "Mux"
    }

    fn validate_input(&self, _ctx: &JobContext, state: &JobState) -> StepResult<()> {
        if state.items.is_empty() {
            return Err(StepError::invalid_input("no tracks to mux"));
        }
        for item in &state.items {
            if item.extracted_path.is_none() {
                return Err(StepError::invalid_input(format!(
                    "plan item {} has no payload path",
                    item.track.flag_key()
                )));
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &JobContext, state: &mut JobState) -> StepResult<StepOutcome> {
        let logger = ctx.logger().clone();
        let reference = ctx
            .reference_path()
            .ok_or_else(|| StepError::invalid_input("job is missing Source 1"))?;
        let stem = reference
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| ctx.job_name.clone());

        std::fs::create_dir_all(&ctx.output_dir)
            .map_err(|e| StepError::io("creating output directory", e))?;
        let output_path = ctx.output_dir.join(format!("{}.mkv", stem));

        let plan = MuxPlan {
            items: &state.items,
            delays: &state.delays,
            chapters_xml: state.chapters_xml.as_deref(),
            attachments: &state.attachments,
            output_path: &output_path,
        };
        let tokens = build_tokens(&plan, &ctx.settings);

        let options_path = ctx.temp_dir.join("mkvmerge_options.txt");
        write_options_file(&tokens, &options_path)
            .map_err(|e| StepError::io("writing muxer options file", e))?;
        logger.message(&format!(
            "[Mux] Wrote {} tokens to {}",
            tokens.len(),
            options_path.display()
        ));

        ctx.runner.run(&argv([
            "mkvmerge".to_string(),
            format!("@{}", options_path.display()),
        ]))?;

        logger.success(&format!("Merged output: {}", output_path.display()));
        state.tokens = tokens;
        state.output_path = Some(output_path);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &JobContext, state: &JobState) -> StepResult<()> {
        let Some(output) = &state.output_path else {
            return Err(StepError::invalid_output("mux recorded no output path"));
        };
        if !output.exists() {
            return Err(StepError::invalid_output(format!(
                "muxer reported success but {} does not exist",
                output.display()
            )));
        }
        Ok(())
    }
}
