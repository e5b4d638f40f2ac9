//! Job orchestration.
//!
//! A job runs a strict happens-before chain:
//! Analyze -> Extract -> Correct -> Subtitles -> Chapters -> Attachments ->
//! Mux. Data flows forward through `JobState`; errors short-circuit and
//! leave the job's temp directory in place for post-mortem.

mod context;
mod errors;
mod pipeline;
mod step;
pub mod steps;

pub use context::{JobContext, JobState, StepOutcome};
pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{
    AnalyzeStep, AttachmentsStep, ChaptersStep, CorrectStep, ExtractStep, MuxStep, SubtitlesStep,
};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::io::{CommandRunner, ToolPaths};
use crate::logging::{JobLogger, LogConfig, SharedSink};
use crate::models::{JobResult, JobSpec};

/// The full merge pipeline in stage order.
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(AnalyzeStep::new())
        .with_step(ExtractStep::new())
        .with_step(CorrectStep::new())
        .with_step(SubtitlesStep::new())
        .with_step(ChaptersStep::new())
        .with_step(AttachmentsStep::new())
        .with_step(MuxStep::new())
}

/// Analysis only: probe, correlate, diagnose, report delays.
pub fn create_analysis_pipeline() -> Pipeline {
    Pipeline::new().with_step(AnalyzeStep::new())
}

/// Run one job to completion.
///
/// The job's temp directory is removed on success and preserved on failure
/// (including cancellation) for inspection.
pub fn run_job(
    spec: JobSpec,
    settings: &Settings,
    tools: &ToolPaths,
    sink: Option<SharedSink>,
) -> JobResult {
    let job_name = spec
        .reference_path()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string());

    // Configuration errors are fatal at job start.
    if spec.reference_path().is_none() {
        return JobResult::failed(job_name, "job is missing Source 1");
    }
    for tool in ["mkvmerge", "mkvextract", "ffmpeg", "ffprobe"] {
        if let Err(e) = tools.require(tool) {
            return JobResult::failed(job_name, e.to_string());
        }
    }

    let temp_dir = job_temp_dir(settings, &job_name);
    if let Err(e) = std::fs::create_dir_all(&temp_dir) {
        return JobResult::failed(job_name, format!("could not create temp dir: {}", e));
    }

    let log_config = LogConfig::from(&settings.logging);
    let logger = match JobLogger::new(&job_name, &settings.paths.logs_folder, log_config, sink.clone())
    {
        Ok(logger) => Arc::new(logger),
        Err(_) => Arc::new(JobLogger::sink_only(
            &job_name,
            LogConfig::from(&settings.logging),
            sink,
        )),
    };

    let ctx = JobContext {
        spec,
        settings: settings.clone(),
        job_name: job_name.clone(),
        temp_dir: temp_dir.clone(),
        output_dir: PathBuf::from(&settings.paths.output_folder),
        runner: CommandRunner::new(logger, tools.clone()),
    };
    let mut state = JobState::new();

    let pipeline = if ctx.spec.merge {
        create_standard_pipeline()
    } else {
        create_analysis_pipeline()
    };

    match pipeline.run(&ctx, &mut state) {
        Ok(_) => {
            let result = if ctx.spec.merge {
                match state.output_path {
                    Some(output) => JobResult::merged(&job_name, output, &state.delays),
                    None => JobResult::failed(&job_name, "pipeline finished without an output"),
                }
            } else {
                JobResult::analyzed(&job_name, &state.delays)
            };
            let _ = std::fs::remove_dir_all(&temp_dir);
            result
        }
        Err(e) => {
            ctx.logger().error(&format!(
                "Job failed; temp artifacts preserved at {}",
                temp_dir.display()
            ));
            JobResult::failed(&job_name, e.to_string())
        }
    }
}

/// Run a batch of jobs sequentially, one result per job.
pub fn run_batch(
    jobs: Vec<JobSpec>,
    settings: &Settings,
    sink: Option<SharedSink>,
) -> Vec<JobResult> {
    let tools = ToolPaths::resolve(&BTreeMap::new());
    jobs.into_iter()
        .map(|spec| run_job(spec, settings, &tools, sink.clone()))
        .collect()
}

fn job_temp_dir(settings: &Settings, job_name: &str) -> PathBuf {
    let ts = chrono::Local::now().timestamp();
    PathBuf::from(&settings.paths.temp_root).join(format!("orch_{}_{}", job_name, ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStatus, REFERENCE_SOURCE};

    #[test]
    fn missing_reference_fails_at_job_start() {
        let settings = Settings::default();
        let tools = ToolPaths::bare();
        let spec = JobSpec::default();
        let result = run_job(spec, &settings, &tools, None);
        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.error.unwrap().contains("Source 1"));
    }

    #[test]
    fn missing_tools_fail_at_job_start() {
        let settings = Settings::default();
        let tools = ToolPaths::default(); // nothing resolved
        let mut spec = JobSpec::default();
        spec.sources
            .insert(REFERENCE_SOURCE.to_string(), "/nonexistent.mkv".into());
        let result = run_job(spec, &settings, &tools, None);
        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.error.unwrap().contains("was not found"));
    }

    #[test]
    fn standard_pipeline_has_stage_order() {
        let pipeline = create_standard_pipeline();
        assert_eq!(
            pipeline.step_names(),
            vec![
                "Analyze",
                "Extract",
                "Correct",
                "Subtitles",
                "Chapters",
                "Attachments",
                "Mux"
            ]
        );
    }
}
