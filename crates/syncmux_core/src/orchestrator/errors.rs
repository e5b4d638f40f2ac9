//! Pipeline error types. Context chains Job -> Step -> Operation.

use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::chapters::ChapterError;
use crate::correction::CorrectionError;
use crate::extraction::ExtractionError;
use crate::io::RunnerError;
use crate::subtitles::SubtitleError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Job '{job_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        job_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// Missing Source 1, invalid settings, unusable configuration. Fatal at
    /// job start.
    #[error("Job '{job_name}' failed validation: {message}")]
    ValidationFailed { job_name: String, message: String },

    #[error("Job '{job_name}' setup failed: {message}")]
    SetupFailed { job_name: String, message: String },

    /// Cooperative cancellation; a non-error Failed outcome that preserves
    /// temp artifacts.
    #[error("Job '{job_name}' was cancelled")]
    Cancelled { job_name: String },
}

impl PipelineError {
    pub fn step_failed(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            job_name: job_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    pub fn validation_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::StepFailed { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Correction(#[from] CorrectionError),

    #[error(transparent)]
    Subtitle(#[from] SubtitleError),

    #[error(transparent)]
    Chapters(#[from] ChapterError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            StepError::Runner(RunnerError::Cancelled)
                | StepError::Analysis(AnalysisError::Runner(RunnerError::Cancelled))
                | StepError::Extraction(ExtractionError::Runner(RunnerError::Cancelled))
                | StepError::Correction(CorrectionError::Runner(RunnerError::Cancelled))
        )
    }
}

pub type StepResult<T> = Result<T, StepError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
