//! Log sink trait and configuration.

use std::sync::Arc;

/// Destination for job log lines, supplied by the embedding application.
///
/// The sink doubles as the cooperative cancellation channel: the runner polls
/// `cancel_requested` after each external process and between scan
/// iterations.
pub trait LogSink: Send + Sync {
    /// Receive one formatted log line.
    fn emit(&self, line: &str);

    /// Whether the job should stop at the next safe point.
    fn cancel_requested(&self) -> bool {
        false
    }
}

/// Shared handle to a log sink.
pub type SharedSink = Arc<dyn LogSink>;

/// Sink that swallows output. Useful for tests.
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _line: &str) {}
}

/// Formatting configuration for a job logger.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter child progress lines to step intervals.
    pub compact: bool,
    /// Lines of child output kept for error reporting.
    pub error_tail: usize,
    /// Lines of child output echoed on success.
    pub tail_lines: usize,
    /// Progress granularity in percent.
    pub progress_step: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: 20,
            tail_lines: 0,
            progress_step: 20,
        }
    }
}

impl From<&crate::config::LoggingSettings> for LogConfig {
    fn from(s: &crate::config::LoggingSettings) -> Self {
        Self {
            compact: s.compact,
            error_tail: s.error_tail as usize,
            tail_lines: s.tail_lines as usize,
            progress_step: s.progress_step.max(1),
        }
    }
}
