//! Per-job logging with pluggable sinks.

mod job_logger;
mod types;

pub use job_logger::JobLogger;
pub use types::{LogConfig, LogSink, NullSink, SharedSink};
