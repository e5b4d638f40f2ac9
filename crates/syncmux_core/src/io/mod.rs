//! Subprocess plumbing: tool discovery and command execution.

mod runner;
mod tools;

pub use runner::{argv, CommandRunner, RunnerError, RunnerResult};
pub use tools::{ToolMissing, ToolPaths, KNOWN_TOOLS};
