//! External process execution.
//!
//! Every child invocation in the pipeline goes through [`CommandRunner`]:
//! argv is logged, stdout/stderr are captured, progress lines are parsed in
//! compact mode, and cooperative cancellation is checked once the child has
//! exited (in-flight children are allowed to finish; their output is
//! discarded on cancel).

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;

use thiserror::Error;

use super::tools::ToolPaths;
use crate::logging::JobLogger;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{tool}' failed with exit code {exit_code}")]
    Failed { tool: String, exit_code: i32 },

    #[error("i/o error talking to '{tool}': {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("job was cancelled")]
    Cancelled,
}

pub type RunnerResult<T> = Result<T, RunnerError>;

/// Executes external commands for one job.
pub struct CommandRunner {
    logger: Arc<JobLogger>,
    tools: ToolPaths,
}

impl CommandRunner {
    pub fn new(logger: Arc<JobLogger>, tools: ToolPaths) -> Self {
        Self { logger, tools }
    }

    pub fn logger(&self) -> &Arc<JobLogger> {
        &self.logger
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// Run a command, capturing merged stdout/stderr as text.
    ///
    /// `cmd[0]` is a tool name resolved through the tool table. Progress
    /// lines (`Progress: NN%`) are filtered to step intervals; other output
    /// lands in the logger's tail buffer and is echoed on failure.
    pub fn run(&self, cmd: &[String]) -> RunnerResult<String> {
        let tool = cmd.first().cloned().unwrap_or_default();
        let binary = self.tools.binary_for(&tool);

        self.logger.clear_tail();
        self.logger.command(&pretty_command(&binary, &cmd[1..]));

        let output = Command::new(&binary)
            .args(&cmd[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| RunnerError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        self.consume_text_output(&text);

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            self.report_failure(&tool, exit_code);
            return Err(RunnerError::Failed { tool, exit_code });
        }

        self.check_cancel()?;
        Ok(text)
    }

    /// Run a command with binary stdout (and optional binary stdin).
    ///
    /// stderr is captured as text for the tail buffer. Used for PCM decode
    /// (stdout) and FLAC encode (stdin).
    pub fn run_binary(&self, cmd: &[String], input: Option<&[u8]>) -> RunnerResult<Vec<u8>> {
        let tool = cmd.first().cloned().unwrap_or_default();
        let binary = self.tools.binary_for(&tool);

        self.logger.clear_tail();
        self.logger.command(&pretty_command(&binary, &cmd[1..]));

        let mut child = Command::new(&binary)
            .args(&cmd[1..])
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        // Feed stdin from a thread so large payloads cannot deadlock against
        // an unread stdout pipe.
        let writer = input.map(|data| {
            let mut stdin = child.stdin.take().expect("stdin was piped");
            let data = data.to_vec();
            std::thread::spawn(move || {
                let _ = stdin.write_all(&data);
            })
        });

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let mut stdout_bytes = Vec::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout
                .read_to_end(&mut stdout_bytes)
                .map_err(|source| RunnerError::Io {
                    tool: tool.clone(),
                    source,
                })?;
        }

        if let Some(handle) = writer {
            let _ = handle.join();
        }
        let stderr_text = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        for line in stderr_text.lines() {
            self.logger.buffer_tail(line);
        }

        let status = child.wait().map_err(|source| RunnerError::Io {
            tool: tool.clone(),
            source,
        })?;

        if !status.success() {
            let exit_code = status.code().unwrap_or(-1);
            self.report_failure(&tool, exit_code);
            return Err(RunnerError::Failed { tool, exit_code });
        }

        self.check_cancel()?;
        Ok(stdout_bytes)
    }

    /// Raise `Cancelled` when the sink asked the job to stop.
    pub fn check_cancel(&self) -> RunnerResult<()> {
        if self.logger.cancel_requested() {
            Err(RunnerError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn consume_text_output(&self, text: &str) {
        let compact = self.logger.config().compact;
        for line in text.lines() {
            if compact {
                if let Some(pct) = parse_progress_line(line) {
                    self.logger.progress(pct);
                    continue;
                }
                self.logger.buffer_tail(line);
            } else {
                self.logger.message(line);
            }
        }
    }

    fn report_failure(&self, tool: &str, exit_code: i32) {
        self.logger
            .error(&format!("'{}' failed with exit code {}", tool, exit_code));
        let tail = self.logger.tail(self.logger.config().error_tail);
        if !tail.is_empty() {
            self.logger.message(&format!("[stderr/tail]\n{}", tail.join("\n")));
        }
    }
}

/// Parse a `Progress: NN%` line as emitted by mkvmerge/mkvextract.
fn parse_progress_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("Progress: ")?;
    rest.trim().trim_end_matches('%').parse().ok()
}

fn pretty_command(binary: &std::path::Path, args: &[String]) -> String {
    let mut parts = vec![shell_quote(&binary.to_string_lossy())];
    parts.extend(args.iter().map(|a| shell_quote(a)));
    parts.join(" ")
}

fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(|c| c.is_ascii_alphanumeric() || "-_./:=+%@,".contains(c)) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

/// Build an argv vector from string-ish parts.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{JobLogger, LogConfig};

    fn runner() -> CommandRunner {
        let logger = Arc::new(JobLogger::sink_only("test", LogConfig::default(), None));
        CommandRunner::new(logger, ToolPaths::bare())
    }

    #[test]
    fn progress_lines_parse() {
        assert_eq!(parse_progress_line("Progress: 42%"), Some(42));
        assert_eq!(parse_progress_line("Progress: 100%"), Some(100));
        assert_eq!(parse_progress_line("progress: 10%"), None);
        assert_eq!(parse_progress_line("something else"), None);
    }

    #[test]
    fn shell_quote_handles_spaces() {
        assert_eq!(shell_quote("plain"), "plain");
        assert_eq!(shell_quote("with space"), "'with space'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    #[cfg(unix)]
    fn runs_text_command() {
        let runner = runner();
        let out = runner.run(&argv(["sh", "-c", "echo hello"])).unwrap();
        assert!(out.contains("hello"));
    }

    #[test]
    #[cfg(unix)]
    fn failure_returns_exit_code() {
        let runner = runner();
        let err = runner.run(&argv(["sh", "-c", "exit 3"])).unwrap_err();
        match err {
            RunnerError::Failed { exit_code, .. } => assert_eq!(exit_code, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn binary_stdin_round_trips() {
        let runner = runner();
        let data = vec![0u8, 1, 2, 250, 251, 252];
        let out = runner.run_binary(&argv(["cat"]), Some(&data)).unwrap();
        assert_eq!(out, data);
    }
}
