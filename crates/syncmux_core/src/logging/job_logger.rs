//! Per-job logger with file and sink output.
//!
//! Each job gets its own logger that writes to a dedicated log file, forwards
//! lines to the embedding sink, filters child-process progress in compact
//! mode, and keeps a tail buffer for error diagnosis.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, SharedSink};

const TAIL_CAPACITY: usize = 200;

pub struct JobLogger {
    job_name: String,
    log_path: PathBuf,
    file_writer: Mutex<Option<BufWriter<File>>>,
    sink: Option<SharedSink>,
    config: LogConfig,
    tail_buffer: Mutex<VecDeque<String>>,
    last_progress: Mutex<Option<u32>>,
}

impl JobLogger {
    /// Create a logger writing to `{log_dir}/{job_name}.log`.
    pub fn new(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        sink: Option<SharedSink>,
    ) -> std::io::Result<Self> {
        let job_name = job_name.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_name)));
        let file = File::create(&log_path)?;

        Ok(Self {
            job_name,
            log_path,
            file_writer: Mutex::new(Some(BufWriter::new(file))),
            sink,
            config,
            tail_buffer: Mutex::new(VecDeque::with_capacity(TAIL_CAPACITY)),
            last_progress: Mutex::new(None),
        })
    }

    /// Logger without a backing file; lines go to the sink only.
    pub fn sink_only(job_name: impl Into<String>, config: LogConfig, sink: Option<SharedSink>) -> Self {
        Self {
            job_name: job_name.into(),
            log_path: PathBuf::new(),
            file_writer: Mutex::new(None),
            sink,
            config,
            tail_buffer: Mutex::new(VecDeque::with_capacity(TAIL_CAPACITY)),
            last_progress: Mutex::new(None),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Log a timestamped message.
    pub fn message(&self, message: &str) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        self.output(&line);
    }

    pub fn warn(&self, message: &str) {
        self.message(&format!("[WARN] {}", message));
    }

    pub fn error(&self, message: &str) {
        self.message(&format!("[ERROR] {}", message));
    }

    pub fn success(&self, message: &str) {
        self.message(&format!("[SUCCESS] {}", message));
    }

    /// Log a stage boundary.
    pub fn phase(&self, name: &str) {
        self.message(&format!("--- {} ---", name));
    }

    /// Log a command line about to run.
    pub fn command(&self, pretty_cmd: &str) {
        self.message(&format!("$ {}", pretty_cmd));
    }

    /// Log a child-process progress percent, filtered to step intervals in
    /// compact mode. Returns whether the line was emitted.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);
            if let Some(prev) = *last {
                if percent < 100 && percent < prev.saturating_add(step) {
                    return false;
                }
            }
            *last = Some(percent);
        }
        self.message(&format!("Progress: {}%", percent));
        true
    }

    /// Record a line of child output in the tail buffer without emitting it.
    pub fn buffer_tail(&self, line: &str) {
        let mut tail = self.tail_buffer.lock();
        if tail.len() == TAIL_CAPACITY {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }

    /// Last `n` buffered child-output lines.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let tail = self.tail_buffer.lock();
        tail.iter().rev().take(n).rev().cloned().collect()
    }

    /// Forget buffered child output (called per command).
    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    /// Whether the embedding sink asked the job to stop.
    pub fn cancel_requested(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| s.cancel_requested())
    }

    fn output(&self, line: &str) {
        if let Some(writer) = self.file_writer.lock().as_mut() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
        if let Some(sink) = &self.sink {
            sink.emit(line);
        }
        tracing::debug!(target: "syncmux::job", "{}", line);
    }
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
