//! External tool discovery.
//!
//! Tool paths are resolved once per process (PATH probe plus user overrides)
//! and passed immutably through the job context.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Tools the core may invoke.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe", "mkvmerge", "mkvextract", "videodiff"];

#[derive(Debug, Error)]
#[error("required tool '{0}' was not found on PATH and no override was supplied")]
pub struct ToolMissing(pub String);

/// Immutable tool-name to binary-path table.
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
    paths: BTreeMap<String, PathBuf>,
}

impl ToolPaths {
    /// Probe PATH for the known tools, letting `overrides` win.
    pub fn resolve(overrides: &BTreeMap<String, PathBuf>) -> Self {
        let mut paths = BTreeMap::new();
        for &tool in KNOWN_TOOLS {
            if let Some(over) = overrides.get(tool) {
                paths.insert(tool.to_string(), over.clone());
            } else if let Some(found) = find_on_path(tool) {
                paths.insert(tool.to_string(), found);
            }
        }
        for (tool, path) in overrides {
            paths.entry(tool.clone()).or_insert_with(|| path.clone());
        }
        Self { paths }
    }

    /// Table that trusts the shell to resolve names (tests, simple setups).
    pub fn bare() -> Self {
        let mut paths = BTreeMap::new();
        for &tool in KNOWN_TOOLS {
            paths.insert(tool.to_string(), PathBuf::from(tool));
        }
        Self { paths }
    }

    pub fn get(&self, tool: &str) -> Option<&Path> {
        self.paths.get(tool).map(PathBuf::as_path)
    }

    pub fn require(&self, tool: &str) -> Result<&Path, ToolMissing> {
        self.get(tool).ok_or_else(|| ToolMissing(tool.to_string()))
    }

    /// Resolve a command's first element to its configured binary.
    pub fn binary_for(&self, tool: &str) -> PathBuf {
        self.get(tool)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(tool))
    }

    pub fn insert(&mut self, tool: impl Into<String>, path: impl Into<PathBuf>) {
        self.paths.insert(tool.into(), path.into());
    }
}

fn find_on_path(tool: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(tool);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{}.exe", tool));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_path_probe() {
        let mut overrides = BTreeMap::new();
        overrides.insert("ffmpeg".to_string(), PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        let tools = ToolPaths::resolve(&overrides);
        assert_eq!(
            tools.get("ffmpeg"),
            Some(Path::new("/opt/ffmpeg/bin/ffmpeg"))
        );
    }

    #[test]
    fn unknown_override_is_kept() {
        let mut overrides = BTreeMap::new();
        overrides.insert("sox".to_string(), PathBuf::from("/usr/bin/sox"));
        let tools = ToolPaths::resolve(&overrides);
        assert_eq!(tools.get("sox"), Some(Path::new("/usr/bin/sox")));
    }

    #[test]
    fn require_reports_missing_tool() {
        let tools = ToolPaths::default();
        let err = tools.require("mkvmerge").unwrap_err();
        assert!(err.to_string().contains("mkvmerge"));
    }

    #[test]
    fn binary_for_falls_back_to_name() {
        let tools = ToolPaths::default();
        assert_eq!(tools.binary_for("ffprobe"), PathBuf::from("ffprobe"));
    }
}
