//! Subtitle format parsers.

mod ass;
mod srt;

pub use ass::parse_ass;
pub use srt::parse_srt;

use std::path::Path;

use super::types::{SubtitleData, SubtitleError, SubtitleResult};

/// Load a subtitle file, dispatching on extension.
pub fn load_subtitle(path: &Path) -> SubtitleResult<SubtitleData> {
    let content = std::fs::read_to_string(path)?;
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("ass") | Some("ssa") => parse_ass(&content),
        Some("srt") => parse_srt(&content),
        other => Err(SubtitleError::Unsupported(format!(
            "extension {:?} of {}",
            other,
            path.display()
        ))),
    }
}
