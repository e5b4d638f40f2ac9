//! Font attachment extraction.

use std::path::{Path, PathBuf};

use super::probe::probe_file;
use super::types::ExtractionResult;
use crate::io::{argv, CommandRunner};

/// MIME prefixes interpreted as fonts.
const FONT_MIME_PREFIXES: [&str; 3] = ["font/", "application/font-", "application/x-font"];

/// Whether a MIME type denotes a font attachment.
pub fn is_font_mime(content_type: &str) -> bool {
    let lower = content_type.to_lowercase();
    FONT_MIME_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Extract every font attachment from one source container.
///
/// Non-font attachments are ignored; a source with no fonts yields an empty
/// list, not an error.
pub fn extract_font_attachments(
    container: &Path,
    temp_dir: &Path,
    runner: &CommandRunner,
    role: &str,
) -> ExtractionResult<Vec<PathBuf>> {
    let probe = probe_file(container, runner)?;
    let total = probe.attachments.len();
    let safe_role = role.replace(' ', "_");

    let mut specs = Vec::new();
    let mut files = Vec::new();
    for attachment in &probe.attachments {
        if !is_font_mime(&attachment.content_type) {
            continue;
        }
        let out_path = temp_dir.join(format!(
            "{}_att_{}_{}",
            safe_role, attachment.id, attachment.file_name
        ));
        specs.push(format!("{}:{}", attachment.id, out_path.display()));
        files.push(out_path);
    }

    if specs.is_empty() {
        runner.logger().message(&format!(
            "[Attachments] Found {} attachments, but none were identified as fonts.",
            total
        ));
        return Ok(Vec::new());
    }

    runner.logger().message(&format!(
        "[Attachments] Found {} attachments, extracting {} font file(s)...",
        total,
        specs.len()
    ));
    let mut cmd = argv([
        "mkvextract".to_string(),
        container.to_string_lossy().into_owned(),
        "attachments".to_string(),
    ]);
    cmd.extend(specs);
    runner.run(&cmd)?;

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_observed_font_mime_prefixes() {
        assert!(is_font_mime("font/ttf"));
        assert!(is_font_mime("font/otf"));
        assert!(is_font_mime("application/font-sfnt"));
        assert!(is_font_mime("application/x-font-ttf"));
        assert!(is_font_mime("Application/X-Font-OTF"));
    }

    #[test]
    fn rejects_non_font_mime_types() {
        assert!(!is_font_mime("image/png"));
        assert!(!is_font_mime("application/octet-stream"));
        assert!(!is_font_mime("text/plain"));
    }
}
