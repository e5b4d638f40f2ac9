//! Subtitle writers: the single rounding point.
//!
//! Float millisecond event times hit the output format's resolution here
//! and nowhere else: centiseconds for ASS, milliseconds for SRT, mode per
//! the configured rounding. Negative times are written clamped to zero (the
//! caller reports them separately).

use std::path::Path;

use crate::models::SubtitleRounding;

use super::timestamps::{format_ass_timestamp, format_srt_timestamp};
use super::types::{SubtitleData, SubtitleResult};

/// Serialize to ASS text.
pub fn write_ass_string(data: &SubtitleData, rounding: SubtitleRounding) -> String {
    let mut out = String::new();

    out.push_str("[Script Info]\n");
    let mut has_script_type = false;
    for (key, value) in &data.metadata {
        if key.eq_ignore_ascii_case("scripttype") {
            has_script_type = true;
        }
        out.push_str(&format!("{}: {}\n", key, value));
    }
    if !has_script_type {
        out.push_str("ScriptType: v4.00+\n");
    }
    out.push('\n');

    out.push_str("[V4+ Styles]\n");
    if let Some(first) = data.styles.first() {
        let format_line: Vec<String> = first
            .format
            .iter()
            .map(|f| canonical_field_name(f))
            .collect();
        out.push_str(&format!("Format: {}\n", format_line.join(", ")));
        for style in &data.styles {
            out.push_str(&format!("Style: {}\n", style.values.join(",")));
        }
    }
    out.push('\n');

    out.push_str("[Events]\n");
    out.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
    for event in &data.events {
        let kind = if event.is_comment { "Comment" } else { "Dialogue" };
        out.push_str(&format!(
            "{}: {},{},{},{},{},{},{},{},{},{}\n",
            kind,
            if event.layer.is_empty() { "0" } else { &event.layer },
            format_ass_timestamp(event.start_ms, rounding),
            format_ass_timestamp(event.end_ms, rounding),
            event.style,
            event.name,
            default_zero(&event.margin_l),
            default_zero(&event.margin_r),
            default_zero(&event.margin_v),
            event.effect,
            event.text
        ));
    }

    out
}

/// Serialize to SRT text. Comment events are skipped (SRT has no comments).
pub fn write_srt_string(data: &SubtitleData, rounding: SubtitleRounding) -> String {
    let mut out = String::new();
    let mut index = 1;
    for event in &data.events {
        if event.is_comment {
            continue;
        }
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index,
            format_srt_timestamp(event.start_ms, rounding),
            format_srt_timestamp(event.end_ms, rounding),
            event.text.replace("\\N", "\n")
        ));
        index += 1;
    }
    out
}

/// Write the display format chosen by the output path's extension.
pub fn write_subtitle(
    data: &SubtitleData,
    path: &Path,
    rounding: SubtitleRounding,
) -> SubtitleResult<()> {
    let text = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("srt") => write_srt_string(data, rounding),
        _ => write_ass_string(data, rounding),
    };
    std::fs::write(path, text)?;
    Ok(())
}

/// JSON side-file with every field, for auditors and debugging.
pub fn write_json_sidecar(data: &SubtitleData, path: &Path) -> SubtitleResult<()> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn default_zero(value: &str) -> &str {
    if value.is_empty() {
        "0"
    } else {
        value
    }
}

fn canonical_field_name(lower: &str) -> String {
    for canonical in super::types::DEFAULT_STYLE_FORMAT {
        if canonical.to_lowercase() == lower {
            return canonical.to_string();
        }
    }
    // Unknown field: capitalize the first letter.
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitles::parsers::{parse_ass, parse_srt};
    use crate::subtitles::types::{SubtitleEvent, SubtitleFormat};

    fn sample_data() -> SubtitleData {
        let mut data = SubtitleData::new(SubtitleFormat::Ass);
        data.metadata_set("Title", "Test");
        data.metadata_set("PlayResX", "1920");
        data.styles.push(super::super::types::SubtitleStyle::default_ass());
        data.events.push(SubtitleEvent::new(1000.4, 3500.9, "Default", "Line one"));
        data
    }

    #[test]
    fn ass_output_round_trips_through_parser() {
        let data = sample_data();
        let text = write_ass_string(&data, SubtitleRounding::Floor);
        let parsed = parse_ass(&text).unwrap();
        assert_eq!(parsed.events.len(), 1);
        // Floor: 1000.4 ms -> 100 cs -> 1000 ms.
        assert_eq!(parsed.events[0].start_ms, 1000.0);
        assert_eq!(parsed.events[0].end_ms, 3500.0);
        assert_eq!(parsed.metadata_get("PlayResX"), Some("1920"));
    }

    #[test]
    fn rounding_mode_is_honored_at_write() {
        let data = sample_data();
        let ceil = write_ass_string(&data, SubtitleRounding::Ceil);
        let parsed = parse_ass(&ceil).unwrap();
        assert_eq!(parsed.events[0].start_ms, 1010.0); // ceil(100.04 cs)
        assert_eq!(parsed.events[0].end_ms, 3510.0);
    }

    #[test]
    fn srt_output_round_trips() {
        let data = sample_data();
        let text = write_srt_string(&data, SubtitleRounding::Round);
        let parsed = parse_srt(&text).unwrap();
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.events[0].start_ms, 1000.0);
        assert_eq!(parsed.events[0].end_ms, 3501.0);
    }

    #[test]
    fn comments_are_dropped_from_srt() {
        let mut data = sample_data();
        let mut comment = SubtitleEvent::new(0.0, 10.0, "Default", "hidden");
        comment.is_comment = true;
        data.events.push(comment);
        let text = write_srt_string(&data, SubtitleRounding::Round);
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn json_sidecar_serializes_all_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("side.json");
        write_json_sidecar(&sample_data(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"start_ms\": 1000.4"));
        assert!(text.contains("\"Line one\""));
    }
}
