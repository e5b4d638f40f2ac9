//! ASS/SSA parser.

use crate::subtitles::timestamps::parse_ass_timestamp;
use crate::subtitles::types::{
    SubtitleData, SubtitleError, SubtitleEvent, SubtitleFormat, SubtitleResult, SubtitleStyle,
    DEFAULT_STYLE_FORMAT,
};

const DEFAULT_EVENT_FORMAT: [&str; 10] = [
    "layer", "start", "end", "style", "name", "marginl", "marginr", "marginv", "effect", "text",
];

/// Parse ASS/SSA text into the in-memory model.
///
/// Raw (unrounded) timestamps are kept as float milliseconds; 3-digit
/// fractional timestamps parse losslessly even though standard ASS uses
/// centiseconds.
pub fn parse_ass(content: &str) -> SubtitleResult<SubtitleData> {
    let mut data = SubtitleData::new(SubtitleFormat::Ass);
    let mut section = String::new();
    let mut style_format: Vec<String> = Vec::new();
    let mut event_format: Vec<String> = Vec::new();

    for (line_idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('!') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = line[1..line.len() - 1].to_lowercase();
            continue;
        }

        match section.as_str() {
            "script info" => {
                if let Some((key, value)) = line.split_once(':') {
                    data.metadata.push((key.trim().to_string(), value.trim().to_string()));
                }
            }
            "v4+ styles" | "v4 styles" => {
                if let Some(rest) = line.strip_prefix("Format:") {
                    style_format = parse_format_fields(rest);
                } else if let Some(rest) = line.strip_prefix("Style:") {
                    let format = if style_format.is_empty() {
                        DEFAULT_STYLE_FORMAT
                            .iter()
                            .map(|f| f.to_lowercase())
                            .collect()
                    } else {
                        style_format.clone()
                    };
                    let values: Vec<String> = rest
                        .trim()
                        .splitn(format.len(), ',')
                        .map(|v| v.trim().to_string())
                        .collect();
                    if values.len() < format.len() {
                        return Err(SubtitleError::Parse {
                            format: "ASS",
                            line: line_idx + 1,
                            message: format!(
                                "style has {} fields, format declares {}",
                                values.len(),
                                format.len()
                            ),
                        });
                    }
                    data.styles.push(SubtitleStyle { format, values });
                }
            }
            "events" => {
                if let Some(rest) = line.strip_prefix("Format:") {
                    event_format = parse_format_fields(rest);
                } else {
                    let (is_comment, rest) = if let Some(rest) = line.strip_prefix("Dialogue:") {
                        (false, rest)
                    } else if let Some(rest) = line.strip_prefix("Comment:") {
                        (true, rest)
                    } else {
                        continue;
                    };
                    let format: &[String] = if event_format.is_empty() {
                        &DEFAULT_EVENT_FORMAT_OWNED
                    } else {
                        &event_format
                    };
                    let event = parse_event_line(rest, format, is_comment, line_idx + 1)?;
                    data.events.push(event);
                }
            }
            _ => {
                // Unknown sections ride along as metadata so nothing is lost.
                if let Some((key, value)) = line.split_once(':') {
                    data.metadata.push((key.trim().to_string(), value.trim().to_string()));
                }
            }
        }
    }

    if data.styles.is_empty() {
        data.styles.push(SubtitleStyle::default_ass());
    }
    Ok(data)
}

static DEFAULT_EVENT_FORMAT_OWNED: once_cell::sync::Lazy<Vec<String>> =
    once_cell::sync::Lazy::new(|| DEFAULT_EVENT_FORMAT.iter().map(|f| f.to_string()).collect());

fn parse_format_fields(rest: &str) -> Vec<String> {
    rest.split(',').map(|f| f.trim().to_lowercase()).collect()
}

fn parse_event_line(
    rest: &str,
    format: &[String],
    is_comment: bool,
    line_num: usize,
) -> SubtitleResult<SubtitleEvent> {
    // Text is the final field and may contain commas.
    let fields: Vec<&str> = rest.trim_start().splitn(format.len(), ',').collect();
    if fields.len() < format.len() {
        return Err(SubtitleError::Parse {
            format: "ASS",
            line: line_num,
            message: format!(
                "event has {} fields, format declares {}",
                fields.len(),
                format.len()
            ),
        });
    }

    let field = |name: &str| -> &str {
        format
            .iter()
            .position(|f| f == name)
            .map(|i| fields[i])
            .unwrap_or("")
    };

    let start_text = field("start");
    let end_text = field("end");
    let start_ms = parse_ass_timestamp(start_text).ok_or(SubtitleError::Parse {
        format: "ASS",
        line: line_num,
        message: format!("bad start timestamp '{}'", start_text),
    })?;
    let end_ms = parse_ass_timestamp(end_text).ok_or(SubtitleError::Parse {
        format: "ASS",
        line: line_num,
        message: format!("bad end timestamp '{}'", end_text),
    })?;

    Ok(SubtitleEvent {
        start_ms,
        end_ms,
        style: field("style").trim().to_string(),
        text: field("text").to_string(),
        is_comment,
        layer: field("layer").trim().to_string(),
        name: field("name").trim().to_string(),
        margin_l: field("marginl").trim().to_string(),
        margin_r: field("marginr").trim().to_string(),
        margin_v: field("marginv").trim().to_string(),
        effect: field("effect").trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[Script Info]\n\
Title: Sample\n\
PlayResX: 1920\n\
PlayResY: 1080\n\
ScaledBorderAndShadow: yes\n\
\n\
[V4+ Styles]\n\
Format: Name, Fontname, Fontsize, PrimaryColour, Bold\n\
Style: Default,Open Sans,52,&H00FFFFFF,0\n\
Style: Sign,Impact,40,&H00FFFF00,1\n\
\n\
[Events]\n\
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n\
Dialogue: 0,0:00:01.00,0:00:03.50,Default,,0,0,0,,Hello, world\n\
Comment: 0,0:00:05.00,0:00:06.00,Default,,0,0,0,,note to self\n\
Dialogue: 1,0:01:00.25,0:01:02.75,Sign,actor,10,10,10,fade,Sign text\n";

    #[test]
    fn parses_sections_styles_and_events() {
        let data = parse_ass(SAMPLE).unwrap();
        assert_eq!(data.metadata_get("Title"), Some("Sample"));
        assert_eq!(data.play_res(), (Some(1920), Some(1080)));
        assert_eq!(data.styles.len(), 2);
        assert_eq!(data.styles[0].name(), "Default");
        assert_eq!(data.styles[0].font_name(), "Open Sans");
        assert_eq!(data.styles[1].get("bold"), Some("1"));
        assert_eq!(data.events.len(), 3);
    }

    #[test]
    fn event_text_keeps_embedded_commas() {
        let data = parse_ass(SAMPLE).unwrap();
        assert_eq!(data.events[0].text, "Hello, world");
        assert_eq!(data.events[0].start_ms, 1000.0);
        assert_eq!(data.events[0].end_ms, 3500.0);
    }

    #[test]
    fn comments_are_flagged() {
        let data = parse_ass(SAMPLE).unwrap();
        assert!(data.events[1].is_comment);
        assert!(!data.events[0].is_comment);
    }

    #[test]
    fn event_fields_map_through_format() {
        let data = parse_ass(SAMPLE).unwrap();
        let sign = &data.events[2];
        assert_eq!(sign.layer, "1");
        assert_eq!(sign.name, "actor");
        assert_eq!(sign.margin_l, "10");
        assert_eq!(sign.effect, "fade");
        assert_eq!(sign.style, "Sign");
    }

    #[test]
    fn file_without_styles_gets_a_default() {
        let data = parse_ass("[Events]\nDialogue: 0,0:00:00.00,0:00:01.00,Default,,0,0,0,,x\n")
            .unwrap();
        assert_eq!(data.styles.len(), 1);
        assert_eq!(data.styles[0].name(), "Default");
    }

    #[test]
    fn truncated_event_is_an_error() {
        let err = parse_ass("[Events]\nDialogue: 0,0:00:00.00\n").unwrap_err();
        assert!(matches!(err, SubtitleError::Parse { .. }));
    }
}
