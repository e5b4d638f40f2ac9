//! SRT parser.

use crate::subtitles::timestamps::parse_srt_timestamp;
use crate::subtitles::types::{
    SubtitleData, SubtitleError, SubtitleEvent, SubtitleFormat, SubtitleResult, SubtitleStyle,
};

/// Parse SRT text into the in-memory model.
///
/// SRT has no styles; events get the "Default" style so a later SRT to ASS
/// conversion needs no special casing.
pub fn parse_srt(content: &str) -> SubtitleResult<SubtitleData> {
    let mut data = SubtitleData::new(SubtitleFormat::Srt);
    data.styles.push(SubtitleStyle::default_ass());

    let mut lines = content
        .lines()
        .map(|l| l.trim_start_matches('\u{feff}'))
        .enumerate()
        .peekable();

    while let Some((idx, line)) = lines.next() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // A cue starts with an optional numeric index followed by the
        // timing line.
        let timing_line = if line.chars().all(|c| c.is_ascii_digit()) {
            match lines.next() {
                Some((_, t)) => t.trim(),
                None => break,
            }
        } else {
            line
        };

        let (start_text, end_text) =
            timing_line
                .split_once("-->")
                .ok_or(SubtitleError::Parse {
                    format: "SRT",
                    line: idx + 1,
                    message: format!("expected timing line, got '{}'", timing_line),
                })?;
        let start_ms = parse_srt_timestamp(start_text).ok_or(SubtitleError::Parse {
            format: "SRT",
            line: idx + 1,
            message: format!("bad start timestamp '{}'", start_text.trim()),
        })?;
        let end_ms = parse_srt_timestamp(end_text).ok_or(SubtitleError::Parse {
            format: "SRT",
            line: idx + 1,
            message: format!("bad end timestamp '{}'", end_text.trim()),
        })?;

        let mut text_lines = Vec::new();
        while let Some(&(_, next)) = lines.peek() {
            if next.trim().is_empty() {
                lines.next();
                break;
            }
            text_lines.push(next.trim_end().to_string());
            lines.next();
        }

        data.events.push(SubtitleEvent::new(
            start_ms,
            end_ms,
            "Default",
            text_lines.join("\\N"),
        ));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
1\n\
00:00:01,000 --> 00:00:03,500\n\
Hello there\n\
\n\
2\n\
00:01:00,250 --> 00:01:02,750\n\
Two lines\n\
of text\n\
\n";

    #[test]
    fn parses_cues_with_float_times() {
        let data = parse_srt(SAMPLE).unwrap();
        assert_eq!(data.format, SubtitleFormat::Srt);
        assert_eq!(data.events.len(), 2);
        assert_eq!(data.events[0].start_ms, 1000.0);
        assert_eq!(data.events[0].end_ms, 3500.0);
        assert_eq!(data.events[0].text, "Hello there");
    }

    #[test]
    fn multi_line_text_joins_with_ass_newline() {
        let data = parse_srt(SAMPLE).unwrap();
        assert_eq!(data.events[1].text, "Two lines\\Nof text");
    }

    #[test]
    fn cue_without_index_still_parses() {
        let data = parse_srt("00:00:05,000 --> 00:00:06,000\nbare cue\n").unwrap();
        assert_eq!(data.events.len(), 1);
        assert_eq!(data.events[0].start_ms, 5000.0);
    }

    #[test]
    fn malformed_timing_errors() {
        assert!(parse_srt("1\nnot a timing line\ntext\n").is_err());
    }
}
