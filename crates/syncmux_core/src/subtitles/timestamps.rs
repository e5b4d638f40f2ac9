//! Subtitle timestamp parsing and formatting.
//!
//! All in-memory event times are float milliseconds. Rounding to the output
//! format's resolution (centiseconds for ASS, milliseconds for SRT) happens
//! in the formatters here and nowhere else.

use crate::models::SubtitleRounding;

/// Parse an ASS timestamp (`H:MM:SS.cc`) to float milliseconds.
pub fn parse_ass_timestamp(text: &str) -> Option<f64> {
    let mut parts = text.trim().splitn(3, ':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let rest = parts.next()?;
    let (seconds_str, frac_str) = match rest.split_once('.') {
        Some((s, f)) => (s, f),
        None => (rest, ""),
    };
    let seconds: i64 = seconds_str.parse().ok()?;
    // Fractional digits scale by their count: 2 digits are centiseconds,
    // 3 are milliseconds.
    let frac_ms = if frac_str.is_empty() {
        0.0
    } else {
        let value: f64 = frac_str.parse().ok()?;
        value * 10f64.powi(3 - frac_str.len() as i32)
    };
    Some((hours * 3_600_000 + minutes * 60_000 + seconds * 1000) as f64 + frac_ms)
}

/// Parse an SRT timestamp (`HH:MM:SS,mmm`) to float milliseconds.
pub fn parse_srt_timestamp(text: &str) -> Option<f64> {
    let text = text.trim().replace(',', ".");
    let mut parts = text.splitn(3, ':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some((hours * 3_600_000 + minutes * 60_000) as f64 + seconds * 1000.0)
}

/// Round float milliseconds to integer centiseconds per the configured mode.
pub fn round_to_centiseconds(ms: f64, rounding: SubtitleRounding) -> i64 {
    let value = ms / 10.0;
    match rounding {
        SubtitleRounding::Floor => value.floor() as i64,
        SubtitleRounding::Round => value.round() as i64,
        SubtitleRounding::Ceil => value.ceil() as i64,
    }
}

/// Round float milliseconds to integer milliseconds per the configured mode.
pub fn round_to_milliseconds(ms: f64, rounding: SubtitleRounding) -> i64 {
    match rounding {
        SubtitleRounding::Floor => ms.floor() as i64,
        SubtitleRounding::Round => ms.round() as i64,
        SubtitleRounding::Ceil => ms.ceil() as i64,
    }
}

/// Format float milliseconds as an ASS timestamp. Negative times clamp to 0.
pub fn format_ass_timestamp(ms: f64, rounding: SubtitleRounding) -> String {
    let total_cs = round_to_centiseconds(ms, rounding).max(0);
    let cs = total_cs % 100;
    let total_seconds = total_cs / 100;
    let seconds = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let minutes = total_minutes % 60;
    let hours = total_minutes / 60;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, cs)
}

/// Format float milliseconds as an SRT timestamp. Negative times clamp to 0.
pub fn format_srt_timestamp(ms: f64, rounding: SubtitleRounding) -> String {
    let total_ms = round_to_milliseconds(ms, rounding).max(0);
    let millis = total_ms % 1000;
    let total_seconds = total_ms / 1000;
    let seconds = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let minutes = total_minutes % 60;
    let hours = total_minutes / 60;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Number of fractional digits in a timestamp string.
///
/// Standard ASS writes centiseconds (2); some tools write milliseconds (3),
/// which silently loses precision through load/save cycles elsewhere.
pub fn timestamp_precision(text: &str) -> usize {
    text.split_once('.')
        .map(|(_, frac)| frac.trim().len())
        .unwrap_or(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ass_round_trip() {
        let ms = parse_ass_timestamp("0:01:23.45").unwrap();
        assert_eq!(ms, 83_450.0);
        assert_eq!(format_ass_timestamp(ms, SubtitleRounding::Floor), "0:01:23.45");
    }

    #[test]
    fn ass_parse_handles_three_digit_fraction() {
        let ms = parse_ass_timestamp("0:00:01.234").unwrap();
        assert_eq!(ms, 1234.0);
        assert_eq!(timestamp_precision("0:00:01.234"), 3);
        assert_eq!(timestamp_precision("0:00:01.23"), 2);
    }

    #[test]
    fn srt_round_trip() {
        let ms = parse_srt_timestamp("01:02:03,456").unwrap();
        assert_eq!(ms, 3_723_456.0);
        assert_eq!(format_srt_timestamp(ms, SubtitleRounding::Round), "01:02:03,456");
    }

    #[test]
    fn rounding_modes_differ_per_spec() {
        // 123.45 ms -> 12.345 cs
        assert_eq!(round_to_centiseconds(123.45, SubtitleRounding::Floor), 12);
        assert_eq!(round_to_centiseconds(123.45, SubtitleRounding::Round), 12);
        assert_eq!(round_to_centiseconds(125.0, SubtitleRounding::Round), 13);
        assert_eq!(round_to_centiseconds(123.45, SubtitleRounding::Ceil), 13);

        assert_eq!(round_to_milliseconds(10.2, SubtitleRounding::Floor), 10);
        assert_eq!(round_to_milliseconds(10.2, SubtitleRounding::Ceil), 11);
    }

    #[test]
    fn negative_times_clamp_to_zero_on_write() {
        assert_eq!(
            format_ass_timestamp(-500.0, SubtitleRounding::Floor),
            "0:00:00.00"
        );
        assert_eq!(
            format_srt_timestamp(-1.0, SubtitleRounding::Round),
            "00:00:00,000"
        );
    }

    #[test]
    fn malformed_timestamps_parse_to_none() {
        assert!(parse_ass_timestamp("bogus").is_none());
        assert!(parse_ass_timestamp("1:2").is_none());
        assert!(parse_srt_timestamp("??").is_none());
    }
}
