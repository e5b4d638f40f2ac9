//! VideoDiff analysis mode.
//!
//! Delegates delay measurement to the external `videodiff` binary and parses
//! its `[Result]` line. An `ss` result flips sign (the tool reports how far
//! to seek the reference, not how far to delay the target).

use std::path::Path;

use crate::config::Settings;
use crate::io::{argv, CommandRunner};

use super::types::{AnalysisError, AnalysisResult};

/// Run videodiff and return `(delay_ms, error_value)`.
///
/// The caller gates the error value against
/// `videodiff_error_min..videodiff_error_max`.
pub fn run_videodiff(
    ref_file: &Path,
    target_file: &Path,
    settings: &Settings,
    runner: &CommandRunner,
) -> AnalysisResult<(i64, f64)> {
    let exe = if settings.paths.videodiff_path.trim().is_empty() {
        "videodiff".to_string()
    } else {
        settings.paths.videodiff_path.trim().to_string()
    };

    let out = runner.run(&argv([
        exe,
        ref_file.to_string_lossy().into_owned(),
        target_file.to_string_lossy().into_owned(),
    ]))?;

    let (delay_ms, error_value) = parse_videodiff_output(&out)?;
    runner.logger().message(&format!(
        "[VideoDiff] Result -> delay {:+} ms, error {:.2}",
        delay_ms, error_value
    ));

    let (min, max) = (
        settings.analysis.videodiff_error_min,
        settings.analysis.videodiff_error_max,
    );
    if !(min..=max).contains(&error_value) {
        return Err(AnalysisError::VideoDiffOutOfRange {
            error: error_value,
            min,
            max,
        });
    }

    Ok((delay_ms, error_value))
}

/// Parse the last `[Result]` line, e.g.
/// `[Result] ss: 1.50000s ... error: 0.42`.
pub fn parse_videodiff_output(output: &str) -> AnalysisResult<(i64, f64)> {
    let result_line = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.contains("[Result]") && (line.contains("ss:") || line.contains("itsoffset:")))
        .ok_or_else(|| AnalysisError::Parse {
            what: "videodiff output".to_string(),
            message: "no '[Result]' line found".to_string(),
        })?;

    let parse_err = || AnalysisError::Parse {
        what: "videodiff result line".to_string(),
        message: result_line.to_string(),
    };

    let (kind, rest) = if let Some(pos) = result_line.find("itsoffset:") {
        ("itsoffset", &result_line[pos + "itsoffset:".len()..])
    } else if let Some(pos) = result_line.find("ss:") {
        ("ss", &result_line[pos + "ss:".len()..])
    } else {
        return Err(parse_err());
    };

    let seconds_str: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    let seconds: f64 = seconds_str.parse().map_err(|_| parse_err())?;

    let error_value: f64 = result_line
        .split("error:")
        .nth(1)
        .map(|s| {
            s.trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect::<String>()
        })
        .and_then(|s| s.parse().ok())
        .ok_or_else(parse_err)?;

    let mut delay_ms = (seconds * 1000.0).round() as i64;
    if kind == "ss" {
        delay_ms = -delay_ms;
    }

    Ok((delay_ms, error_value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ss_result_with_sign_flip() {
        let out = "noise\n[Result] ss: 1.50000s quality error: 12.34\n";
        let (delay, err) = parse_videodiff_output(out).unwrap();
        assert_eq!(delay, -1500);
        assert!((err - 12.34).abs() < 1e-9);
    }

    #[test]
    fn parses_itsoffset_result() {
        let out = "[Result] itsoffset: -0.250s error: 3.5";
        let (delay, err) = parse_videodiff_output(out).unwrap();
        assert_eq!(delay, -250);
        assert!((err - 3.5).abs() < 1e-9);
    }

    #[test]
    fn last_result_line_wins() {
        let out = "[Result] ss: 1.0s error: 9.0\nmore\n[Result] ss: 2.0s error: 1.0\n";
        let (delay, err) = parse_videodiff_output(out).unwrap();
        assert_eq!(delay, -2000);
        assert!((err - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_result_line_errors() {
        assert!(parse_videodiff_output("no result here").is_err());
    }
}
