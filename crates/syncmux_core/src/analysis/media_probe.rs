//! Small ffprobe helpers shared by analysis and correction.

use std::path::Path;

use serde_json::Value;

use super::types::{AnalysisError, AnalysisResult};
use crate::io::{argv, CommandRunner};

/// Average video framerate of the first video stream, or `None` when the
/// file has no video or the rate cannot be parsed.
pub fn get_video_framerate(path: &Path, runner: &CommandRunner) -> Option<f64> {
    let out = runner
        .run(&argv([
            "ffprobe".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=avg_frame_rate".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.to_string_lossy().into_owned(),
        ]))
        .ok()?;
    parse_framerate(&out)
}

fn parse_framerate(text: &str) -> Option<f64> {
    let line = text.lines().find(|l| l.contains('/'))?;
    let (num, den) = line.trim().split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

/// Channel count, channel layout, and sample rate of one audio stream.
pub fn get_audio_properties(
    path: &Path,
    stream_index: usize,
    runner: &CommandRunner,
) -> AnalysisResult<(u32, String, u32)> {
    let out = runner.run(&argv([
        "ffprobe".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        format!("a:{}", stream_index),
        "-show_entries".to_string(),
        "stream=channels,channel_layout,sample_rate".to_string(),
        "-of".to_string(),
        "json".to_string(),
        path.to_string_lossy().into_owned(),
    ]))?;

    let json: Value = serde_json::from_str(&out).map_err(|e| AnalysisError::Parse {
        what: "ffprobe stream json".to_string(),
        message: e.to_string(),
    })?;
    let stream = json
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .ok_or_else(|| AnalysisError::Parse {
            what: "ffprobe stream json".to_string(),
            message: "no streams in output".to_string(),
        })?;

    let channels = stream
        .get("channels")
        .and_then(|c| c.as_u64())
        .unwrap_or(2) as u32;
    let layout = stream
        .get("channel_layout")
        .and_then(|l| l.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| default_layout(channels));
    let sample_rate = stream
        .get("sample_rate")
        .and_then(|r| r.as_str())
        .and_then(|r| r.parse().ok())
        .or_else(|| stream.get("sample_rate").and_then(|r| r.as_u64()).map(|r| r as u32))
        .unwrap_or(48000);

    Ok((channels, layout, sample_rate))
}

/// ffmpeg channel layout name for a channel count.
pub fn default_layout(channels: u32) -> String {
    match channels {
        1 => "mono",
        2 => "stereo",
        6 => "5.1(side)",
        8 => "7.1",
        _ => "stereo",
    }
    .to_string()
}

/// Display aspect ratio of the first video stream, as reported by the
/// decoder (e.g. "16:9"). Mux planning prefers this over container
/// metadata.
pub fn get_display_aspect_ratio(path: &Path, runner: &CommandRunner) -> Option<String> {
    let out = runner
        .run(&argv([
            "ffprobe".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=display_aspect_ratio".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.to_string_lossy().into_owned(),
        ]))
        .ok()?;
    let ratio = out.lines().next()?.trim();
    if ratio.is_empty() || ratio == "N/A" {
        None
    } else {
        Some(ratio.to_string())
    }
}

/// Codec name of the first audio stream, lowercased.
pub fn get_audio_codec_name(path: &Path, runner: &CommandRunner) -> String {
    runner
        .run(&argv([
            "ffprobe".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "a:0".to_string(),
            "-show_entries".to_string(),
            "stream=codec_name".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.to_string_lossy().into_owned(),
        ]))
        .map(|out| out.trim().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framerate_parses_fraction() {
        assert_eq!(parse_framerate("25/1\n"), Some(25.0));
        let ntsc = parse_framerate("24000/1001\n").unwrap();
        assert!((ntsc - 23.976).abs() < 0.001);
        assert_eq!(parse_framerate("0/0\n"), None);
        assert_eq!(parse_framerate("garbage"), None);
    }

    #[test]
    fn layouts_cover_common_counts() {
        assert_eq!(default_layout(1), "mono");
        assert_eq!(default_layout(2), "stereo");
        assert_eq!(default_layout(6), "5.1(side)");
        assert_eq!(default_layout(8), "7.1");
        assert_eq!(default_layout(3), "stereo");
    }
}
