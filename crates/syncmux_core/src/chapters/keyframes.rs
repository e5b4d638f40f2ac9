//! Keyframe discovery for chapter snapping.

use std::path::Path;

use crate::correction::stepping::parse_keyframe_packets;
use crate::io::{argv, CommandRunner};

/// Keyframe timestamps of the reference video in nanoseconds, sorted.
pub fn probe_keyframes_ns(video_file: &Path, runner: &CommandRunner) -> Vec<i64> {
    let cmd = argv([
        "ffprobe".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v:0".to_string(),
        "-show_entries".to_string(),
        "packet=pts_time,flags".to_string(),
        "-of".to_string(),
        "json".to_string(),
        video_file.to_string_lossy().into_owned(),
    ]);
    let Ok(output) = runner.run(&cmd) else {
        return Vec::new();
    };
    parse_keyframe_packets(&output)
        .into_iter()
        .map(|s| (s * 1e9).round() as i64)
        .collect()
}

/// The snap candidate for a timestamp: the previous keyframe, or the
/// nearest, depending on the mode.
pub fn pick_candidate(keyframes_ns: &[i64], ts_ns: i64, nearest: bool) -> i64 {
    if keyframes_ns.is_empty() {
        return ts_ns;
    }
    let idx = keyframes_ns.partition_point(|&kf| kf <= ts_ns);
    let prev = if idx > 0 {
        keyframes_ns[idx - 1]
    } else {
        keyframes_ns[0]
    };
    if !nearest {
        return prev;
    }
    let next = keyframes_ns.get(idx).copied().unwrap_or(*keyframes_ns.last().unwrap());
    if (ts_ns - prev).abs() <= (ts_ns - next).abs() {
        prev
    } else {
        next
    }
}
