//! Container-level delay extraction.
//!
//! Matroska stores a per-track `minimum_timestamp`; the video track's value
//! defines the timeline, so audio delays are rebased relative to it before
//! they enter any delay arithmetic.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{AnalysisError, AnalysisResult};
use crate::io::{argv, CommandRunner};

/// Per-source container timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerDelayInfo {
    /// Container delay of the first video track (ms).
    pub video_delay_ms: f64,
    /// Audio track id -> delay relative to the video track (ms).
    pub audio_delays_ms: BTreeMap<u64, f64>,
}

impl ContainerDelayInfo {
    /// Relative delay for one audio track; missing tracks read as zero.
    pub fn audio_delay(&self, track_id: u64) -> f64 {
        self.audio_delays_ms.get(&track_id).copied().unwrap_or(0.0)
    }
}

/// Read container delays from a media file and rebase audio onto the video
/// timeline.
pub fn get_container_delay_info(
    path: &Path,
    runner: &CommandRunner,
) -> AnalysisResult<ContainerDelayInfo> {
    let out = runner.run(&argv([
        "mkvmerge".to_string(),
        "-J".to_string(),
        path.to_string_lossy().into_owned(),
    ]))?;
    let json: Value = serde_json::from_str(&out).map_err(|e| AnalysisError::Parse {
        what: "mkvmerge -J output".to_string(),
        message: e.to_string(),
    })?;

    Ok(parse_container_delays(&json))
}

/// Parse container delays out of probe JSON.
///
/// `minimum_timestamp` is nanoseconds; `round()` keeps negative values
/// correct (truncation would bias toward zero). Subtitle tracks carry no
/// meaningful container delay and are ignored.
pub fn parse_container_delays(json: &Value) -> ContainerDelayInfo {
    let tracks = json
        .get("tracks")
        .and_then(|t| t.as_array())
        .cloned()
        .unwrap_or_default();

    let delay_of = |track: &Value| -> f64 {
        track
            .get("properties")
            .and_then(|p| p.get("minimum_timestamp"))
            .and_then(|m| m.as_i64())
            .map(|ns| (ns as f64 / 1_000_000.0).round())
            .unwrap_or(0.0)
    };

    let video_delay_ms = tracks
        .iter()
        .find(|t| t.get("type").and_then(|v| v.as_str()) == Some("video"))
        .map(&delay_of)
        .unwrap_or(0.0);

    let mut audio_delays_ms = BTreeMap::new();
    for track in &tracks {
        if track.get("type").and_then(|v| v.as_str()) != Some("audio") {
            continue;
        }
        let Some(id) = track.get("id").and_then(|i| i.as_u64()) else {
            continue;
        };
        audio_delays_ms.insert(id, delay_of(track) - video_delay_ms);
    }

    ContainerDelayInfo {
        video_delay_ms,
        audio_delays_ms,
    }
}

/// Combine a correlation delay with the Source 1 analysis track's container
/// delay. Returns `(rounded, raw)`; rounding happens here, once.
pub fn calculate_delay_chain(
    correlation_raw_ms: f64,
    container_delay_ms: f64,
    source_key: &str,
    logger: &crate::logging::JobLogger,
) -> (i64, f64) {
    let final_raw = correlation_raw_ms + container_delay_ms;
    let final_rounded = final_raw.round() as i64;
    logger.message(&format!(
        "[Delay Calculation] {} delay chain: correlation {:+.3}ms + container {:+.3}ms = {:+.3}ms (raw) -> {:+}ms (rounded)",
        source_key, correlation_raw_ms, container_delay_ms, final_raw, final_rounded
    ));
    (final_rounded, final_raw)
}
