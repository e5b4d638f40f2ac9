//! Container probing via the muxer's JSON output.

use std::path::Path;

use serde_json::Value;

use super::types::{ExtractionError, ExtractionResult, ProbeAttachment, ProbeResult, ProbeTrack};
use crate::io::{argv, CommandRunner};
use crate::models::TrackType;

/// Probe a container for tracks, attachments, and chapters.
pub fn probe_file(path: &Path, runner: &CommandRunner) -> ExtractionResult<ProbeResult> {
    if !path.exists() {
        return Err(ExtractionError::FileNotFound(path.to_path_buf()));
    }

    let out = runner.run(&argv([
        "mkvmerge".to_string(),
        "-J".to_string(),
        path.to_string_lossy().into_owned(),
    ]))?;

    let json: Value = serde_json::from_str(&out).map_err(|e| ExtractionError::Parse {
        what: "mkvmerge -J output".to_string(),
        message: e.to_string(),
    })?;

    Ok(parse_probe_json(&json, path))
}

/// Parse probe JSON into the owned model.
pub fn parse_probe_json(json: &Value, path: &Path) -> ProbeResult {
    let mut result = ProbeResult {
        file_path: path.to_path_buf(),
        ..Default::default()
    };

    if let Some(container) = json.get("container") {
        result.container_type = container
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("unknown")
            .to_string();
        result.duration_ns = container
            .get("properties")
            .and_then(|p| p.get("duration"))
            .and_then(|d| d.as_u64());
    }

    if let Some(tracks) = json.get("tracks").and_then(|t| t.as_array()) {
        for track in tracks {
            if let Some(parsed) = parse_track(track) {
                result.tracks.push(parsed);
            }
        }
    }

    if let Some(attachments) = json.get("attachments").and_then(|a| a.as_array()) {
        for attachment in attachments {
            let Some(id) = attachment.get("id").and_then(|i| i.as_u64()) else {
                continue;
            };
            result.attachments.push(ProbeAttachment {
                id,
                content_type: attachment
                    .get("content_type")
                    .and_then(|c| c.as_str())
                    .unwrap_or("")
                    .to_string(),
                file_name: attachment
                    .get("file_name")
                    .and_then(|f| f.as_str())
                    .unwrap_or("")
                    .to_string(),
            });
        }
    }

    result.has_chapters = json
        .get("chapters")
        .and_then(|c| c.as_array())
        .is_some_and(|c| !c.is_empty());

    result
}

fn parse_track(track: &Value) -> Option<ProbeTrack> {
    let track_type = TrackType::from_probe_str(track.get("type")?.as_str()?)?;
    let id = track.get("id")?.as_u64()?;
    let props = track.get("properties");

    let get_str = |key: &str| -> String {
        props
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };
    let get_bool = |key: &str| -> bool {
        props
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    };
    let get_u32 = |key: &str| -> Option<u32> {
        props
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    };

    // Subtitles carry no meaningful container delay in Matroska.
    let container_delay_ms = match track_type {
        TrackType::Video | TrackType::Audio => props
            .and_then(|p| p.get("minimum_timestamp"))
            .and_then(|m| m.as_i64())
            .map(|ns| (ns as f64 / 1_000_000.0).round() as i64)
            .unwrap_or(0),
        TrackType::Subtitles => 0,
    };

    let language = {
        let l = get_str("language");
        if l.is_empty() {
            "und".to_string()
        } else {
            l
        }
    };

    Some(ProbeTrack {
        id,
        track_type,
        codec_id: get_str("codec_id"),
        language,
        name: get_str("track_name"),
        is_default: get_bool("default_track"),
        is_forced: get_bool("forced_track"),
        container_delay_ms,
        audio_channels: get_u32("audio_channels"),
        audio_sampling_frequency: get_u32("audio_sampling_frequency"),
        audio_bits_per_sample: get_u32("audio_bits_per_sample"),
        pixel_dimensions: props
            .and_then(|p| p.get("pixel_dimensions"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_probe() -> Value {
        json!({
            "container": {"type": "Matroska", "properties": {"duration": 5_400_000_000_000u64}},
            "tracks": [
                {
                    "id": 0, "type": "video",
                    "properties": {
                        "codec_id": "V_MPEGH/ISO/HEVC", "language": "und",
                        "pixel_dimensions": "1920x1080", "minimum_timestamp": 0
                    }
                },
                {
                    "id": 1, "type": "audio",
                    "properties": {
                        "codec_id": "A_FLAC", "language": "jpn", "track_name": "Movie Audio",
                        "audio_channels": 2, "audio_sampling_frequency": 48000,
                        "audio_bits_per_sample": 24, "minimum_timestamp": 12_000_000,
                        "default_track": true
                    }
                },
                {
                    "id": 2, "type": "subtitles",
                    "properties": {"codec_id": "S_TEXT/ASS", "language": "eng", "minimum_timestamp": 55_000_000}
                }
            ],
            "attachments": [
                {"id": 1, "content_type": "font/ttf", "file_name": "Main.ttf"}
            ],
            "chapters": [{"num_entries": 12}]
        })
    }

    #[test]
    fn parses_tracks_and_properties() {
        let probe = parse_probe_json(&sample_probe(), Path::new("/x.mkv"));
        assert_eq!(probe.tracks.len(), 3);
        assert_eq!(probe.container_type, "Matroska");
        assert!(probe.has_chapters);

        let audio = probe.track(1).unwrap();
        assert_eq!(audio.track_type, TrackType::Audio);
        assert_eq!(audio.codec_id, "A_FLAC");
        assert_eq!(audio.language, "jpn");
        assert_eq!(audio.container_delay_ms, 12);
        assert_eq!(audio.audio_bits_per_sample, Some(24));
        assert!(audio.is_default);
    }

    #[test]
    fn subtitle_container_delay_is_zeroed() {
        let probe = parse_probe_json(&sample_probe(), Path::new("/x.mkv"));
        assert_eq!(probe.track(2).unwrap().container_delay_ms, 0);
    }

    #[test]
    fn attachments_are_listed() {
        let probe = parse_probe_json(&sample_probe(), Path::new("/x.mkv"));
        assert_eq!(probe.attachments.len(), 1);
        assert_eq!(probe.attachments[0].content_type, "font/ttf");
    }

    #[test]
    fn missing_language_becomes_und() {
        let json = json!({"tracks": [{"id": 0, "type": "video", "properties": {"codec_id": "V_AV1"}}]});
        let probe = parse_probe_json(&json, Path::new("/y.mkv"));
        assert_eq!(probe.tracks[0].language, "und");
    }
}
