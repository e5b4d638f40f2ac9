//! Audio stream selection and PCM decoding for correlation.
//!
//! Stream selection probes the container and prefers the requested language;
//! decoding produces mono float32 samples on the decoder's stdout at the
//! analysis sample rate.

use std::path::Path;

use serde_json::Value;

use super::lang::normalize_lang;
use super::types::{AnalysisError, AnalysisResult, TrackSelection};
use crate::io::{argv, CommandRunner};

/// Default sample rate for all correlation work.
pub const DEFAULT_ANALYSIS_SAMPLE_RATE: u32 = 48000;

/// Pick the audio stream whose language matches `lang` (normalized), else
/// the first audio stream.
pub fn select_audio_stream(
    path: &Path,
    lang: Option<&str>,
    runner: &CommandRunner,
) -> AnalysisResult<TrackSelection> {
    let out = runner.run(&argv([
        "mkvmerge".to_string(),
        "-J".to_string(),
        path.to_string_lossy().into_owned(),
    ]))?;

    let json: Value = serde_json::from_str(&out).map_err(|e| AnalysisError::Parse {
        what: "mkvmerge -J output".to_string(),
        message: e.to_string(),
    })?;

    let audio_tracks: Vec<&Value> = json
        .get("tracks")
        .and_then(|t| t.as_array())
        .map(|tracks| {
            tracks
                .iter()
                .filter(|t| t.get("type").and_then(|v| v.as_str()) == Some("audio"))
                .collect()
        })
        .unwrap_or_default();

    if audio_tracks.is_empty() {
        return Err(AnalysisError::NoAudioStream(
            path.to_string_lossy().into_owned(),
        ));
    }

    let wanted = normalize_lang(lang);
    let mut chosen = 0usize;
    if let Some(wanted) = wanted.as_deref() {
        for (i, track) in audio_tracks.iter().enumerate() {
            let track_lang = track
                .get("properties")
                .and_then(|p| p.get("language"))
                .and_then(|l| l.as_str());
            if normalize_lang(track_lang).as_deref() == Some(wanted) {
                chosen = i;
                break;
            }
        }
    }

    let track = audio_tracks[chosen];
    let props = track.get("properties");
    let language = props
        .and_then(|p| p.get("language"))
        .and_then(|l| l.as_str())
        .unwrap_or("und")
        .to_string();
    let codec_id = props
        .and_then(|p| p.get("codec_id"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();
    let track_id = track.get("id").and_then(|i| i.as_u64()).unwrap_or(0);

    Ok(TrackSelection {
        stream_index: chosen,
        track_id,
        description: format_track_details(track, chosen),
        language,
        codec_id,
    })
}

/// Log-friendly track line, e.g. `Track 0: jpn, FLAC 2.0, 'Commentary'`.
fn format_track_details(track: &Value, index: usize) -> String {
    let props = track.get("properties");
    let lang = props
        .and_then(|p| p.get("language"))
        .and_then(|l| l.as_str())
        .unwrap_or("und");
    let codec_id = props
        .and_then(|p| p.get("codec_id"))
        .and_then(|c| c.as_str())
        .unwrap_or("unknown");
    let channels = props
        .and_then(|p| p.get("audio_channels"))
        .and_then(|c| c.as_u64())
        .unwrap_or(2);
    let channel_str = match channels {
        1 => "Mono".to_string(),
        2 => "2.0".to_string(),
        6 => "5.1".to_string(),
        8 => "7.1".to_string(),
        n => format!("{}ch", n),
    };
    let name = props
        .and_then(|p| p.get("track_name"))
        .and_then(|n| n.as_str())
        .unwrap_or("");

    let mut parts = vec![format!("Track {}: {}", index, lang)];
    parts.push(format!("{} {}", friendly_codec(codec_id), channel_str));
    if !name.is_empty() {
        parts.push(format!("'{}'", name));
    }
    parts.join(", ")
}

fn friendly_codec(codec_id: &str) -> &str {
    match codec_id {
        c if c.starts_with("A_FLAC") => "FLAC",
        c if c.starts_with("A_AAC") => "AAC",
        c if c.starts_with("A_EAC3") => "E-AC3",
        c if c.starts_with("A_AC3") => "AC3",
        c if c.starts_with("A_DTS") => "DTS",
        c if c.starts_with("A_TRUEHD") => "TrueHD",
        c if c.starts_with("A_OPUS") => "Opus",
        c if c.starts_with("A_VORBIS") => "Vorbis",
        c if c.starts_with("A_PCM") => "PCM",
        c if c.starts_with("A_MPEG/L3") => "MP3",
        c => c,
    }
}

/// Decode one audio stream to mono f32 samples at `sample_rate`.
///
/// The returned buffer is an owned copy of the child's stdout; trailing
/// bytes are trimmed so the length is a whole number of samples (some codecs
/// emit partial frames at the end of the pipe).
pub fn decode_audio(
    path: &Path,
    stream_index: usize,
    sample_rate: u32,
    use_soxr: bool,
    runner: &CommandRunner,
) -> AnalysisResult<Vec<f32>> {
    if !path.exists() {
        return Err(AnalysisError::SourceNotFound(
            path.to_string_lossy().into_owned(),
        ));
    }

    let mut cmd = argv([
        "ffmpeg",
        "-nostdin",
        "-v",
        "error",
        "-i",
    ]);
    cmd.push(path.to_string_lossy().into_owned());
    cmd.push("-map".to_string());
    cmd.push(format!("0:a:{}", stream_index));
    if use_soxr {
        cmd.push("-resampler".to_string());
        cmd.push("soxr".to_string());
    }
    cmd.extend(argv(["-ac", "1", "-ar"]));
    cmd.push(sample_rate.to_string());
    cmd.extend(argv(["-f", "f32le", "-"]));

    let bytes = runner.run_binary(&cmd, None)?;
    let samples = bytes_to_f32(&bytes, runner, path);
    if samples.is_empty() {
        return Err(AnalysisError::EmptyDecode(
            path.to_string_lossy().into_owned(),
        ));
    }
    Ok(samples)
}

fn bytes_to_f32(bytes: &[u8], runner: &CommandRunner, path: &Path) -> Vec<f32> {
    let aligned = bytes.len() - bytes.len() % 4;
    if aligned != bytes.len() {
        runner.logger().message(&format!(
            "[Decode] Trimmed {} trailing byte(s) from {} (partial sample)",
            bytes.len() - aligned,
            path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        ));
    }
    bytes[..aligned]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Decode one audio stream to interleaved i32 samples (stepping correction).
pub fn decode_audio_i32(
    path: &Path,
    stream_index: usize,
    sample_rate: u32,
    channels: u32,
    runner: &CommandRunner,
) -> AnalysisResult<Vec<i32>> {
    if !path.exists() {
        return Err(AnalysisError::SourceNotFound(
            path.to_string_lossy().into_owned(),
        ));
    }

    let mut cmd = argv(["ffmpeg", "-nostdin", "-v", "error", "-i"]);
    cmd.push(path.to_string_lossy().into_owned());
    cmd.push("-map".to_string());
    cmd.push(format!("0:a:{}", stream_index));
    cmd.push("-ac".to_string());
    cmd.push(channels.to_string());
    cmd.push("-ar".to_string());
    cmd.push(sample_rate.to_string());
    cmd.extend(argv(["-f", "s32le", "-"]));

    let bytes = runner.run_binary(&cmd, None)?;
    let aligned = bytes.len() - bytes.len() % 4;
    let samples: Vec<i32> = bytes[..aligned]
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if samples.is_empty() {
        return Err(AnalysisError::EmptyDecode(
            path.to_string_lossy().into_owned(),
        ));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ToolPaths;
    use crate::logging::{JobLogger, LogConfig};
    use std::sync::Arc;

    fn runner() -> CommandRunner {
        let logger = Arc::new(JobLogger::sink_only("t", LogConfig::default(), None));
        CommandRunner::new(logger, ToolPaths::bare())
    }

    #[test]
    fn f32_conversion_trims_partial_samples() {
        let r = runner();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-0.25f32).to_le_bytes());
        bytes.extend_from_slice(&[0xAA, 0xBB]); // partial trailing sample
        let samples = bytes_to_f32(&bytes, &r, Path::new("x.mkv"));
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], 1.5);
        assert_eq!(samples[1], -0.25);
    }

    #[test]
    fn friendly_codec_prefix_matches() {
        assert_eq!(friendly_codec("A_FLAC"), "FLAC");
        assert_eq!(friendly_codec("A_EAC3"), "E-AC3");
        assert_eq!(friendly_codec("A_PCM/INT/LIT"), "PCM");
        assert_eq!(friendly_codec("A_WEIRD"), "A_WEIRD");
    }

    #[test]
    fn decode_missing_file_is_source_not_found() {
        let r = runner();
        let err = decode_audio(Path::new("/no/such/file.mkv"), 0, 48000, false, &r).unwrap_err();
        assert!(matches!(err, AnalysisError::SourceNotFound(_)));
    }
}
