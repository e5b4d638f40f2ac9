//! Track demuxing.
//!
//! Extracts the selected tracks to the job temp directory, verifies every
//! output exists and is non-empty, and on failure produces a per-track
//! report naming exactly which track broke and how to reproduce the
//! extraction by hand.

use std::path::{Path, PathBuf};

use super::probe::probe_file;
use super::types::{ExtractedTrack, ExtractionError, ExtractionResult, ProbeResult, ProbeTrack};
use crate::io::{argv, CommandRunner};
use crate::models::TrackType;

/// Extract tracks from one source container.
///
/// `specific_tracks` limits extraction to the listed ids; `None` extracts
/// every track. A_MS/ACM audio cannot be demuxed raw: it goes through a
/// stream-copy to WAV, falling back to PCM at the container bit depth.
pub fn extract_tracks(
    container: &Path,
    temp_dir: &Path,
    runner: &CommandRunner,
    role: &str,
    specific_tracks: Option<&[u64]>,
) -> ExtractionResult<Vec<ExtractedTrack>> {
    let probe = probe_file(container, runner)?;
    let stem = container
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    let safe_role = role.replace(' ', "_");

    let mut records: Vec<ExtractedTrack> = Vec::new();
    let mut specs: Vec<(u64, PathBuf)> = Vec::new();
    let mut acm_jobs: Vec<(usize, u64, PathBuf, String, String)> = Vec::new();

    let mut audio_index: isize = -1;
    for track in &probe.tracks {
        if track.track_type == TrackType::Audio {
            audio_index += 1;
        }
        if let Some(wanted) = specific_tracks {
            if !wanted.contains(&track.id) {
                continue;
            }
        }

        let ext = ext_for_codec(track.track_type, &track.codec_id);
        let out_path = temp_dir.join(format!("{}_track_{}_{}.{}", safe_role, stem, track.id, ext));

        let mut record = ExtractedTrack {
            id: track.id,
            track_type: track.track_type,
            codec_id: track.codec_id.clone(),
            language: track.language.clone(),
            name: track.name.clone(),
            source: role.to_string(),
            path: out_path.clone(),
        };

        if track.track_type == TrackType::Audio && track.codec_id.to_uppercase().contains("A_MS/ACM")
        {
            let wav_path = out_path.with_extension("wav");
            record.path = wav_path.clone();
            let pcm_codec = pcm_codec_from_bit_depth(track.audio_bits_per_sample);
            acm_jobs.push((
                audio_index as usize,
                track.id,
                wav_path,
                pcm_codec,
                display_name(track),
            ));
        } else {
            specs.push((track.id, out_path));
        }
        records.push(record);
    }

    if !specs.is_empty() {
        runner.logger().message(&format!(
            "[{}] Extracting {} track(s) with mkvextract...",
            role,
            specs.len()
        ));
        let mut cmd = argv([
            "mkvextract".to_string(),
            container.to_string_lossy().into_owned(),
            "tracks".to_string(),
        ]);
        for (tid, path) in &specs {
            cmd.push(format!("{}:{}", tid, path.display()));
        }

        let run_result = runner.run(&cmd);
        if let Err(crate::io::RunnerError::Cancelled) = &run_result {
            return Err(ExtractionError::Runner(crate::io::RunnerError::Cancelled));
        }

        // Verify outputs whether or not the extractor claimed success;
        // a missing or empty file is a failure either way.
        let failures = verify_outputs(&specs, &probe);
        if run_result.is_err() || !failures.is_empty() {
            let report = build_failure_report(container, role, temp_dir, &specs, &probe);
            runner.logger().error(&report);
            return Err(ExtractionError::TrackFailure { report });
        }
        runner.logger().message(&format!(
            "[{}] Successfully extracted {} track(s)",
            role,
            specs.len()
        ));
    }

    for (stream_idx, tid, out_path, pcm_codec, name) in acm_jobs {
        runner.logger().message(&format!(
            "[{}] Extracting A_MS/ACM track '{}' (ID {})...",
            role, name, tid
        ));
        let copy_cmd = acm_command(container, stream_idx, &out_path, None);
        if runner.run(&copy_cmd).is_err() {
            runner.logger().message(&format!(
                "[{}] Stream copy refused. Falling back to PCM ({})...",
                role, pcm_codec
            ));
            let pcm_cmd = acm_command(container, stream_idx, &out_path, Some(&pcm_codec));
            if runner.run(&pcm_cmd).is_err() {
                let report = format!(
                    "A_MS/ACM AUDIO EXTRACTION FAILED\n\
                     Source: {role}\nFile: {file}\nTrack: {name} (ID {tid})\nCodec: A_MS/ACM\n\
                     Both stream copy and PCM conversion failed.\n\
                     Troubleshooting:\n  1. Try playing this audio track in a player\n  \
                     2. Try: mkvextract \"{file}\" tracks {tid}:test.wav\n  \
                     3. Consider remuxing the source file",
                    role = role,
                    file = container.display(),
                    name = name,
                    tid = tid,
                );
                runner.logger().error(&report);
                return Err(ExtractionError::TrackFailure { report });
            }
            runner
                .logger()
                .message(&format!("[{}] Converted to {}", role, pcm_codec));
        }
    }

    Ok(records)
}

fn acm_command(
    container: &Path,
    stream_idx: usize,
    out_path: &Path,
    pcm_codec: Option<&str>,
) -> Vec<String> {
    let mut cmd = argv([
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-nostdin".to_string(),
        "-i".to_string(),
        container.to_string_lossy().into_owned(),
        "-map".to_string(),
        format!("0:a:{}", stream_idx),
        "-vn".to_string(),
        "-sn".to_string(),
    ]);
    match pcm_codec {
        Some(codec) => {
            cmd.push("-acodec".to_string());
            cmd.push(codec.to_string());
        }
        None => {
            cmd.push("-c:a".to_string());
            cmd.push("copy".to_string());
        }
    }
    cmd.push(out_path.to_string_lossy().into_owned());
    cmd
}

fn display_name(track: &ProbeTrack) -> String {
    if track.name.is_empty() {
        format!("Track {}", track.id)
    } else {
        track.name.clone()
    }
}

fn verify_outputs(specs: &[(u64, PathBuf)], probe: &ProbeResult) -> Vec<(u64, String)> {
    let mut failures = Vec::new();
    for (tid, path) in specs {
        let status = if !path.exists() {
            Some("not created")
        } else if path.metadata().map(|m| m.len()).unwrap_or(0) == 0 {
            Some("empty (0 bytes)")
        } else {
            None
        };
        if let Some(status) = status {
            let label = probe
                .track(*tid)
                .map(display_name)
                .unwrap_or_else(|| format!("Track {}", tid));
            failures.push((*tid, format!("{} - {}", label, status)));
        }
    }
    failures
}

fn build_failure_report(
    container: &Path,
    role: &str,
    temp_dir: &Path,
    specs: &[(u64, PathBuf)],
    probe: &ProbeResult,
) -> String {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for (tid, path) in specs {
        let track = probe.track(*tid);
        let label = track.map(display_name).unwrap_or_else(|| format!("Track {}", tid));
        let kind = track.map(|t| t.track_type.to_string()).unwrap_or_default();
        let lang = track.map(|t| t.language.clone()).unwrap_or_default();
        let codec = track.map(|t| t.codec_id.clone()).unwrap_or_default();
        let size = path.metadata().map(|m| m.len()).unwrap_or(0);
        if path.exists() && size > 0 {
            succeeded.push(format!(
                "  + {} (ID {}, {}, {}, {}) [{:.1} MB]",
                label,
                tid,
                kind,
                lang,
                codec,
                size as f64 / (1024.0 * 1024.0)
            ));
        } else {
            let status = if path.exists() { "empty (0 bytes)" } else { "not created" };
            failed.push((*tid, format!("  x {} (ID {}, {}, {}, {}) - {}", label, tid, kind, lang, codec, status)));
        }
    }

    let mut report = String::new();
    report.push_str("EXTRACTION FAILED\n");
    report.push_str(&format!("Source: {}\n", role));
    report.push_str(&format!("File: {}\n\n", container.display()));

    if !succeeded.is_empty() {
        report.push_str(&format!("Successfully extracted ({} tracks):\n", succeeded.len()));
        report.push_str(&succeeded.join("\n"));
        report.push_str("\n\n");
    }
    if !failed.is_empty() {
        report.push_str(&format!("FAILED to extract ({} tracks):\n", failed.len()));
        report.push_str(
            &failed
                .iter()
                .map(|(_, line)| line.clone())
                .collect::<Vec<_>>()
                .join("\n"),
        );
        report.push_str("\n\n");
    } else {
        report.push_str("All tracks appear extracted, but the extractor returned an error.\n\n");
    }

    report.push_str(
        "Possible causes:\n  \
         - Corrupted track data in the source file\n  \
         - Insufficient disk space in the temp directory\n  \
         - Insufficient read/write permissions\n  \
         - Unsupported codec or malformed stream data\n\n",
    );
    report.push_str("Troubleshooting:\n");
    report.push_str(&format!(
        "  1. Verify source integrity: mkvmerge -i \"{}\"\n",
        container.display()
    ));
    if !failed.is_empty() {
        report.push_str("  2. Try extracting failed track(s) manually:\n");
        for (tid, _) in failed.iter().take(3) {
            report.push_str(&format!(
                "     mkvextract \"{}\" tracks {}:test_track_{}.bin\n",
                container.display(),
                tid,
                tid
            ));
        }
    }
    report.push_str(&format!("  3. Check disk space in: {}\n", temp_dir.display()));
    report
}

/// Map a codec id to the payload extension the extractor should write.
pub fn ext_for_codec(track_type: TrackType, codec_id: &str) -> &'static str {
    let cid = codec_id.to_uppercase();
    match track_type {
        TrackType::Video => {
            if cid.contains("V_MPEGH/ISO/HEVC") {
                "h265"
            } else if cid.contains("V_MPEG4/ISO/AVC") {
                "h264"
            } else if cid.contains("V_MPEG") {
                "mpg"
            } else if cid.contains("V_VP9") {
                "vp9"
            } else if cid.contains("V_AV1") {
                "av1"
            } else {
                "bin"
            }
        }
        TrackType::Audio => {
            if cid.contains("A_TRUEHD") {
                "thd"
            } else if cid.contains("A_EAC3") {
                "eac3"
            } else if cid.contains("A_AC3") {
                "ac3"
            } else if cid.contains("A_DTS") {
                "dts"
            } else if cid.contains("A_AAC") {
                "aac"
            } else if cid.contains("A_FLAC") {
                "flac"
            } else if cid.contains("A_OPUS") {
                "opus"
            } else if cid.contains("A_VORBIS") {
                "ogg"
            } else if cid.contains("A_PCM") {
                "wav"
            } else {
                "bin"
            }
        }
        TrackType::Subtitles => {
            if cid.contains("S_TEXT/ASS") {
                "ass"
            } else if cid.contains("S_TEXT/SSA") {
                "ssa"
            } else if cid.contains("S_TEXT/UTF8") {
                "srt"
            } else if cid.contains("S_HDMV/PGS") {
                "sup"
            } else if cid.contains("S_VOBSUB") {
                "sub"
            } else {
                "sub"
            }
        }
    }
}

/// PCM encoder name for a container bit depth.
pub fn pcm_codec_from_bit_depth(bit_depth: Option<u32>) -> String {
    match bit_depth.unwrap_or(16) {
        d if d >= 64 => "pcm_f64le",
        d if d >= 32 => "pcm_s32le",
        d if d >= 24 => "pcm_s24le",
        _ => "pcm_s16le",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_extension_mapping() {
        assert_eq!(ext_for_codec(TrackType::Video, "V_MPEGH/ISO/HEVC"), "h265");
        assert_eq!(ext_for_codec(TrackType::Video, "V_MPEG4/ISO/AVC"), "h264");
        assert_eq!(ext_for_codec(TrackType::Audio, "A_EAC3"), "eac3");
        assert_eq!(ext_for_codec(TrackType::Audio, "A_AC3"), "ac3");
        assert_eq!(ext_for_codec(TrackType::Audio, "A_PCM/INT/LIT"), "wav");
        assert_eq!(ext_for_codec(TrackType::Subtitles, "S_TEXT/ASS"), "ass");
        assert_eq!(ext_for_codec(TrackType::Subtitles, "S_HDMV/PGS"), "sup");
        assert_eq!(ext_for_codec(TrackType::Subtitles, "S_WEIRD"), "sub");
    }

    #[test]
    fn pcm_codec_follows_bit_depth() {
        assert_eq!(pcm_codec_from_bit_depth(Some(16)), "pcm_s16le");
        assert_eq!(pcm_codec_from_bit_depth(Some(24)), "pcm_s24le");
        assert_eq!(pcm_codec_from_bit_depth(Some(32)), "pcm_s32le");
        assert_eq!(pcm_codec_from_bit_depth(Some(64)), "pcm_f64le");
        assert_eq!(pcm_codec_from_bit_depth(None), "pcm_s16le");
    }

    #[test]
    fn failure_report_names_the_broken_track() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.ac3");
        std::fs::write(&good, b"payload").unwrap();
        let missing = dir.path().join("missing.aac");

        let probe = ProbeResult {
            tracks: vec![
                ProbeTrack {
                    id: 1,
                    track_type: TrackType::Audio,
                    codec_id: "A_AC3".into(),
                    language: "eng".into(),
                    name: "Main".into(),
                    is_default: true,
                    is_forced: false,
                    container_delay_ms: 0,
                    audio_channels: Some(6),
                    audio_sampling_frequency: Some(48000),
                    audio_bits_per_sample: None,
                    pixel_dimensions: None,
                },
                ProbeTrack {
                    id: 2,
                    track_type: TrackType::Audio,
                    codec_id: "A_AAC".into(),
                    language: "jpn".into(),
                    name: "Commentary".into(),
                    is_default: false,
                    is_forced: false,
                    container_delay_ms: 0,
                    audio_channels: Some(2),
                    audio_sampling_frequency: Some(48000),
                    audio_bits_per_sample: None,
                    pixel_dimensions: None,
                },
            ],
            ..Default::default()
        };
        let specs = vec![(1, good), (2, missing)];
        let report = build_failure_report(
            Path::new("/media/source2.mkv"),
            "Source 2",
            dir.path(),
            &specs,
            &probe,
        );

        assert!(report.contains("Source: Source 2"));
        assert!(report.contains("Commentary"));
        assert!(report.contains("A_AAC"));
        assert!(report.contains("not created"));
        assert!(report.contains("mkvextract"));
        // The healthy track is listed as extracted.
        assert!(report.contains("Main"));
    }
}
