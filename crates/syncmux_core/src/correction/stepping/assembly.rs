//! EDL assembly: apply per-segment delays to PCM and emit a FLAC.
//!
//! Walks the EDL in order. A positive delay change widens a gap (smart fill
//! decides silence vs reference content); a negative change drops the head
//! of the upcoming segment. Segments are encoded individually, optionally
//! time-stretched for internal drift, then concatenated losslessly.

use std::fs;
use std::path::{Path, PathBuf};

use super::scan::normalize_i32;
use crate::analysis::methods::support::xcorr_full;
use crate::config::{SegmentSettings, SteppingSettings};
use crate::correction::edl::AudioSegment;
use crate::correction::resample::{build_tempo_filter, drift_tempo_ratio, engine_failure_hint, resample_command};
use crate::correction::CorrectionError;
use crate::io::{argv, CommandRunner};
use crate::models::FillMode;

const SILENCE_STD_I32: f64 = 100.0;
/// Delay changes at or below this are absorbed rather than edited.
const MIN_EDIT_MS: i64 = 10;
/// Segments drifting slower than this are not worth a resample pass.
const MIN_DRIFT_RATE_MS_S: f64 = 0.5;

/// What fills a widened gap.
#[derive(Debug, Clone, PartialEq)]
pub enum FillDecision {
    /// Insert this mono PCM from the reference (correlation score attached).
    Content(Vec<i32>, f64),
    Silence,
}

/// Decide how to fill a gap of `gap_ms` at `boundary_s_target`.
///
/// In auto mode the candidate reference content is correlated against the
/// target around the boundary: a weak correlation means the content is
/// missing from the target and the reference fills the gap; a strong one
/// means the content already exists and silence is inserted.
pub fn choose_gap_fill(
    ref_pcm: &[i32],
    target_mono: &[i32],
    boundary_s_target: f64,
    gap_ms: i64,
    sample_rate: u32,
    current_delay_ms: i64,
    settings: &SteppingSettings,
    runner: &CommandRunner,
) -> FillDecision {
    let logger = runner.logger().clone();
    if settings.fill_mode == FillMode::Silence {
        return FillDecision::Silence;
    }

    let gap_samples = (gap_ms as f64 / 1000.0 * sample_rate as f64) as usize;
    if gap_samples == 0 {
        return FillDecision::Silence;
    }

    // The gap sits on the target timeline; the matching reference position
    // is offset by the current delay. Positive delay = target early, so the
    // reference position is later... converted the other way.
    let boundary_s_ref = (boundary_s_target - current_delay_ms as f64 / 1000.0).max(0.0);
    let boundary_sample_ref = (boundary_s_ref * sample_rate as f64) as usize;

    logger.message(&format!(
        "      [Smart Fill] Target boundary: {:.3}s, current delay: {:+}ms -> reference position: {:.3}s",
        boundary_s_target, current_delay_ms, boundary_s_ref
    ));

    if boundary_sample_ref + gap_samples > ref_pcm.len() {
        logger.message("      [Smart Fill] Insufficient reference audio for content search.");
        return FillDecision::Silence;
    }
    let candidate = &ref_pcm[boundary_sample_ref..boundary_sample_ref + gap_samples];

    let (candidate_norm, candidate_std) = normalize_i32(candidate);
    if candidate_std < SILENCE_STD_I32 {
        logger.message("      [Smart Fill] Reference has silence at position -> using silence fill");
        return FillDecision::Silence;
    }

    if settings.fill_mode == FillMode::Content {
        logger.message(&format!(
            "      [Smart Fill] Extracting {}ms from reference at {:.3}s (forced mode)",
            gap_ms, boundary_s_ref
        ));
        return FillDecision::Content(candidate.to_vec(), 1.0);
    }

    // Auto: check whether the candidate already exists in the target.
    let search_samples = (settings.content_search_window_s * sample_rate as f64) as usize;
    let boundary_sample_target = (boundary_s_target * sample_rate as f64) as usize;
    let search_start = boundary_sample_target.saturating_sub(search_samples);
    let search_end = (boundary_sample_target + search_samples).min(target_mono.len());

    if search_end > search_start && search_end - search_start > gap_samples {
        let region = &target_mono[search_start..search_end];
        let (region_norm, region_std) = normalize_i32(region);
        if region_std > SILENCE_STD_I32 {
            let (c, _) = xcorr_full(&candidate_norm, &region_norm);
            let max_corr = c.iter().cloned().fold(0.0f64, f64::max);
            let normalized_corr = max_corr / candidate_norm.len() as f64;

            logger.message(&format!(
                "      [Smart Fill] Content correlation: {:.3} (threshold: {:.3})",
                normalized_corr, settings.content_correlation_threshold
            ));

            return if normalized_corr < settings.content_correlation_threshold {
                logger.message(
                    "      [Smart Fill] Content appears to be missing from target -> extracting from reference",
                );
                FillDecision::Content(candidate.to_vec(), normalized_corr)
            } else {
                logger.message("      [Smart Fill] Content already exists in target -> using silence");
                FillDecision::Silence
            };
        }
    }

    logger.message(&format!(
        "      [Smart Fill] Using reference content at {:.3}s (auto mode, unable to verify)",
        boundary_s_ref
    ));
    FillDecision::Content(candidate.to_vec(), 0.5)
}

/// Assemble corrected audio from `pcm` (interleaved) following the EDL and
/// write a FLAC to `out_path`.
///
/// Temporary segment files live in `assembly_{stem}/` next to the output;
/// the directory is removed on success and kept on failure.
#[allow(clippy::too_many_arguments)]
pub fn assemble_from_segments(
    pcm: &[i32],
    edl: &[AudioSegment],
    channels: u32,
    channel_layout: &str,
    sample_rate: u32,
    out_path: &Path,
    log_prefix: &str,
    ref_pcm: Option<&[i32]>,
    segment_settings: &SegmentSettings,
    stepping_settings: &SteppingSettings,
    runner: &CommandRunner,
) -> Result<(), CorrectionError> {
    let logger = runner.logger().clone();
    logger.message(&format!(
        "  [{}] Assembling audio from {} segment(s) via the encoder...",
        log_prefix,
        edl.len()
    ));

    let stem = out_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let assembly_dir = out_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("assembly_{}", stem));
    fs::create_dir_all(&assembly_dir)?;

    let result = assemble_inner(
        pcm,
        edl,
        channels,
        channel_layout,
        sample_rate,
        out_path,
        ref_pcm,
        &assembly_dir,
        segment_settings,
        stepping_settings,
        runner,
    );

    if result.is_ok() {
        let _ = fs::remove_dir_all(&assembly_dir);
    }
    result
}

#[allow(clippy::too_many_arguments)]
fn assemble_inner(
    pcm: &[i32],
    edl: &[AudioSegment],
    channels: u32,
    channel_layout: &str,
    sample_rate: u32,
    out_path: &Path,
    ref_pcm: Option<&[i32]>,
    assembly_dir: &Path,
    segment_settings: &SegmentSettings,
    stepping_settings: &SteppingSettings,
    runner: &CommandRunner,
) -> Result<(), CorrectionError> {
    let logger = runner.logger().clone();
    let channels_usize = channels as usize;
    let pcm_duration_s = pcm.len() as f64 / (sample_rate as f64 * channels as f64);

    let mut segment_files: Vec<PathBuf> = Vec::new();
    let mut cursor = edl
        .first()
        .map(|s| s.delay_ms)
        .ok_or_else(|| CorrectionError::AssemblyFailed {
            message: "empty EDL".to_string(),
        })?;

    for (i, segment) in edl.iter().enumerate() {
        let delta_ms = segment.delay_ms - cursor;

        if delta_ms.abs() > MIN_EDIT_MS {
            if delta_ms > 0 {
                let fill = match ref_pcm {
                    Some(reference) => {
                        let target_mono = mono_view(pcm, channels_usize);
                        choose_gap_fill(
                            reference,
                            &target_mono,
                            segment.start_s,
                            delta_ms,
                            sample_rate,
                            cursor,
                            stepping_settings,
                            runner,
                        )
                    }
                    None => FillDecision::Silence,
                };

                match fill {
                    FillDecision::Content(mono, score) => {
                        logger.message(&format!(
                            "    - At {:.3}s: Inserting {}ms of CONTENT from reference (Smart Fill, correlation={:.3}).",
                            segment.start_s, delta_ms, score
                        ));
                        let interleaved = spread_mono(&mono, channels_usize);
                        let path = assembly_dir.join(format!("content_{:03}.flac", i));
                        encode_flac(&interleaved, sample_rate, channels, channel_layout, &path, runner)?;
                        segment_files.push(path);
                    }
                    FillDecision::Silence => {
                        logger.message(&format!(
                            "    - At {:.3}s: Inserting {}ms of silence.",
                            segment.start_s, delta_ms
                        ));
                        let silence_frames =
                            (delta_ms as f64 / 1000.0 * sample_rate as f64) as usize;
                        let silence = vec![0i32; silence_frames * channels_usize];
                        let path = assembly_dir.join(format!("silence_{:03}.flac", i));
                        encode_flac(&silence, sample_rate, channels, channel_layout, &path, runner)?;
                        segment_files.push(path);
                    }
                }
            } else {
                logger.message(&format!(
                    "    - At {:.3}s: Removing {}ms of audio.",
                    segment.start_s, -delta_ms
                ));
            }
        }

        cursor = segment.delay_ms;

        let mut seg_start_s = segment.start_s;
        let seg_end_s = edl
            .get(i + 1)
            .map(|next| next.start_s)
            .unwrap_or(pcm_duration_s);
        if delta_ms < -MIN_EDIT_MS {
            seg_start_s += (-delta_ms) as f64 / 1000.0;
        }
        if seg_end_s <= seg_start_s {
            continue;
        }

        let start_sample = (seg_start_s * sample_rate as f64) as usize * channels_usize;
        let end_sample =
            (((seg_end_s * sample_rate as f64) as usize) * channels_usize).min(pcm.len());
        if end_sample <= start_sample {
            continue;
        }

        let mut segment_file = assembly_dir.join(format!("segment_{:03}.flac", i));
        encode_flac(
            &pcm[start_sample..end_sample],
            sample_rate,
            channels,
            channel_layout,
            &segment_file,
            runner,
        )?;

        if segment.drift_rate_ms_s.abs() > MIN_DRIFT_RATE_MS_S {
            logger.message(&format!(
                "    - Applying drift correction ({:+.2} ms/s) to segment {}.",
                segment.drift_rate_ms_s, i
            ));
            let tempo = drift_tempo_ratio(segment.drift_rate_ms_s);
            let corrected_file = assembly_dir.join(format!("segment_{:03}_corrected.flac", i));
            let chain = build_tempo_filter(segment_settings, tempo, sample_rate);
            runner
                .run(&resample_command(&segment_file, &corrected_file, &chain))
                .map_err(|source| CorrectionError::ResampleFailed {
                    file: segment_file.display().to_string(),
                    hint: engine_failure_hint(segment_settings.resample_engine).to_string(),
                    source,
                })?;
            segment_file = corrected_file;
        }
        segment_files.push(segment_file);
    }

    if segment_files.is_empty() {
        return Err(CorrectionError::AssemblyFailed {
            message: "no segments were generated for assembly".to_string(),
        });
    }

    // Lossless concat of the per-segment FLACs.
    let concat_list_path = assembly_dir.join("concat_list.txt");
    let list: String = segment_files
        .iter()
        .map(|p| {
            format!(
                "file '{}'\n",
                p.file_name().unwrap_or_default().to_string_lossy()
            )
        })
        .collect();
    fs::write(&concat_list_path, list)?;

    let concat_cmd = argv([
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        concat_list_path.to_string_lossy().into_owned(),
        "-map_metadata".to_string(),
        "-1".to_string(),
        "-fflags".to_string(),
        "+bitexact".to_string(),
        "-c:a".to_string(),
        "flac".to_string(),
        out_path.to_string_lossy().into_owned(),
    ]);
    runner.run(&concat_cmd)?;
    Ok(())
}

/// Channel 0 of interleaved PCM (used for smart-fill correlation).
fn mono_view(pcm: &[i32], channels: usize) -> Vec<i32> {
    if channels <= 1 {
        return pcm.to_vec();
    }
    pcm.iter().step_by(channels).copied().collect()
}

/// Duplicate mono PCM across all channels, interleaved.
fn spread_mono(mono: &[i32], channels: usize) -> Vec<i32> {
    if channels <= 1 {
        return mono.to_vec();
    }
    let mut out = Vec::with_capacity(mono.len() * channels);
    for &sample in mono {
        for _ in 0..channels {
            out.push(sample);
        }
    }
    out
}

/// Encode raw interleaved s32le PCM to FLAC via the external encoder's
/// stdin.
pub fn encode_flac(
    samples: &[i32],
    sample_rate: u32,
    channels: u32,
    channel_layout: &str,
    out_path: &Path,
    runner: &CommandRunner,
) -> Result<(), CorrectionError> {
    let cmd = argv([
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-nostdin".to_string(),
        "-f".to_string(),
        "s32le".to_string(),
        "-ar".to_string(),
        sample_rate.to_string(),
        "-ac".to_string(),
        channels.to_string(),
        "-channel_layout".to_string(),
        channel_layout.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-map_metadata".to_string(),
        "-1".to_string(),
        "-fflags".to_string(),
        "+bitexact".to_string(),
        "-c:a".to_string(),
        "flac".to_string(),
        out_path.to_string_lossy().into_owned(),
    ]);

    let bytes = i32_to_le_bytes(samples);
    runner.run_binary(&cmd, Some(&bytes))?;
    Ok(())
}

fn i32_to_le_bytes(samples: &[i32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}
