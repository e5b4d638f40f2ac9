//! Stepping correction: two-phase EDL generation and application.
//!
//! Phase A analyzes one designated track from the stepped source and builds
//! a verified EDL; Phase B applies that same EDL to every target audio track
//! of the source, so all its tracks receive consistent cuts.

mod assembly;
mod boundary;
mod drift_pass;
mod qa;
mod scan;
mod silence;

pub use assembly::{assemble_from_segments, choose_gap_fill, encode_flac, FillDecision};
pub use boundary::{find_boundary_in_zone, get_keyframes, parse_keyframe_packets};
pub use scan::{delay_for_chunk, filter_coarse_map, perform_coarse_scan, CoarsePoint};
pub use silence::{
    detect_speech_regions, detect_transients, find_silence_zones_ffmpeg, find_silence_zones_rms,
    parse_silencedetect_output, snap_boundary_to_silence, BoundaryAudit,
};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::edl::AudioSegment;
use super::items::split_corrected_pair;
use super::{CorrectionError, SteppingFlag};
use crate::analysis::{
    decode_audio_i32, get_audio_codec_name, get_audio_properties, select_audio_stream,
};
use crate::config::Settings;
use crate::extraction::extract_tracks;
use crate::io::CommandRunner;
use crate::models::{
    source_from_flag_key, track_id_from_flag_key, PlanItem, SteppingCorrectionMode, TrackType,
};

/// Result of stepping Phase A.
#[derive(Debug, Clone)]
pub enum SteppingOutcome {
    /// The fine scan found a single delay zone after all; the analysis delay
    /// stands (the refined measurement is logged for comparison).
    Uniform { refined_delay_ms: i64 },
    /// A verified EDL, ready to apply to every target track.
    Stepped {
        edl: Vec<AudioSegment>,
        audit: Vec<BoundaryAudit>,
    },
}

/// Stepping corrector for one source.
pub struct SteppingCorrector<'a> {
    runner: &'a CommandRunner,
    settings: &'a Settings,
}

impl<'a> SteppingCorrector<'a> {
    pub fn new(runner: &'a CommandRunner, settings: &'a Settings) -> Self {
        Self { runner, settings }
    }

    /// Phase A: coarse scan, boundary refinement, internal drift, QA.
    pub fn run(
        &self,
        ref_file: &Path,
        analysis_audio_path: &Path,
        base_delay_ms: i64,
        flag: &SteppingFlag,
    ) -> Result<SteppingOutcome, CorrectionError> {
        let logger = self.runner.logger().clone();
        let segment = &self.settings.segment;
        let stepping = &self.settings.stepping;

        let ref_selection = select_audio_stream(
            ref_file,
            self.settings.analysis.lang_source1.as_deref(),
            self.runner,
        )?;
        let analysis_selection = select_audio_stream(analysis_audio_path, None, self.runner)?;
        let (_, _, sample_rate) =
            get_audio_properties(analysis_audio_path, analysis_selection.stream_index, self.runner)?;
        let analysis_codec = get_audio_codec_name(analysis_audio_path, self.runner);

        // PCM buffers live only for this invocation and drop on return.
        let ref_pcm = decode_audio_i32(
            ref_file,
            ref_selection.stream_index,
            sample_rate,
            1,
            self.runner,
        )?;
        let analysis_pcm = decode_audio_i32(
            analysis_audio_path,
            analysis_selection.stream_index,
            sample_rate,
            1,
            self.runner,
        )?;

        let mut coarse_map =
            perform_coarse_scan(&ref_pcm, &analysis_pcm, sample_rate, segment, stepping, &logger);
        if coarse_map.is_empty() {
            return Err(CorrectionError::SteppingFailed {
                source_id: analysis_audio_path.display().to_string(),
                message: "coarse scan did not find any reliable sync points".to_string(),
            });
        }

        if let Some(diagnosis) = &flag.diagnosis {
            if diagnosis.correction_mode == SteppingCorrectionMode::Filtered {
                coarse_map =
                    filter_coarse_map(coarse_map, &diagnosis.invalid_time_ranges(), &logger);
                if coarse_map.is_empty() {
                    return Err(CorrectionError::SteppingFailed {
                        source_id: analysis_audio_path.display().to_string(),
                        message: "no reliable sync points remain after cluster filtering"
                            .to_string(),
                    });
                }
            }
        }

        // Walk the coarse map; adjacent points further apart than the triage
        // tolerance define a transition zone. A jump of exactly the
        // tolerance is not promoted.
        let mut edl = vec![AudioSegment::new(
            0.0,
            coarse_map[0].delay_ms,
            coarse_map[0].delay_raw,
        )];
        let mut audits: Vec<BoundaryAudit> = Vec::new();
        for pair in coarse_map.windows(2) {
            let (before, after) = (pair[0], pair[1]);
            if ((before.delay_ms - after.delay_ms).abs() as f64) <= segment.triage_std_dev_ms {
                continue;
            }

            let (boundary_ref_s, audit) = find_boundary_in_zone(
                &ref_pcm,
                &analysis_pcm,
                sample_rate,
                before.time_s,
                after.time_s,
                before.delay_ms,
                after.delay_ms,
                Some(ref_file),
                Some(analysis_audio_path),
                segment,
                stepping,
                self.runner,
            );
            if let Some(audit) = audit {
                audits.push(audit);
            }

            let boundary_target_s = boundary_ref_s + before.delay_ms as f64 / 1000.0;
            edl.push(AudioSegment::new(
                boundary_target_s,
                after.delay_ms,
                after.delay_raw,
            ));
        }

        edl.sort_by(|a, b| {
            a.start_s
                .partial_cmp(&b.start_s)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        edl.dedup_by(|a, b| a.start_s == b.start_s);

        if edl.len() <= 1 {
            let refined = edl.first().map(|s| s.delay_ms).unwrap_or(base_delay_ms);
            logger.message(
                "  [SteppingCorrector] No stepping detected. Audio delay is uniform throughout.",
            );
            logger.message(&format!(
                "  [SteppingCorrector] Refined delay measurement: {}ms",
                refined
            ));
            if (refined - base_delay_ms).abs() > 5 {
                logger.message(&format!(
                    "  [SteppingCorrector] Refined delay differs from the initial estimate by {}ms",
                    (refined - base_delay_ms).abs()
                ));
            }
            return Ok(SteppingOutcome::Uniform {
                refined_delay_ms: refined,
            });
        }

        let edl = drift_pass::analyze_internal_drift(
            edl,
            &ref_pcm,
            &analysis_pcm,
            sample_rate,
            &analysis_codec,
            segment,
            &logger,
        );

        logger.message("  [SteppingCorrector] Final Edit Decision List (EDL) for assembly created:");
        for (i, seg) in edl.iter().enumerate() {
            logger.message(&format!(
                "    - Action {}: At target time {:.3}s, delay = {}ms (raw: {:.3}ms), drift = {:+.2} ms/s",
                i + 1,
                seg.start_s,
                seg.delay_ms,
                seg.delay_raw,
                seg.drift_rate_ms_s
            ));
        }

        // QA: assemble a synthetic mono track following the EDL and
        // re-correlate it against the reference.
        logger.message("  [SteppingCorrector] Assembling temporary QA track...");
        let qa_track_path = analysis_audio_path
            .parent()
            .unwrap_or(Path::new("."))
            .join("qa_track.flac");
        assemble_from_segments(
            &analysis_pcm,
            &edl,
            1,
            "mono",
            sample_rate,
            &qa_track_path,
            "QA",
            Some(&ref_pcm),
            segment,
            stepping,
            self.runner,
        )?;

        if !qa::qa_check(
            &qa_track_path,
            ref_file,
            edl[0].delay_ms,
            flag,
            &self.settings.analysis,
            segment,
            self.runner,
        ) {
            return Err(CorrectionError::QaFailed {
                source_id: analysis_audio_path.display().to_string(),
            });
        }

        Ok(SteppingOutcome::Stepped { edl, audit: audits })
    }

    /// Phase B: decode one target at its own channel count and apply the
    /// EDL. Returns the corrected FLAC path.
    pub fn apply_plan_to_file(
        &self,
        target_audio_path: &Path,
        edl: &[AudioSegment],
        temp_dir: &Path,
        ref_file: Option<&Path>,
    ) -> Result<PathBuf, CorrectionError> {
        let logger = self.runner.logger().clone();
        let selection = select_audio_stream(target_audio_path, None, self.runner)?;
        let (channels, layout, sample_rate) =
            get_audio_properties(target_audio_path, selection.stream_index, self.runner)?;

        let ref_pcm = match ref_file {
            Some(path) => {
                logger.message(
                    "  [SteppingCorrector] Decoding reference audio for Smart Fill capability...",
                );
                let ref_selection = select_audio_stream(
                    path,
                    self.settings.analysis.lang_source1.as_deref(),
                    self.runner,
                )?;
                match decode_audio_i32(path, ref_selection.stream_index, sample_rate, 1, self.runner)
                {
                    Ok(pcm) => Some(pcm),
                    Err(e) => {
                        logger.warn(&format!(
                            "Failed to decode reference audio, Smart Fill disabled: {}",
                            e
                        ));
                        None
                    }
                }
            }
            None => None,
        };

        logger.message(&format!(
            "  [SteppingCorrector] Applying correction plan to '{}' ({})...",
            target_audio_path.display(),
            layout
        ));
        let target_pcm = decode_audio_i32(
            target_audio_path,
            selection.stream_index,
            sample_rate,
            channels,
            self.runner,
        )?;

        let stem = target_audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_string());
        let corrected_path = temp_dir.join(format!("corrected_{}.flac", stem));

        assemble_from_segments(
            &target_pcm,
            edl,
            channels,
            &layout,
            sample_rate,
            &corrected_path,
            "Final",
            ref_pcm.as_deref(),
            &self.settings.segment,
            &self.settings.stepping,
            self.runner,
        )?;

        logger.success(&format!(
            "Stepping correction applied successfully for '{}'",
            target_audio_path.display()
        ));
        Ok(corrected_path)
    }
}

/// Drive stepping correction across every flagged source.
///
/// Returns stepping EDLs keyed by source for subtitle processing. Corrected
/// and preserved plan items are updated/appended in place.
pub fn run_stepping_correction(
    items: &mut Vec<PlanItem>,
    segment_flags: &BTreeMap<String, SteppingFlag>,
    sources: &BTreeMap<String, PathBuf>,
    temp_dir: &Path,
    settings: &Settings,
    runner: &CommandRunner,
) -> Result<BTreeMap<String, Vec<AudioSegment>>, CorrectionError> {
    let logger = runner.logger().clone();
    let corrector = SteppingCorrector::new(runner, settings);
    let ref_file = sources.get(crate::models::REFERENCE_SOURCE).cloned();
    let mut stepping_edls = BTreeMap::new();

    for (flag_key, flag) in segment_flags {
        let source_key = source_from_flag_key(flag_key).to_string();

        let target_indices: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                item.track.source == source_key
                    && item.track.track_type == TrackType::Audio
                    && !item.is_preserved
            })
            .map(|(i, _)| i)
            .collect();

        if target_indices.is_empty() && !flag.subs_only {
            logger.message(&format!(
                "[SteppingCorrection] Skipping {}: No audio tracks found in layout to correct.",
                source_key
            ));
            continue;
        }
        if flag.subs_only {
            logger.message(&format!(
                "[SteppingCorrection] Running full analysis for {} (subs-only mode - no audio to apply).",
                source_key
            ));
        }

        // The analysis track is the flagged one; extract it internally when
        // the layout did not include it.
        let analysis_path = match items.iter().find(|item| item.track.flag_key() == *flag_key) {
            Some(item) => item
                .extracted_path
                .clone()
                .ok_or_else(|| CorrectionError::MissingPayload {
                    track: flag_key.clone(),
                })?,
            None => {
                logger.message(&format!(
                    "[SteppingCorrection] Analysis track {} not in layout. Extracting internally...",
                    flag_key
                ));
                let container = sources.get(&source_key).ok_or_else(|| {
                    CorrectionError::SteppingFailed {
                        source_id: source_key.clone(),
                        message: "source container path missing".to_string(),
                    }
                })?;
                let track_id =
                    track_id_from_flag_key(flag_key).ok_or_else(|| CorrectionError::SteppingFailed {
                        source_id: source_key.clone(),
                        message: format!("malformed flag key '{}'", flag_key),
                    })?;
                let extracted = extract_tracks(
                    container,
                    temp_dir,
                    runner,
                    &format!("{}_internal", source_key),
                    Some(&[track_id]),
                )
                .map_err(|e| CorrectionError::SteppingFailed {
                    source_id: source_key.clone(),
                    message: format!("internal extraction failed: {}", e),
                })?;
                extracted
                    .first()
                    .map(|t| t.path.clone())
                    .ok_or_else(|| CorrectionError::SteppingFailed {
                        source_id: source_key.clone(),
                        message: "internal extraction produced no track".to_string(),
                    })?
            }
        };

        let ref_path = ref_file.as_ref().ok_or_else(|| CorrectionError::SteppingFailed {
            source_id: source_key.clone(),
            message: "reference source missing".to_string(),
        })?;

        match corrector.run(ref_path, &analysis_path, flag.base_delay_ms, flag)? {
            SteppingOutcome::Uniform { refined_delay_ms } => {
                logger.message(&format!(
                    "[SteppingCorrection] No stepping found. Refined uniform delay is {} ms.",
                    refined_delay_ms
                ));
                logger.message(
                    "[SteppingCorrection] The globally-shifted delay from the main analysis will be used.",
                );
            }
            SteppingOutcome::Stepped { edl, .. } => {
                stepping_edls.insert(source_key.clone(), edl.clone());

                if flag.subs_only {
                    logger.message(&format!(
                        "[SteppingCorrection] Analysis successful (subs-only). Verified EDL with {} segment(s) stored for subtitle adjustment.",
                        edl.len()
                    ));
                    continue;
                }

                logger.message(&format!(
                    "[SteppingCorrection] Analysis successful. Applying correction plan to {} audio track(s) from {}.",
                    target_indices.len(),
                    source_key
                ));

                let mut preserved_items = Vec::new();
                for idx in &target_indices {
                    let item = &mut items[*idx];
                    let target_path = item.extracted_path.clone().ok_or_else(|| {
                        CorrectionError::MissingPayload {
                            track: item.track.flag_key(),
                        }
                    })?;
                    let corrected = corrector.apply_plan_to_file(
                        &target_path,
                        &edl,
                        temp_dir,
                        Some(ref_path),
                    )?;
                    preserved_items.push(split_corrected_pair(
                        item,
                        corrected,
                        &settings.stepping.corrected_track_label,
                        &settings.stepping.preserved_track_label,
                    ));
                }
                items.extend(preserved_items);
            }
        }
    }

    Ok(stepping_edls)
}
