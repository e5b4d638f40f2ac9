//! Analysis step: per-source correlation, delay selection, diagnosis, and
//! the global shift.

use crate::analysis::{
    apply_global_shift, calculate_delay_chain, calculate_global_shift, diagnose,
    evaluate_stability, get_container_delay_info, get_selector, get_video_framerate,
    run_audio_correlation, run_videodiff, AnalysisError, Diagnosis, SelectorConfig,
};
use crate::correction::SteppingFlag;
use crate::models::{AnalysisMode, TrackType, REFERENCE_SOURCE};
use crate::orchestrator::context::{JobContext, JobState, StepOutcome};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;

pub struct AnalyzeStep;

impl AnalyzeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnalyzeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for AnalyzeStep {
    fn name(&self) -> &str {
        "Analyze"
    }

    fn validate_input(&self, ctx: &JobContext, _state: &JobState) -> StepResult<()> {
        let Some(reference) = ctx.reference_path() else {
            return Err(StepError::invalid_input("job is missing Source 1"));
        };
        if !reference.exists() {
            return Err(StepError::invalid_input(format!(
                "Source 1 not found: {}",
                reference.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &JobContext, state: &mut JobState) -> StepResult<StepOutcome> {
        let logger = ctx.logger().clone();
        let reference = ctx.reference_path().expect("validated").clone();
        let analysis = &ctx.settings.analysis;

        state.reference_framerate = get_video_framerate(&reference, &ctx.runner);
        state.source1_container = get_container_delay_info(&reference, &ctx.runner).ok();

        for (source_key, source_file) in &ctx.spec.sources {
            if source_key == REFERENCE_SOURCE {
                continue;
            }
            if is_subtitle_file(source_file) {
                // Loose subtitle sources have nothing to correlate; their
                // items ride a sync anchor instead.
                continue;
            }

            logger.message(&format!(
                "Analyzing {} file ({:?})...",
                source_key, analysis.mode
            ));

            if analysis.mode == AnalysisMode::VideoDiff {
                let (delay_ms, _error) =
                    run_videodiff(&reference, source_file, &ctx.settings, &ctx.runner)?;
                logger.message(&format!("Final {} delay: {} ms", source_key, delay_ms));
                state.delays.set(source_key.clone(), delay_ms as f64);
                continue;
            }

            let run = run_audio_correlation(
                &reference,
                source_file,
                analysis,
                &ctx.runner,
                analysis.lang_source1.as_deref(),
                analysis.lang_others.as_deref(),
                source_key,
            )?;

            let accepted: Vec<_> = run.chunks.iter().filter(|c| c.accepted).cloned().collect();
            if accepted.len() < analysis.min_accepted_chunks as usize {
                return Err(StepError::Analysis(AnalysisError::InsufficientChunks {
                    accepted: accepted.len(),
                    required: analysis.min_accepted_chunks as usize,
                }));
            }

            let selector_config = SelectorConfig::from(analysis);
            let selection = get_selector(analysis.delay_selection_mode)
                .select(&accepted, &selector_config)
                .or_else(|| {
                    logger.warn("Configured delay selection could not decide; falling back to Mode.");
                    get_selector(crate::models::DelaySelectionMode::Mode)
                        .select(&accepted, &selector_config)
                })
                .ok_or(StepError::Analysis(AnalysisError::InsufficientChunks {
                    accepted: accepted.len(),
                    required: analysis.min_accepted_chunks as usize,
                }))?;
            logger.message(&format!(
                "[Delay Selection] {}: {:+}ms (raw {:+.3}ms, {} chunks)",
                selection.method, selection.delay_ms, selection.raw_delay_ms, selection.chunks_used
            ));

            evaluate_stability(&run.chunks, analysis, source_key, &logger);

            // Rebase onto the reference analysis track's container delay.
            let container_delay = state
                .source1_container
                .as_ref()
                .map(|c| c.audio_delay(run.ref_selection.track_id))
                .unwrap_or(0.0);
            let (final_ms, final_raw) = calculate_delay_chain(
                selection.raw_delay_ms,
                container_delay,
                source_key,
                &logger,
            );
            logger.message(&format!("Final {} delay: {} ms", source_key, final_ms));
            state.delays.set(source_key.clone(), final_raw);

            // Diagnosis runs against the pre-shift series.
            let diagnosis = diagnose(
                &run.chunks,
                state.reference_framerate,
                &run.target_selection.codec_id,
                analysis,
                &ctx.settings.stepping,
                &logger,
            );
            let flag_key = format!("{}_{}", source_key, run.target_selection.track_id);
            apply_diagnosis_flags(ctx, state, diagnosis, source_key, &flag_key, final_ms);

            state.analysis_chunks.insert(source_key.clone(), run.chunks);
        }

        // Global shift: lift the most negative considered delay to zero when
        // the sync mode demands non-negative outputs.
        let shift_required = analysis.sync_mode.requires_global_shift();
        let shift = calculate_global_shift(
            &state.delays,
            &ctx.spec,
            state.source1_container.as_ref(),
            shift_required,
            &logger,
        );
        apply_global_shift(&mut state.delays, &shift, &logger);

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &JobContext, state: &JobState) -> StepResult<()> {
        // Invariant: the reference never receives a delay entry.
        if state.delays.source_delays_ms.contains_key(REFERENCE_SOURCE) {
            return Err(StepError::invalid_output(
                "Source 1 must not appear in source delays",
            ));
        }
        for (source_key, path) in &ctx.spec.sources {
            if source_key == REFERENCE_SOURCE || is_subtitle_file(path) {
                continue;
            }
            if state.delays.rounded(source_key).is_none() {
                return Err(StepError::invalid_output(format!(
                    "no delay recorded for {}",
                    source_key
                )));
            }
        }
        Ok(())
    }
}

/// Route a diagnosis into the correction flag maps, honoring what the
/// layout actually consumes from the source.
fn apply_diagnosis_flags(
    ctx: &JobContext,
    state: &mut JobState,
    diagnosis: Diagnosis,
    source_key: &str,
    flag_key: &str,
    final_delay_ms: i64,
) {
    let logger = ctx.logger().clone();
    let has_audio = ctx.spec.source_has_kind(source_key, TrackType::Audio);
    let has_subs = ctx.spec.source_has_kind(source_key, TrackType::Subtitles);

    match diagnosis {
        Diagnosis::Uniform => {}
        Diagnosis::PalDrift { rate_ms_per_s } => {
            if has_audio {
                state.pal_drift_flags.insert(flag_key.to_string(), rate_ms_per_s);
            } else {
                logger.message(&format!(
                    "[PAL Drift Detected] No audio tracks from {} are being used. Skipping PAL correction.",
                    source_key
                ));
            }
        }
        Diagnosis::LinearDrift { rate_ms_per_s, .. } => {
            if has_audio {
                state
                    .linear_drift_flags
                    .insert(flag_key.to_string(), rate_ms_per_s);
            } else {
                logger.message(&format!(
                    "[Linear Drift Detected] No audio tracks from {} are being used. Skipping drift correction.",
                    source_key
                ));
            }
        }
        Diagnosis::Stepping(stepping) => {
            if has_audio {
                logger.message(&format!(
                    "[Stepping] Stepping correction will be applied to audio tracks from {}.",
                    source_key
                ));
                state.segment_flags.insert(
                    flag_key.to_string(),
                    SteppingFlag {
                        base_delay_ms: final_delay_ms,
                        subs_only: false,
                        diagnosis: Some(stepping),
                    },
                );
            } else if has_subs && ctx.settings.stepping.adjust_subtitles_no_audio {
                logger.message(&format!(
                    "[Stepping Detected] No audio from {}, but subtitles will use a verified stepping EDL.",
                    source_key
                ));
                state.segment_flags.insert(
                    flag_key.to_string(),
                    SteppingFlag {
                        base_delay_ms: final_delay_ms,
                        subs_only: true,
                        diagnosis: Some(stepping),
                    },
                );
            } else {
                logger.message(&format!(
                    "[Stepping Detected] No audio or subtitle tracks from {} are being used. Skipping.",
                    source_key
                ));
            }
        }
    }
}

/// Whether a source path is a loose subtitle file rather than a container.
pub fn is_subtitle_file(path: &std::path::Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref(),
        Some("ass") | Some("ssa") | Some("srt") | Some("sup")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn subtitle_files_are_recognized() {
        assert!(is_subtitle_file(Path::new("/x/subs.ass")));
        assert!(is_subtitle_file(Path::new("/x/subs.SRT")));
        assert!(!is_subtitle_file(Path::new("/x/movie.mkv")));
        assert!(!is_subtitle_file(Path::new("/x/noext")));
    }
}
