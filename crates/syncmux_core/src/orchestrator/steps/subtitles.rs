//! Subtitle step: run the per-track subtitle pipeline for every subtitle
//! plan item.

use crate::models::TrackType;
use crate::orchestrator::context::{JobContext, JobState, StepOutcome};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::subtitles::{process_subtitle_track, SubtitleContext};

pub struct SubtitlesStep;

impl SubtitlesStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SubtitlesStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for SubtitlesStep {
    fn name(&self) -> &str {
        "Subtitles"
    }

    fn validate_input(&self, _ctx: &JobContext, state: &JobState) -> StepResult<()> {
        for item in state
            .items
            .iter()
            .filter(|i| i.track.track_type == TrackType::Subtitles)
        {
            if item.extracted_path.is_none() {
                return Err(StepError::invalid_input(format!(
                    "subtitle track {} has no extracted payload",
                    item.track.flag_key()
                )));
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &JobContext, state: &mut JobState) -> StepResult<StepOutcome> {
        // Filtered stepping with the skip fallback leaves invalid cluster
        // ranges uncorrected; subtitle events inside them keep their
        // original timing.
        let mut skip_ranges: std::collections::BTreeMap<String, Vec<(f64, f64)>> =
            std::collections::BTreeMap::new();
        for (flag_key, flag) in &state.segment_flags {
            if let Some(diagnosis) = &flag.diagnosis {
                if diagnosis.correction_mode == crate::models::SteppingCorrectionMode::Filtered
                    && diagnosis.fallback_mode == crate::models::SteppingFallbackMode::Skip
                {
                    let source = crate::models::source_from_flag_key(flag_key).to_string();
                    skip_ranges
                        .entry(source)
                        .or_default()
                        .extend(diagnosis.invalid_time_ranges());
                }
            }
        }

        let subtitle_indices: Vec<usize> = state
            .items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.track.track_type == TrackType::Subtitles && !i.is_preserved)
            .map(|(idx, _)| idx)
            .collect();

        if subtitle_indices.is_empty() {
            return Ok(StepOutcome::Skipped("no subtitle tracks in layout".to_string()));
        }

        // Bitmap subtitle payloads pass through untouched; the OCR pipeline
        // that would turn them into text is an external collaborator.
        for idx in subtitle_indices {
            let is_text = {
                let item = &state.items[idx];
                item.track.props.codec_id.starts_with("S_TEXT")
            };
            if !is_text {
                ctx.logger().message(&format!(
                    "[Subtitles] Track {} is bitmap-based; passing through unmodified.",
                    state.items[idx].track.flag_key()
                ));
                continue;
            }

            let subtitle_ctx = SubtitleContext {
                delays: &state.delays,
                stepping_edls: &state.stepping_edls,
                skip_ranges: &skip_ranges,
                settings: &ctx.settings,
                reference_resolution: state.reference_resolution,
                temp_dir: &ctx.temp_dir,
            };
            let item = &mut state.items[idx];
            let flag_key = item.track.flag_key();
            if let Some(clamp) = process_subtitle_track(item, &subtitle_ctx, ctx.logger())? {
                state.clamp_reports.insert(flag_key, clamp);
            }
        }

        Ok(StepOutcome::Success)
    }
}
