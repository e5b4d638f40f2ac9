//! Linear drift correction.

use std::collections::BTreeMap;
use std::path::Path;

use super::items::split_corrected_pair;
use super::resample::{
    build_tempo_filter, drift_tempo_ratio, engine_failure_hint, resample_command,
};
use super::CorrectionError;
use crate::analysis::get_audio_properties;
use crate::config::SegmentSettings;
use crate::io::CommandRunner;
use crate::models::{source_from_flag_key, PlanItem, TrackType};

/// Resample every audio track of each drift-flagged source by the measured
/// rate. Preserved siblings are appended to `items`.
pub fn run_linear_correction(
    items: &mut Vec<PlanItem>,
    drift_flags: &BTreeMap<String, f64>,
    settings: &SegmentSettings,
    runner: &CommandRunner,
) -> Result<(), CorrectionError> {
    let logger = runner.logger().clone();

    for (flag_key, &rate_ms_per_s) in drift_flags {
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

        if target_indices.is_empty() {
            logger.message(&format!(
                "[LinearCorrector] No target audio tracks for {} in the layout. Skipping.",
                source_key
            ));
            continue;
        }

        logger.message(&format!(
            "[LinearCorrector] Applying drift correction to {} track(s) from {} (rate: {:.2} ms/s)...",
            target_indices.len(),
            source_key,
            rate_ms_per_s
        ));

        let tempo = drift_tempo_ratio(rate_ms_per_s);
        let mut preserved_items = Vec::new();
        for idx in target_indices {
            let item = &mut items[idx];
            let original_path = item
                .extracted_path
                .clone()
                .ok_or_else(|| CorrectionError::MissingPayload {
                    track: item.track.flag_key(),
                })?;
            let corrected_path = original_path.with_file_name(format!(
                "drift_corrected_{}.flac",
                original_path.file_stem().unwrap_or_default().to_string_lossy()
            ));

            let sample_rate = probe_sample_rate(&original_path, runner);
            let chain = build_tempo_filter(settings, tempo, sample_rate);
            let cmd = resample_command(&original_path, &corrected_path, &chain);
            runner.run(&cmd).map_err(|source| CorrectionError::ResampleFailed {
                file: original_path.display().to_string(),
                hint: engine_failure_hint(settings.resample_engine).to_string(),
                source,
            })?;

            logger.success(&format!(
                "Linear drift correction successful for '{}'",
                original_path.display()
            ));

            preserved_items.push(split_corrected_pair(
                item,
                corrected_path,
                "Drift Corrected",
                "Original",
            ));
        }
        items.extend(preserved_items);
    }

    Ok(())
}

fn probe_sample_rate(path: &Path, runner: &CommandRunner) -> u32 {
    match get_audio_properties(path, 0, runner) {
        Ok((_, _, sample_rate)) => sample_rate,
        Err(_) => {
            runner
                .logger()
                .warn("Could not probe sample rate, defaulting to 48000 Hz.");
            48000
        }
    }
}
