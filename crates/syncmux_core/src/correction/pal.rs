//! PAL speed-up correction.

use std::collections::BTreeMap;

use super::items::split_corrected_pair;
use super::resample::{build_tempo_filter, engine_failure_hint, pal_tempo_ratio, resample_command};
use super::CorrectionError;
use crate::config::SegmentSettings;
use crate::io::CommandRunner;
use crate::models::{source_from_flag_key, PlanItem, TrackType};

/// Resample every audio track of each PAL-flagged source back to film speed.
///
/// `pal_flags` is keyed `"{source}_{track_id}"` and carries the measured
/// drift rate (logged only; the tempo is the exact 25 -> 23.976 ratio).
/// Preserved siblings are appended to `items`.
pub fn run_pal_correction(
    items: &mut Vec<PlanItem>,
    pal_flags: &BTreeMap<String, f64>,
    settings: &SegmentSettings,
    runner: &CommandRunner,
) -> Result<(), CorrectionError> {
    let logger = runner.logger().clone();

    for (flag_key, rate) in pal_flags {
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
                "[PALCorrector] No target audio tracks for {} in the layout. Skipping.",
                source_key
            ));
            continue;
        }

        logger.message(&format!(
            "[PALCorrector] Applying PAL speed correction to {} track(s) from {} (measured {:.2} ms/s)...",
            target_indices.len(),
            source_key,
            rate
        ));

        let tempo = pal_tempo_ratio();
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
                "pal_corrected_{}.flac",
                original_path.file_stem().unwrap_or_default().to_string_lossy()
            ));

            let chain = build_tempo_filter(settings, tempo, 48000);
            let cmd = resample_command(&original_path, &corrected_path, &chain);
            runner.run(&cmd).map_err(|source| CorrectionError::ResampleFailed {
                file: original_path.display().to_string(),
                hint: engine_failure_hint(settings.resample_engine).to_string(),
                source,
            })?;

            logger.success(&format!(
                "PAL correction successful for '{}'",
                original_path.display()
            ));

            preserved_items.push(split_corrected_pair(
                item,
                corrected_path,
                "PAL Corrected",
                "Original",
            ));
        }
        items.extend(preserved_items);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ToolPaths;
    use crate::logging::{JobLogger, LogConfig};
    use crate::models::{StreamProps, Track};
    use std::sync::Arc;

    fn runner() -> CommandRunner {
        let logger = Arc::new(JobLogger::sink_only("pal", LogConfig::default(), None));
        CommandRunner::new(logger, ToolPaths::bare())
    }

    #[test]
    fn source_without_targets_is_skipped() {
        let mut items = vec![];
        let mut flags = BTreeMap::new();
        flags.insert("Source 2_1".to_string(), 40.9);
        run_pal_correction(&mut items, &flags, &SegmentSettings::default(), &runner()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn missing_payload_is_an_error() {
        let mut items = vec![PlanItem::new(Track::new(
            "Source 2",
            1,
            TrackType::Audio,
            StreamProps::new("A_AC3"),
        ))];
        let mut flags = BTreeMap::new();
        flags.insert("Source 2_1".to_string(), 40.9);
        let err =
            run_pal_correction(&mut items, &flags, &SegmentSettings::default(), &runner())
                .unwrap_err();
        assert!(matches!(err, CorrectionError::MissingPayload { .. }));
    }
}
