//! Per-track subtitle processing pipeline.
//!
//! Load -> style filter (generated tracks) -> stepping -> sync offset ->
//! style transforms -> format conversion -> persist (JSON side-file plus
//! the display format, the single rounding point).

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Settings;
use crate::correction::AudioSegment;
use crate::logging::JobLogger;
use crate::models::{Delays, PlanItem, StreamProps, SubtitleSyncMode, Track, REFERENCE_SOURCE};

use super::parsers::load_subtitle;
use super::style::{
    apply_font_replacements, apply_rescale, apply_size_multiplier, apply_style_patch,
    filter_by_styles,
};
use super::timestamps::timestamp_precision;
use super::timing::{apply_stepping, apply_sync_offset};
use super::types::{ClampReport, SubtitleResult};
use super::writers::{write_json_sidecar, write_subtitle};

/// Read-only inputs for subtitle processing.
pub struct SubtitleContext<'a> {
    pub delays: &'a Delays,
    pub stepping_edls: &'a BTreeMap<String, Vec<AudioSegment>>,
    /// Per-source time ranges left uncorrected by filtered stepping with
    /// the skip fallback; events inside them keep their original timing.
    pub skip_ranges: &'a BTreeMap<String, Vec<(f64, f64)>>,
    pub settings: &'a Settings,
    /// Reference video dimensions, for PlayRes rescale.
    pub reference_resolution: Option<(u32, u32)>,
    pub temp_dir: &'a Path,
}

/// Process one subtitle plan item in place.
///
/// Updates the item's path, codec, and `stepping_adjusted`/`frame_adjusted`
/// flags. Returns the clamp report when the applied offset drove event
/// starts negative.
pub fn process_subtitle_track(
    item: &mut PlanItem,
    ctx: &SubtitleContext<'_>,
    logger: &JobLogger,
) -> SubtitleResult<Option<ClampReport>> {
    let input_path = item
        .extracted_path
        .clone()
        .ok_or_else(|| super::types::SubtitleError::Unsupported("no extracted payload".into()))?;

    logger.message(&format!(
        "[SubtitleData] Loading track {}: {}",
        item.track.id,
        input_path.display()
    ));
    check_source_precision(&input_path, logger);

    let mut data = load_subtitle(&input_path)?;
    logger.message(&format!(
        "[SubtitleData] Loaded {} events, {} styles",
        data.events.len(),
        data.styles.len()
    ));

    // Style filter: generated tracks only.
    if let Some(filter) = item.filter.clone() {
        logger.message(&format!(
            "[SubtitleData] Applying style filter for generated track (forced keep: {}, forced remove: {})...",
            filter.forced_include.len(),
            filter.forced_exclude.len()
        ));
        filter_by_styles(&mut data, &filter, logger);
    }

    // Stepping EDL.
    if ctx.settings.stepping.adjust_subtitles {
        if let Some(edl) = ctx.stepping_edls.get(&item.track.source) {
            logger.message("[SubtitleData] Applying stepping correction...");
            let skip_ranges = ctx
                .skip_ranges
                .get(&item.track.source)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let stats = apply_stepping(&mut data, edl, skip_ranges, logger);
            if stats.events_affected > 0 {
                item.stepping_adjusted = true;
            }
        }
    }

    // Sync-mode offset, unless stepping already moved the events.
    let mut clamp_report = None;
    if !item.stepping_adjusted {
        match ctx.settings.subtitles.sync_mode {
            SubtitleSyncMode::TimeBased => {
                // Time-based mode delegates to the muxer's per-track sync;
                // events stay untouched and frame_adjusted stays false.
            }
            SubtitleSyncMode::VideoVerified => {
                let offset = resolve_sync_offset(item, ctx.delays);
                if offset != 0.0 {
                    let (stats, clamp) = apply_sync_offset(&mut data, offset, logger);
                    if stats.events_affected > 0 {
                        item.frame_adjusted = true;
                    }
                    clamp_report = clamp;
                }
            }
        }
    } else {
        logger.message("[SubtitleData] Skipping sync offset - stepping already applied");
    }

    // Style transforms, in order: fonts, patches, rescale, size.
    if let Some(replacements) = &item.font_replacements {
        apply_font_replacements(&mut data, replacements, logger);
    }
    if let Some(patch) = &item.style_patch {
        apply_style_patch(&mut data, patch, logger);
    }
    if item.rescale {
        if let Some(resolution) = ctx.reference_resolution {
            apply_rescale(&mut data, resolution, logger);
        } else {
            logger.warn("[Rescale] Reference resolution unavailable; skipping rescale");
        }
    }
    if (item.size_multiplier - 1.0).abs() > 1e-6 {
        apply_size_multiplier(&mut data, item.size_multiplier, logger);
    }

    // Format conversion decision.
    let input_ext = input_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let output_ext = if item.convert_to_ass && input_ext == "srt" {
        logger.message("[SubtitleData] Converting SRT to ASS at save");
        "ass"
    } else if input_ext.is_empty() {
        "ass"
    } else if input_ext == "ssa" {
        // SSA round-trips through the ASS writer.
        "ass"
    } else {
        &input_ext
    };

    // JSON side-file first, so every field survives for the auditors.
    let json_path = ctx
        .temp_dir
        .join(format!("subtitle_data_track_{}.json", item.track.id));
    match write_json_sidecar(&data, &json_path) {
        Ok(()) => logger.message(&format!("[SubtitleData] JSON saved: {}", json_path.display())),
        Err(e) => logger.warn(&format!("[SubtitleData] Could not save JSON: {}", e)),
    }

    // Display format: the single rounding point.
    let output_path = input_path.with_extension(output_ext);
    write_subtitle(&data, &output_path, ctx.settings.subtitles.rounding)?;
    logger.message(&format!(
        "[SubtitleData] Saved {} ({} events)",
        output_path.display(),
        data.events.len()
    ));

    item.extracted_path = Some(output_path.clone());
    if output_ext == "ass" && item.track.props.codec_id != "S_TEXT/ASS" {
        item.track = Track::new(
            item.track.source.clone(),
            item.track.id,
            item.track.track_type,
            StreamProps {
                codec_id: "S_TEXT/ASS".to_string(),
                lang: item.track.props.lang.clone(),
                name: item.track.props.name.clone(),
            },
        );
    }

    Ok(clamp_report)
}

/// Resolve the sync offset an event-editing mode applies: the raw per-source
/// delay, through the sync anchor for external subtitles. Source 1 tracks
/// only move by the global shift.
fn resolve_sync_offset(item: &PlanItem, delays: &Delays) -> f64 {
    if item.track.source == REFERENCE_SOURCE {
        return delays.raw_global_shift_ms;
    }
    let sync_key = item.sync_to.as_deref().unwrap_or(&item.track.source);
    delays.raw(sync_key).unwrap_or(0.0)
}

/// Warn when the source file's timestamp precision deviates from standard
/// centiseconds; the load/save cycle would lose the extra digit otherwise.
fn check_source_precision(path: &Path, logger: &JobLogger) {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    if !matches!(ext.as_deref(), Some("ass") | Some("ssa")) {
        return;
    }
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };
    for line in content.lines() {
        let Some(rest) = line.strip_prefix("Dialogue:") else {
            continue;
        };
        if let Some(start_text) = rest.split(',').nth(1) {
            let precision = timestamp_precision(start_text);
            if precision != 2 {
                logger.warn(&format!(
                    "[Diag] Non-standard timestamp precision: {} fractional digits (expected 2 for centiseconds)",
                    precision
                ));
            }
        }
        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogConfig;
    use crate::models::{StyleFilterConfig, StyleFilterMode, SubtitleRounding, TrackType};
    use crate::subtitles::parsers::parse_ass;

    fn logger() -> JobLogger {
        JobLogger::sink_only("subproc", LogConfig::default(), None)
    }

    fn write_sample_ass(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("Source_2_track_movie_3.ass");
        std::fs::write(
            &path,
            "[Script Info]\nPlayResX: 1280\nPlayResY: 720\n\n\
             [V4+ Styles]\n\
             Format: Name, Fontname, Fontsize\n\
             Style: Main,Arial,48\n\
             Style: Sign,Impact,40\n\n\
             [Events]\n\
             Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n\
             Dialogue: 0,0:00:10.00,0:00:12.00,Main,,0,0,0,,early line\n\
             Dialogue: 0,0:11:00.00,0:11:02.00,Main,,0,0,0,,late line\n\
             Dialogue: 0,0:00:20.00,0:00:21.00,Sign,,0,0,0,,a sign\n",
        )
        .unwrap();
        path
    }

    fn subtitle_item(path: &Path) -> PlanItem {
        let mut item = PlanItem::new(Track::new(
            "Source 2",
            3,
            TrackType::Subtitles,
            StreamProps::new("S_TEXT/ASS").with_lang("eng"),
        ));
        item.extracted_path = Some(path.to_path_buf());
        item
    }

    #[test]
    fn stepping_moves_events_piecewise_and_sets_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_ass(dir.path());
        let mut item = subtitle_item(&path);

        let mut settings = Settings::default();
        settings.subtitles.rounding = SubtitleRounding::Round;
        let mut edls = BTreeMap::new();
        let mut seg2 = AudioSegment::new(600.0, 120, 120.0);
        seg2.end_s = 600.0;
        edls.insert(
            "Source 2".to_string(),
            vec![AudioSegment::new(0.0, 0, 0.0), seg2],
        );

        let delays = Delays::default();
        let skip_ranges = BTreeMap::new();
        let ctx = SubtitleContext {
            delays: &delays,
            stepping_edls: &edls,
            skip_ranges: &skip_ranges,
            settings: &settings,
            reference_resolution: None,
            temp_dir: dir.path(),
        };

        process_subtitle_track(&mut item, &ctx, &logger()).unwrap();
        assert!(item.stepping_adjusted);

        let written =
            parse_ass(&std::fs::read_to_string(item.extracted_path.as_ref().unwrap()).unwrap())
                .unwrap();
        // Early events stay; the 11-minute event moved by 120 ms.
        assert_eq!(written.events[0].start_ms, 10_000.0);
        assert_eq!(written.events[1].start_ms, 660_120.0);
        // JSON side-file exists.
        assert!(dir.path().join("subtitle_data_track_3.json").exists());
    }

    #[test]
    fn zero_offset_edl_leaves_times_and_flag_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_ass(dir.path());
        let original = std::fs::read_to_string(&path).unwrap();
        let mut item = subtitle_item(&path);

        let settings = Settings::default();
        let mut edls = BTreeMap::new();
        edls.insert("Source 2".to_string(), vec![AudioSegment::new(0.0, 0, 0.0)]);
        let delays = Delays::default();
        let skip_ranges = BTreeMap::new();
        let ctx = SubtitleContext {
            delays: &delays,
            stepping_edls: &edls,
            skip_ranges: &skip_ranges,
            settings: &settings,
            reference_resolution: None,
            temp_dir: dir.path(),
        };

        process_subtitle_track(&mut item, &ctx, &logger()).unwrap();
        assert!(!item.stepping_adjusted);
        let rewritten = std::fs::read_to_string(item.extracted_path.as_ref().unwrap()).unwrap();
        // Event timing lines are byte-identical to the source.
        let original_events: Vec<&str> = original
            .lines()
            .filter(|l| l.starts_with("Dialogue:"))
            .collect();
        let rewritten_events: Vec<&str> = rewritten
            .lines()
            .filter(|l| l.starts_with("Dialogue:"))
            .collect();
        assert_eq!(original_events, rewritten_events);
    }

    #[test]
    fn generated_track_filters_styles() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_ass(dir.path());
        let mut item = subtitle_item(&path);
        item.filter = Some(StyleFilterConfig {
            mode: StyleFilterMode::Exclude,
            styles: vec!["Sign".to_string()],
            forced_include: vec![],
            forced_exclude: vec![],
        });

        let settings = Settings::default();
        let edls = BTreeMap::new();
        let delays = Delays::default();
        let skip_ranges = BTreeMap::new();
        let ctx = SubtitleContext {
            delays: &delays,
            stepping_edls: &edls,
            skip_ranges: &skip_ranges,
            settings: &settings,
            reference_resolution: None,
            temp_dir: dir.path(),
        };
        process_subtitle_track(&mut item, &ctx, &logger()).unwrap();

        let written =
            parse_ass(&std::fs::read_to_string(item.extracted_path.as_ref().unwrap()).unwrap())
                .unwrap();
        assert_eq!(written.events.len(), 2);
        assert!(written.events.iter().all(|e| e.style == "Main"));
    }

    #[test]
    fn srt_converts_to_ass_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ext_track_movie_0.srt");
        std::fs::write(&path, "1\n00:00:01,000 --> 00:00:02,000\nhello\n\n").unwrap();
        let mut item = PlanItem::new(Track::new(
            "Source 2",
            0,
            TrackType::Subtitles,
            StreamProps::new("S_TEXT/UTF8"),
        ));
        item.extracted_path = Some(path);
        item.convert_to_ass = true;

        let settings = Settings::default();
        let edls = BTreeMap::new();
        let delays = Delays::default();
        let skip_ranges = BTreeMap::new();
        let ctx = SubtitleContext {
            delays: &delays,
            stepping_edls: &edls,
            skip_ranges: &skip_ranges,
            settings: &settings,
            reference_resolution: None,
            temp_dir: dir.path(),
        };
        process_subtitle_track(&mut item, &ctx, &logger()).unwrap();

        let out = item.extracted_path.as_ref().unwrap();
        assert_eq!(out.extension().unwrap(), "ass");
        assert_eq!(item.track.props.codec_id, "S_TEXT/ASS");
        assert!(std::fs::read_to_string(out).unwrap().contains("[Events]"));
    }

    #[test]
    fn video_verified_mode_edits_events_and_sets_frame_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_ass(dir.path());
        let mut item = subtitle_item(&path);

        let mut settings = Settings::default();
        settings.subtitles.sync_mode = SubtitleSyncMode::VideoVerified;
        let edls = BTreeMap::new();
        let mut delays = Delays::default();
        delays.set("Source 2", 250.5);
        let skip_ranges = BTreeMap::new();
        let ctx = SubtitleContext {
            delays: &delays,
            stepping_edls: &edls,
            skip_ranges: &skip_ranges,
            settings: &settings,
            reference_resolution: None,
            temp_dir: dir.path(),
        };
        process_subtitle_track(&mut item, &ctx, &logger()).unwrap();

        assert!(item.frame_adjusted);
        let written =
            parse_ass(&std::fs::read_to_string(item.extracted_path.as_ref().unwrap()).unwrap())
                .unwrap();
        // 10000 + 250.5 -> floor to centiseconds = 10250.
        assert_eq!(written.events[0].start_ms, 10_250.0);
    }

    #[test]
    fn sync_offset_respects_external_anchor() {
        let mut delays = Delays::default();
        delays.set("Source 3", -80.0);
        let mut item = subtitle_item(Path::new("/x.ass"));
        item.track = Track::new(
            "External",
            0,
            TrackType::Subtitles,
            StreamProps::new("S_TEXT/ASS"),
        );
        item.sync_to = Some("Source 3".to_string());
        assert_eq!(resolve_sync_offset(&item, &delays), -80.0);

        // Unknown anchor reads as zero.
        item.sync_to = Some("Source 9".to_string());
        assert_eq!(resolve_sync_offset(&item, &delays), 0.0);
    }
}
