//! Extraction step: demux selected tracks, read container delays, build
//! plan items.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::analyze::is_subtitle_file;
use crate::analysis::{get_display_aspect_ratio, parse_container_delays, ContainerDelayInfo};
use crate::extraction::{extract_tracks, probe_file, ExtractedTrack};
use crate::models::{PlanItem, StreamProps, Track, TrackType};
use crate::orchestrator::context::{JobContext, JobState, StepOutcome};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;

pub struct ExtractStep;

impl ExtractStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ExtractStep {
    fn name(&self) -> &str {
        "Extract"
    }

    fn validate_input(&self, ctx: &JobContext, _state: &JobState) -> StepResult<()> {
        if ctx.spec.layout.is_empty() {
            return Err(StepError::invalid_input("job layout is empty"));
        }
        for entry in &ctx.spec.layout {
            if !ctx.spec.sources.contains_key(&entry.source) {
                return Err(StepError::invalid_input(format!(
                    "layout references unknown source '{}'",
                    entry.source
                )));
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &JobContext, state: &mut JobState) -> StepResult<StepOutcome> {
        let logger = ctx.logger().clone();

        // Demux per source: one extractor invocation per container covering
        // every selected track id.
        let mut per_source_ids: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for entry in &ctx.spec.layout {
            let ids = per_source_ids.entry(entry.source.clone()).or_default();
            if !ids.contains(&entry.id) {
                ids.push(entry.id);
            }
        }

        let mut extracted: BTreeMap<String, Vec<ExtractedTrack>> = BTreeMap::new();
        let mut container_delays: BTreeMap<String, ContainerDelayInfo> = BTreeMap::new();

        for (source_key, ids) in &per_source_ids {
            let source_path = &ctx.spec.sources[source_key];

            if is_subtitle_file(source_path) {
                extracted.insert(
                    source_key.clone(),
                    copy_external_subtitle(source_path, source_key, &ctx.temp_dir)?,
                );
                continue;
            }

            let probe_json = probe_to_json(source_path, ctx)?;
            container_delays.insert(source_key.clone(), parse_container_delays(&probe_json));

            let tracks = extract_tracks(
                source_path,
                &ctx.temp_dir,
                &ctx.runner,
                source_key,
                Some(ids.as_slice()),
            )?;
            extracted.insert(source_key.clone(), tracks);
        }

        // Build plan items in layout order; layout order is mux order.
        let mut generated_counter = 0usize;
        for entry in &ctx.spec.layout {
            let records = extracted.get(&entry.source).ok_or_else(|| {
                StepError::invalid_output(format!("no extraction output for {}", entry.source))
            })?;
            let record = records
                .iter()
                .find(|t| t.id == entry.id)
                .ok_or_else(|| {
                    StepError::invalid_output(format!(
                        "track {} missing from {} extraction",
                        entry.id, entry.source
                    ))
                })?;

            let track = Track::new(
                record.source.clone(),
                record.id,
                record.track_type,
                StreamProps {
                    codec_id: record.codec_id.clone(),
                    lang: record.language.clone(),
                    name: record.name.clone(),
                },
            );
            let mut item = PlanItem::new(track).apply_layout(entry);

            // Container delays, rebased relative to the source's own video.
            if let Some(info) = container_delays.get(&entry.source) {
                item.container_delay_ms = match record.track_type {
                    TrackType::Audio => info.audio_delay(record.id).round() as i64,
                    TrackType::Video => info.video_delay_ms.round() as i64,
                    TrackType::Subtitles => 0,
                };
            }

            // Aspect ratio from the decoder, for mux planning.
            if record.track_type == TrackType::Video {
                item.aspect_ratio =
                    get_display_aspect_ratio(&ctx.spec.sources[&entry.source], &ctx.runner);
            }

            // A generated track gets its own copy of the payload; the style
            // filter itself runs in the subtitle stage.
            if item.is_generated() {
                generated_counter += 1;
                let generated_path =
                    generated_copy_path(&record.path, generated_counter);
                std::fs::copy(&record.path, &generated_path)
                    .map_err(|e| StepError::io("copying generated subtitle payload", e))?;
                logger.message(&format!(
                    "[Extract] Generated subtitle track copied to {}",
                    generated_path.display()
                ));
                item.extracted_path = Some(generated_path);
            } else {
                item.extracted_path = Some(record.path.clone());
            }

            state.items.push(item);
        }

        // Reference video resolution for subtitle rescale.
        if let Some(reference) = ctx.reference_path() {
            if let Ok(probe) = probe_file(reference, &ctx.runner) {
                state.reference_resolution = probe
                    .tracks_of(TrackType::Video)
                    .next()
                    .and_then(|t| t.pixel_dimensions.as_deref())
                    .and_then(parse_dimensions);
            }
        }

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &JobContext, state: &JobState) -> StepResult<()> {
        // Invariant: every plan item's payload exists on disk.
        for item in &state.items {
            let Some(path) = &item.extracted_path else {
                return Err(StepError::invalid_output(format!(
                    "plan item {} has no extracted payload",
                    item.track.flag_key()
                )));
            };
            if !path.exists() {
                return Err(StepError::invalid_output(format!(
                    "extracted payload missing on disk: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

fn probe_to_json(path: &Path, ctx: &JobContext) -> StepResult<serde_json::Value> {
    let out = ctx.runner.run(&crate::io::argv([
        "mkvmerge".to_string(),
        "-J".to_string(),
        path.to_string_lossy().into_owned(),
    ]))?;
    serde_json::from_str(&out)
        .map_err(|e| StepError::Other(format!("failed to parse probe JSON: {}", e)))
}

/// A loose subtitle file acts as a single-track source with id 0.
fn copy_external_subtitle(
    source_path: &Path,
    source_key: &str,
    temp_dir: &Path,
) -> StepResult<Vec<ExtractedTrack>> {
    let ext = source_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("ass")
        .to_lowercase();
    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "external".to_string());
    let dest = temp_dir.join(format!(
        "{}_track_{}_0.{}",
        source_key.replace(' ', "_"),
        stem,
        ext
    ));
    std::fs::copy(source_path, &dest)
        .map_err(|e| StepError::io("copying external subtitle", e))?;

    let codec_id = match ext.as_str() {
        "srt" => "S_TEXT/UTF8",
        "ssa" => "S_TEXT/SSA",
        "sup" => "S_HDMV/PGS",
        _ => "S_TEXT/ASS",
    };
    Ok(vec![ExtractedTrack {
        id: 0,
        track_type: TrackType::Subtitles,
        codec_id: codec_id.to_string(),
        language: "und".to_string(),
        name: String::new(),
        source: source_key.to_string(),
        path: dest,
    }])
}

fn generated_copy_path(original: &Path, counter: usize) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());
    let ext = original
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("ass");
    original.with_file_name(format!("{}_generated{}.{}", stem, counter, ext))
}

fn parse_dimensions(dims: &str) -> Option<(u32, u32)> {
    let (w, h) = dims.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_parse() {
        assert_eq!(parse_dimensions("1920x1080"), Some((1920, 1080)));
        assert_eq!(parse_dimensions("bad"), None);
    }

    #[test]
    fn generated_path_is_distinct() {
        let path = generated_copy_path(Path::new("/t/Source_2_track_m_3.ass"), 1);
        assert_eq!(
            path,
            PathBuf::from("/t/Source_2_track_m_3_generated1.ass")
        );
    }

    #[test]
    fn external_subtitle_copy_lands_in_temp() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("movie.en.srt");
        std::fs::write(&src, "1\n00:00:01,000 --> 00:00:02,000\nx\n").unwrap();
        let out = copy_external_subtitle(&src, "External", dir.path()).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].path.exists());
        assert_eq!(out[0].codec_id, "S_TEXT/UTF8");
        assert_eq!(out[0].track_type, TrackType::Subtitles);
    }
}
