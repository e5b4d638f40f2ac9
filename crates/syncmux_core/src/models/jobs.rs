//! Job specifications, plan items, delays, and results.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::enums::{JobStatus, StyleFilterMode, TrackType};
use super::media::Track;

/// Key of the reference source. Its video defines the job timeline.
pub const REFERENCE_SOURCE: &str = "Source 1";

/// One track the user chose to include, as supplied by the caller.
///
/// This is the raw layout entry; extraction turns it into a [`PlanItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutEntry {
    /// Source key ("Source 1", "Source 2", "External" for loose subtitles).
    pub source: String,
    /// Track id within the source container.
    pub id: u64,
    /// Track kind.
    #[serde(rename = "type")]
    pub track_type: Option<TrackType>,
    /// Default-track flag for this kind.
    #[serde(default)]
    pub is_default: bool,
    /// Forced-display flag (subtitles).
    #[serde(default)]
    pub is_forced_display: bool,
    /// Emit the container track name in the output.
    #[serde(default)]
    pub apply_track_name: bool,
    /// Convert SRT input to ASS on write.
    #[serde(default)]
    pub convert_to_ass: bool,
    /// Rescale PlayRes to the reference video dimensions.
    #[serde(default)]
    pub rescale: bool,
    /// Multiplier applied to every style's font size.
    #[serde(default = "default_size_multiplier")]
    pub size_multiplier: f64,
    /// Per-style field overrides, keyed style name -> field -> value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_patch: Option<BTreeMap<String, BTreeMap<String, String>>>,
    /// Font name replacements applied to styles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_replacements: Option<BTreeMap<String, String>>,
    /// Which source's delay an external subtitle tracks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_to: Option<String>,
    /// Style filter for generated tracks; presence marks the entry generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<StyleFilterConfig>,
}

fn default_size_multiplier() -> f64 {
    1.0
}

impl Default for LayoutEntry {
    fn default() -> Self {
        Self {
            source: String::new(),
            id: 0,
            track_type: None,
            is_default: false,
            is_forced_display: false,
            apply_track_name: false,
            convert_to_ass: false,
            rescale: false,
            size_multiplier: 1.0,
            style_patch: None,
            font_replacements: None,
            sync_to: None,
            filter: None,
        }
    }
}

/// Keep/drop configuration for a generated subtitle track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleFilterConfig {
    #[serde(default)]
    pub mode: StyleFilterMode,
    /// Styles the mode applies to.
    #[serde(default)]
    pub styles: Vec<String>,
    /// Always kept, regardless of mode.
    #[serde(default)]
    pub forced_include: Vec<String>,
    /// Always dropped, regardless of mode.
    #[serde(default)]
    pub forced_exclude: Vec<String>,
}

/// Specification for one sync/merge job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Source key -> container path. "Source 1" is required.
    pub sources: BTreeMap<String, PathBuf>,
    /// Track layout chosen by the caller.
    #[serde(default)]
    pub layout: Vec<LayoutEntry>,
    /// Source to pull font attachments from. Defaults to the
    /// highest-numbered source key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_source: Option<String>,
    /// Run the full merge, not just analysis.
    #[serde(default = "default_true")]
    pub merge: bool,
}

fn default_true() -> bool {
    true
}

impl Default for JobSpec {
    fn default() -> Self {
        Self {
            sources: BTreeMap::new(),
            layout: Vec::new(),
            attachment_source: None,
            merge: true,
        }
    }
}

impl JobSpec {
    pub fn reference_path(&self) -> Option<&PathBuf> {
        self.sources.get(REFERENCE_SOURCE)
    }

    /// The source attachments are copied from: explicit override, else the
    /// source with the highest numeric key suffix.
    pub fn effective_attachment_source(&self) -> Option<&str> {
        if let Some(key) = self.attachment_source.as_deref() {
            return Some(key);
        }
        self.sources
            .keys()
            .filter_map(|k| {
                k.rsplit(' ')
                    .next()
                    .and_then(|n| n.parse::<u32>().ok())
                    .map(|n| (n, k.as_str()))
            })
            .max_by_key(|(n, _)| *n)
            .map(|(_, k)| k)
    }

    /// Whether any layout entry of the given kind comes from `source`.
    pub fn source_has_kind(&self, source: &str, kind: TrackType) -> bool {
        self.layout
            .iter()
            .any(|e| e.source == source && e.track_type == Some(kind))
    }
}

/// Per-job timing outputs.
///
/// Rounded and raw delays are carried in parallel: mkvmerge takes integer
/// milliseconds, subtitle event math needs the sub-ms values. The global
/// shift, once applied, is already folded into both maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delays {
    /// Rounded delay per secondary source (ms). "Source 1" is never stored.
    #[serde(default)]
    pub source_delays_ms: BTreeMap<String, i64>,
    /// Unrounded delay per secondary source (ms).
    #[serde(default)]
    pub raw_source_delays_ms: BTreeMap<String, f64>,
    /// Global shift lifting the most negative delay to zero (rounded).
    #[serde(default)]
    pub global_shift_ms: i64,
    /// Global shift, unrounded.
    #[serde(default)]
    pub raw_global_shift_ms: f64,
}

impl Delays {
    /// Store a source's delay. Rounds exactly once, here.
    pub fn set(&mut self, source: impl Into<String>, raw_ms: f64) {
        let source = source.into();
        debug_assert_ne!(source, REFERENCE_SOURCE);
        self.source_delays_ms
            .insert(source.clone(), raw_ms.round() as i64);
        self.raw_source_delays_ms.insert(source, raw_ms);
    }

    pub fn rounded(&self, source: &str) -> Option<i64> {
        self.source_delays_ms.get(source).copied()
    }

    pub fn raw(&self, source: &str) -> Option<f64> {
        self.raw_source_delays_ms.get(source).copied()
    }
}

/// A track in the final plan, with every per-track decision resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    pub track: Track,
    /// On-disk path of the extracted (or corrected) payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_path: Option<PathBuf>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_forced_display: bool,
    #[serde(default)]
    pub apply_track_name: bool,
    #[serde(default)]
    pub convert_to_ass: bool,
    #[serde(default)]
    pub rescale: bool,
    #[serde(default = "default_size_multiplier")]
    pub size_multiplier: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_patch: Option<BTreeMap<String, BTreeMap<String, String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_replacements: Option<BTreeMap<String, String>>,
    /// Sync anchor for external subtitles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_to: Option<String>,
    /// Container-reported delay relative to the source's video track (ms).
    #[serde(default)]
    pub container_delay_ms: i64,
    /// Replaced by a corrected FLAC.
    #[serde(default)]
    pub is_corrected: bool,
    /// Original kept alongside a corrected replacement.
    #[serde(default)]
    pub is_preserved: bool,
    /// Style filter configuration for generated tracks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<StyleFilterConfig>,
    /// Subtitle timestamps already shifted by stepping EDL application.
    /// The mux stage must not re-apply a sync delay.
    #[serde(default)]
    pub stepping_adjusted: bool,
    /// Subtitle timestamps already shifted by a sync-mode that edits events.
    #[serde(default)]
    pub frame_adjusted: bool,
    /// Display aspect ratio of a video track, from the decoder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
}

impl PlanItem {
    pub fn new(track: Track) -> Self {
        Self {
            track,
            extracted_path: None,
            is_default: false,
            is_forced_display: false,
            apply_track_name: false,
            convert_to_ass: false,
            rescale: false,
            size_multiplier: 1.0,
            style_patch: None,
            font_replacements: None,
            sync_to: None,
            container_delay_ms: 0,
            is_corrected: false,
            is_preserved: false,
            filter: None,
            stepping_adjusted: false,
            frame_adjusted: false,
            aspect_ratio: None,
        }
    }

    /// Copy the layout entry's decisions onto this item.
    pub fn apply_layout(mut self, entry: &LayoutEntry) -> Self {
        self.is_default = entry.is_default;
        self.is_forced_display = entry.is_forced_display;
        self.apply_track_name = entry.apply_track_name;
        self.convert_to_ass = entry.convert_to_ass;
        self.rescale = entry.rescale;
        self.size_multiplier = entry.size_multiplier;
        self.style_patch = entry.style_patch.clone();
        self.font_replacements = entry.font_replacements.clone();
        self.sync_to = entry.sync_to.clone();
        self.filter = entry.filter.clone();
        self
    }

    pub fn is_generated(&self) -> bool {
        self.filter.is_some()
    }
}

/// Result of one completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub status: JobStatus,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delays: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResult {
    pub fn merged(name: impl Into<String>, output: PathBuf, delays: &Delays) -> Self {
        Self {
            status: JobStatus::Merged,
            name: name.into(),
            output: Some(output),
            delays: Some(delays.source_delays_ms.clone()),
            error: None,
        }
    }

    pub fn analyzed(name: impl Into<String>, delays: &Delays) -> Self {
        Self {
            status: JobStatus::Analyzed,
            name: name.into(),
            output: None,
            delays: Some(delays.source_delays_ms.clone()),
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            name: name.into(),
            output: None,
            delays: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::StreamProps;

    #[test]
    fn delays_round_once_on_set() {
        let mut delays = Delays::default();
        delays.set("Source 2", -178.555);
        assert_eq!(delays.rounded("Source 2"), Some(-179));
        assert_eq!(delays.raw("Source 2"), Some(-178.555));
    }

    #[test]
    fn attachment_source_defaults_to_highest_numbered() {
        let mut spec = JobSpec::default();
        spec.sources.insert("Source 1".into(), "/a.mkv".into());
        spec.sources.insert("Source 3".into(), "/c.mkv".into());
        spec.sources.insert("Source 2".into(), "/b.mkv".into());
        assert_eq!(spec.effective_attachment_source(), Some("Source 3"));

        spec.attachment_source = Some("Source 2".into());
        assert_eq!(spec.effective_attachment_source(), Some("Source 2"));
    }

    #[test]
    fn plan_item_inherits_layout_decisions() {
        let entry = LayoutEntry {
            source: "Source 2".into(),
            id: 1,
            track_type: Some(TrackType::Subtitles),
            is_default: true,
            convert_to_ass: true,
            size_multiplier: 1.2,
            sync_to: Some("Source 2".into()),
            ..Default::default()
        };
        let item = PlanItem::new(Track::new(
            "Source 2",
            1,
            TrackType::Subtitles,
            StreamProps::new("S_TEXT/ASS"),
        ))
        .apply_layout(&entry);

        assert!(item.is_default);
        assert!(item.convert_to_ass);
        assert!((item.size_multiplier - 1.2).abs() < 1e-9);
        assert_eq!(item.sync_to.as_deref(), Some("Source 2"));
        assert!(!item.is_generated());
    }

    #[test]
    fn job_result_serializes_status() {
        let result = JobResult::failed("job_x", "boom");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"status\":\"Failed\""));
        assert!(json.contains("\"error\":\"boom\""));
    }
}
