//! Extraction types and errors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::io::RunnerError;
use crate::models::TrackType;

/// One track as reported by the container probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeTrack {
    pub id: u64,
    pub track_type: TrackType,
    pub codec_id: String,
    pub language: String,
    pub name: String,
    pub is_default: bool,
    pub is_forced: bool,
    /// Container delay from minimum_timestamp (ms); zero for subtitles.
    pub container_delay_ms: i64,
    pub audio_channels: Option<u32>,
    pub audio_sampling_frequency: Option<u32>,
    pub audio_bits_per_sample: Option<u32>,
    /// `WxH` for video tracks.
    pub pixel_dimensions: Option<String>,
}

/// One attachment as reported by the container probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeAttachment {
    pub id: u64,
    pub content_type: String,
    pub file_name: String,
}

/// Parsed container probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeResult {
    pub file_path: PathBuf,
    pub container_type: String,
    pub duration_ns: Option<u64>,
    pub tracks: Vec<ProbeTrack>,
    pub attachments: Vec<ProbeAttachment>,
    pub has_chapters: bool,
}

impl ProbeResult {
    pub fn tracks_of(&self, kind: TrackType) -> impl Iterator<Item = &ProbeTrack> {
        self.tracks.iter().filter(move |t| t.track_type == kind)
    }

    pub fn track(&self, id: u64) -> Option<&ProbeTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }
}

/// A track written to disk by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedTrack {
    pub id: u64,
    pub track_type: TrackType,
    pub codec_id: String,
    pub language: String,
    pub name: String,
    pub source: String,
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    /// Structured per-track failure report (see `tracks::extract_tracks`).
    #[error("{report}")]
    TrackFailure { report: String },

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;
