//! Core enums shared across the pipeline.

use serde::{Deserialize, Serialize};

/// Type of media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Video,
    Audio,
    Subtitles,
}

impl TrackType {
    /// Parse the `type` field of the container probe JSON.
    pub fn from_probe_str(s: &str) -> Option<Self> {
        match s {
            "video" => Some(TrackType::Video),
            "audio" => Some(TrackType::Audio),
            "subtitles" => Some(TrackType::Subtitles),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackType::Video => write!(f, "video"),
            TrackType::Audio => write!(f, "audio"),
            TrackType::Subtitles => write!(f, "subtitles"),
        }
    }
}

/// Analysis method for calculating sync delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnalysisMode {
    /// Cross-correlation of decoded audio.
    #[default]
    #[serde(rename = "Audio Correlation")]
    AudioCorrelation,
    /// External videodiff binary comparing video frames.
    #[serde(rename = "VideoDiff")]
    VideoDiff,
}

/// Audio pre-filtering applied before correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilteringMethod {
    #[default]
    None,
    /// Butterworth band-pass isolating dialogue frequencies.
    #[serde(rename = "Dialogue Band-Pass Filter")]
    DialogueBandPass,
    /// Windowed-sinc FIR low-pass.
    #[serde(rename = "Low-Pass Filter")]
    LowPass,
}

/// Audio correlation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CorrelationMethod {
    /// Standard cross-correlation on normalized waveforms.
    #[default]
    #[serde(rename = "Standard Correlation (SCC)")]
    Scc,
    /// Generalized cross-correlation with phase transform.
    #[serde(rename = "Phase Correlation (GCC-PHAT)")]
    GccPhat,
    /// GCC with smoothed coherence transform weighting.
    #[serde(rename = "GCC-SCOT")]
    GccScot,
    /// Spectral whitening before conjugate multiply.
    #[serde(rename = "Whitened Cross-Correlation")]
    Whitened,
    /// Onset-strength envelopes correlated with GCC-PHAT.
    #[serde(rename = "Onset Detection")]
    Onset,
    /// DTW over MFCC frames; median path offset.
    #[serde(rename = "DTW (Dynamic Time Warping)")]
    Dtw,
    /// Mel-spectrogram band average correlated with GCC-PHAT.
    #[serde(rename = "Spectrogram Correlation")]
    Spectrogram,
}

impl CorrelationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scc => "Standard Correlation (SCC)",
            Self::GccPhat => "Phase Correlation (GCC-PHAT)",
            Self::GccScot => "GCC-SCOT",
            Self::Whitened => "Whitened Cross-Correlation",
            Self::Onset => "Onset Detection",
            Self::Dtw => "DTW (Dynamic Time Warping)",
            Self::Spectrogram => "Spectrogram Correlation",
        }
    }
}

impl std::fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Strategy for reducing per-chunk delays to one winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DelaySelectionMode {
    #[default]
    #[serde(rename = "Mode (Most Common)")]
    Mode,
    #[serde(rename = "Mode (Clustered)")]
    ModeClustered,
    #[serde(rename = "Mode (Early Cluster)")]
    ModeEarly,
    #[serde(rename = "First Stable")]
    FirstStable,
    #[serde(rename = "Average")]
    Average,
}

/// How negative sync delays are handled at mux time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Apply a global shift so every considered delay is non-negative.
    #[default]
    PositiveOnly,
    /// Pass negative delays through unchanged.
    AllowNegative,
    /// Keep container delays as found; no shift, no rebasing.
    PreserveExisting,
}

impl SyncMode {
    /// Whether this mode demands non-negative sync arguments.
    pub fn requires_global_shift(&self) -> bool {
        matches!(self, SyncMode::PositiveOnly)
    }
}

/// Keyframe snap direction for chapter timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapMode {
    /// Last keyframe at or before the timestamp.
    #[default]
    Previous,
    /// Whichever keyframe is closest.
    Nearest,
}

/// Rounding applied when subtitle float timestamps hit the output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleRounding {
    #[default]
    Floor,
    Round,
    Ceil,
}

/// Resample engine for tempo corrections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleEngine {
    /// librubberband; pitch-preserving, tunable.
    #[default]
    Rubberband,
    /// atempo filter; fast, small ratios only.
    Atempo,
    /// asetrate + aresample; changes pitch with speed.
    Aresample,
}

/// Gap fill policy during EDL assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Correlate reference content against the target; insert whichever fits.
    #[default]
    Auto,
    /// Always insert digital silence.
    Silence,
    /// Always insert reference content when it is not silent.
    Content,
}

/// Stepping correction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SteppingCorrectionMode {
    /// Reject stepping if any cluster fails validation.
    #[default]
    Full,
    /// Alias of full with the stricter intent spelled out.
    Strict,
    /// Keep only valid clusters; fallback mode governs the rest.
    Filtered,
    /// Never emit a stepping diagnosis.
    Disabled,
}

/// Cluster quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SteppingQualityMode {
    Strict,
    #[default]
    Normal,
    Lenient,
    Custom,
}

/// What happens to time ranges covered by invalid clusters in filtered mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SteppingFallbackMode {
    /// Boundaries are only placed between valid clusters.
    #[default]
    Nearest,
    /// Filtered regions keep their original timing.
    Skip,
    /// Any invalid cluster rejects stepping outright.
    Reject,
}

/// Silence detection backend for boundary snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilenceDetectionMethod {
    /// External silencedetect filter; frame-accurate.
    FfmpegSilencedetect,
    /// RMS windowing over the decoded PCM.
    RmsBasic,
    /// silencedetect + RMS fallback + speech/transient-aware scoring.
    #[default]
    SmartFusion,
}

/// Sync mode for subtitle event timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubtitleSyncMode {
    /// Plain per-source delay via the muxer.
    #[default]
    TimeBased,
    /// Delay corrected by a video-verified delta before application.
    VideoVerified,
}

/// Final status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Merged,
    Analyzed,
    Failed,
}

/// Keep-or-drop semantics of a generated subtitle track's style list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleFilterMode {
    /// Keep only the listed styles.
    Include,
    /// Drop the listed styles.
    #[default]
    Exclude,
}
