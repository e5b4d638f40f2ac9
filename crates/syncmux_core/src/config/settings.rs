//! Settings struct with TOML-based sections.
//!
//! Sections map to TOML tables; every field has a serde default so a minimal
//! settings file parses. All settings are static for the lifetime of a job.

use serde::{Deserialize, Serialize};

use crate::models::{
    AnalysisMode, CorrelationMethod, DelaySelectionMode, FillMode, FilteringMethod,
    ResampleEngine, SilenceDetectionMethod, SnapMode, SteppingCorrectionMode,
    SteppingFallbackMode, SteppingQualityMode, SubtitleRounding, SubtitleSyncMode, SyncMode,
};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub segment: SegmentSettings,
    #[serde(default)]
    pub stepping: SteppingSettings,
    #[serde(default)]
    pub chapters: ChapterSettings,
    #[serde(default)]
    pub postprocess: PostProcessSettings,
    #[serde(default)]
    pub subtitles: SubtitleSettings,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Output, temp, and external tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Output folder for merged files.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,
    /// Root folder for per-job temp directories.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,
    /// Folder for per-job log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
    /// Path to the videodiff binary (VideoDiff analysis mode only).
    #[serde(default)]
    pub videodiff_path: String,
}

fn default_output_folder() -> String {
    "sync_output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
            videodiff_path: String::new(),
        }
    }
}

/// Job log formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter child-process progress lines to step intervals.
    #[serde(default = "default_true")]
    pub compact: bool,
    /// Lines of child output kept for error diagnosis.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,
    /// Lines of child output echoed on success (0 = none).
    #[serde(default)]
    pub tail_lines: u32,
    /// Progress is logged every N percent.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: default_error_tail(),
            tail_lines: 0,
            progress_step: default_progress_step(),
        }
    }
}

/// Correlation analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default)]
    pub mode: AnalysisMode,
    #[serde(default)]
    pub correlation_method: CorrelationMethod,
    /// Preferred language for the Source 1 analysis track.
    #[serde(default)]
    pub lang_source1: Option<String>,
    /// Preferred language for secondary analysis tracks.
    #[serde(default)]
    pub lang_others: Option<String>,
    #[serde(default = "default_chunk_count")]
    pub scan_chunk_count: u32,
    /// Seconds per chunk.
    #[serde(default = "default_chunk_duration")]
    pub scan_chunk_duration: u32,
    #[serde(default = "default_scan_start")]
    pub scan_start_percentage: f64,
    #[serde(default = "default_scan_end")]
    pub scan_end_percentage: f64,
    /// Minimum match confidence for a chunk to be accepted (0-100).
    #[serde(default = "default_min_match_pct")]
    pub min_match_pct: f64,
    #[serde(default = "default_min_accepted_chunks")]
    pub min_accepted_chunks: u32,
    /// Decode sample rate for analysis audio.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_true")]
    pub use_soxr: bool,
    /// Parabolic sub-sample peak refinement (SCC only).
    #[serde(default = "default_true")]
    pub audio_peak_fit: bool,
    #[serde(default)]
    pub filtering_method: FilteringMethod,
    #[serde(default = "default_bandpass_lowcut")]
    pub filter_bandpass_lowcut_hz: f64,
    #[serde(default = "default_bandpass_highcut")]
    pub filter_bandpass_highcut_hz: f64,
    #[serde(default = "default_bandpass_order")]
    pub filter_bandpass_order: u32,
    #[serde(default = "default_lowpass_taps")]
    pub filter_lowpass_taps: u32,
    /// Low-pass cutoff (Hz); <= 0 disables the filter.
    #[serde(default)]
    pub audio_bandlimit_hz: f64,
    #[serde(default)]
    pub delay_selection_mode: DelaySelectionMode,
    #[serde(default = "default_early_cluster_window")]
    pub early_cluster_window: u32,
    #[serde(default = "default_early_cluster_threshold")]
    pub early_cluster_threshold: u32,
    #[serde(default = "default_first_stable_min_chunks")]
    pub first_stable_min_chunks: u32,
    #[serde(default)]
    pub first_stable_skip_unstable: bool,
    #[serde(default)]
    pub sync_mode: SyncMode,
    #[serde(default = "default_videodiff_error_min")]
    pub videodiff_error_min: f64,
    #[serde(default = "default_videodiff_error_max")]
    pub videodiff_error_max: f64,
    /// DBSCAN neighborhood radius for stepping detection (ms).
    #[serde(default = "default_dbscan_epsilon")]
    pub detection_dbscan_epsilon_ms: f64,
    #[serde(default = "default_dbscan_min_samples")]
    pub detection_dbscan_min_samples: u32,
    #[serde(default = "default_drift_slope_lossy")]
    pub drift_detection_slope_threshold_lossy: f64,
    #[serde(default = "default_drift_slope_lossless")]
    pub drift_detection_slope_threshold_lossless: f64,
    #[serde(default = "default_drift_r2")]
    pub drift_detection_r2_threshold: f64,
    #[serde(default = "default_drift_r2_lossless")]
    pub drift_detection_r2_threshold_lossless: f64,
    /// Warn when accepted-chunk delay std-dev exceeds this (ms; 0 disables).
    #[serde(default = "default_stability_variance")]
    pub sync_stability_variance_threshold: f64,
    #[serde(default = "default_stability_min_chunks")]
    pub sync_stability_min_chunks: u32,
}

fn default_chunk_count() -> u32 {
    10
}

fn default_chunk_duration() -> u32 {
    15
}

fn default_scan_start() -> f64 {
    5.0
}

fn default_scan_end() -> f64 {
    95.0
}

fn default_min_match_pct() -> f64 {
    5.0
}

fn default_min_accepted_chunks() -> u32 {
    3
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_bandpass_lowcut() -> f64 {
    300.0
}

fn default_bandpass_highcut() -> f64 {
    3400.0
}

fn default_bandpass_order() -> u32 {
    5
}

fn default_lowpass_taps() -> u32 {
    101
}

fn default_early_cluster_window() -> u32 {
    10
}

fn default_early_cluster_threshold() -> u32 {
    5
}

fn default_first_stable_min_chunks() -> u32 {
    3
}

fn default_videodiff_error_min() -> f64 {
    0.0
}

fn default_videodiff_error_max() -> f64 {
    100.0
}

fn default_dbscan_epsilon() -> f64 {
    20.0
}

fn default_dbscan_min_samples() -> u32 {
    2
}

fn default_drift_slope_lossy() -> f64 {
    0.5
}

fn default_drift_slope_lossless() -> f64 {
    0.1
}

fn default_drift_r2() -> f64 {
    0.7
}

fn default_drift_r2_lossless() -> f64 {
    0.9
}

fn default_stability_variance() -> f64 {
    5.0
}

fn default_stability_min_chunks() -> u32 {
    3
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::default(),
            correlation_method: CorrelationMethod::default(),
            lang_source1: None,
            lang_others: None,
            scan_chunk_count: default_chunk_count(),
            scan_chunk_duration: default_chunk_duration(),
            scan_start_percentage: default_scan_start(),
            scan_end_percentage: default_scan_end(),
            min_match_pct: default_min_match_pct(),
            min_accepted_chunks: default_min_accepted_chunks(),
            sample_rate: default_sample_rate(),
            use_soxr: true,
            audio_peak_fit: true,
            filtering_method: FilteringMethod::default(),
            filter_bandpass_lowcut_hz: default_bandpass_lowcut(),
            filter_bandpass_highcut_hz: default_bandpass_highcut(),
            filter_bandpass_order: default_bandpass_order(),
            filter_lowpass_taps: default_lowpass_taps(),
            audio_bandlimit_hz: 0.0,
            delay_selection_mode: DelaySelectionMode::default(),
            early_cluster_window: default_early_cluster_window(),
            early_cluster_threshold: default_early_cluster_threshold(),
            first_stable_min_chunks: default_first_stable_min_chunks(),
            first_stable_skip_unstable: false,
            sync_mode: SyncMode::default(),
            videodiff_error_min: default_videodiff_error_min(),
            videodiff_error_max: default_videodiff_error_max(),
            detection_dbscan_epsilon_ms: default_dbscan_epsilon(),
            detection_dbscan_min_samples: default_dbscan_min_samples(),
            drift_detection_slope_threshold_lossy: default_drift_slope_lossy(),
            drift_detection_slope_threshold_lossless: default_drift_slope_lossless(),
            drift_detection_r2_threshold: default_drift_r2(),
            drift_detection_r2_threshold_lossless: default_drift_r2_lossless(),
            sync_stability_variance_threshold: default_stability_variance(),
            sync_stability_min_chunks: default_stability_min_chunks(),
        }
    }
}

/// Stepping coarse/fine scan and per-segment drift settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSettings {
    /// Coarse scan window length (s).
    #[serde(default = "default_coarse_chunk")]
    pub coarse_chunk_s: f64,
    /// Coarse scan step (s).
    #[serde(default = "default_coarse_step")]
    pub coarse_step_s: f64,
    /// Half-width of the lag search window (s).
    #[serde(default = "default_search_locality")]
    pub search_locality_s: f64,
    /// Binary search iterations for boundary refinement.
    #[serde(default = "default_fine_iterations")]
    pub fine_iterations: u32,
    /// Chunk length used inside the binary search (s).
    #[serde(default = "default_fine_chunk")]
    pub fine_chunk_s: f64,
    /// Adjacent coarse points further apart than this open a transition zone (ms).
    #[serde(default = "default_triage_std_dev")]
    pub triage_std_dev_ms: f64,
    /// Minimum peak/median ratio for a coarse point to count.
    #[serde(default = "default_min_confidence_ratio")]
    pub min_confidence_ratio: f64,
    /// R-squared needed before a segment's internal drift is trusted.
    #[serde(default = "default_segment_drift_r2")]
    pub drift_r2_threshold: f64,
    /// Slope magnitude needed before a segment's internal drift is trusted (ms/s).
    #[serde(default = "default_segment_drift_slope")]
    pub drift_slope_threshold: f64,
    /// Outliers are scans beyond k sigma of the median.
    #[serde(default = "default_outlier_sensitivity")]
    pub drift_outlier_sensitivity: f64,
    /// Edge buffer excluded from drift scans, percent of segment length.
    #[serde(default = "default_scan_buffer_pct")]
    pub drift_scan_buffer_pct: f64,
    #[serde(default)]
    pub resample_engine: ResampleEngine,
    /// Keep pitch when rubberband changes tempo.
    #[serde(default = "default_true")]
    pub rb_pitch_correct: bool,
    #[serde(default = "default_rb_transients")]
    pub rb_transients: String,
    #[serde(default)]
    pub rb_smoother: bool,
    #[serde(default)]
    pub rb_pitchq: bool,
    /// Chunk count override for the QA re-correlation.
    #[serde(default = "default_qa_chunk_count")]
    pub qa_chunk_count: u32,
    /// Accepted-chunk minimum for the QA re-correlation.
    #[serde(default = "default_qa_min_accepted")]
    pub qa_min_accepted_chunks: u32,
    /// Match threshold for the QA re-correlation (0-100).
    #[serde(default = "default_qa_threshold")]
    pub qa_threshold: f64,
}

fn default_coarse_chunk() -> f64 {
    10.0
}

fn default_coarse_step() -> f64 {
    15.0
}

fn default_search_locality() -> f64 {
    60.0
}

fn default_fine_iterations() -> u32 {
    10
}

fn default_fine_chunk() -> f64 {
    2.0
}

fn default_triage_std_dev() -> f64 {
    40.0
}

fn default_min_confidence_ratio() -> f64 {
    4.0
}

fn default_segment_drift_r2() -> f64 {
    0.75
}

fn default_segment_drift_slope() -> f64 {
    1.0
}

fn default_outlier_sensitivity() -> f64 {
    2.5
}

fn default_scan_buffer_pct() -> f64 {
    10.0
}

fn default_rb_transients() -> String {
    "crisp".to_string()
}

fn default_qa_chunk_count() -> u32 {
    30
}

fn default_qa_min_accepted() -> u32 {
    10
}

fn default_qa_threshold() -> f64 {
    50.0
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            coarse_chunk_s: default_coarse_chunk(),
            coarse_step_s: default_coarse_step(),
            search_locality_s: default_search_locality(),
            fine_iterations: default_fine_iterations(),
            fine_chunk_s: default_fine_chunk(),
            triage_std_dev_ms: default_triage_std_dev(),
            min_confidence_ratio: default_min_confidence_ratio(),
            drift_r2_threshold: default_segment_drift_r2(),
            drift_slope_threshold: default_segment_drift_slope(),
            drift_outlier_sensitivity: default_outlier_sensitivity(),
            drift_scan_buffer_pct: default_scan_buffer_pct(),
            resample_engine: ResampleEngine::default(),
            rb_pitch_correct: true,
            rb_transients: default_rb_transients(),
            rb_smoother: false,
            rb_pitchq: false,
            qa_chunk_count: default_qa_chunk_count(),
            qa_min_accepted_chunks: default_qa_min_accepted(),
            qa_threshold: default_qa_threshold(),
        }
    }
}

/// Stepping detection policy, boundary snapping, and gap fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteppingSettings {
    #[serde(default)]
    pub correction_mode: SteppingCorrectionMode,
    #[serde(default)]
    pub quality_mode: SteppingQualityMode,
    #[serde(default)]
    pub filtered_fallback: SteppingFallbackMode,
    /// Custom quality thresholds, used when quality_mode = "custom".
    #[serde(default = "default_min_chunks_per_cluster")]
    pub min_chunks_per_cluster: u32,
    #[serde(default = "default_min_cluster_percentage")]
    pub min_cluster_percentage: f64,
    #[serde(default = "default_min_cluster_duration")]
    pub min_cluster_duration_s: f64,
    #[serde(default = "default_min_match_quality")]
    pub min_match_quality_pct: f64,
    #[serde(default = "default_min_total_clusters")]
    pub min_total_clusters: u32,
    /// Stepping-specific coarse scan range, independent of analysis range.
    #[serde(default)]
    pub scan_start_percentage: f64,
    #[serde(default = "default_stepping_scan_end")]
    pub scan_end_percentage: f64,
    #[serde(default = "default_true")]
    pub snap_to_silence: bool,
    #[serde(default)]
    pub silence_detection_method: SilenceDetectionMethod,
    /// Half-width of the silence search window around a boundary (s).
    #[serde(default = "default_silence_search_window")]
    pub silence_search_window_s: f64,
    /// RMS silence threshold (dBFS).
    #[serde(default = "default_silence_threshold_db")]
    pub silence_threshold_db: f64,
    #[serde(default = "default_silence_min_duration")]
    pub silence_min_duration_ms: f64,
    /// silencedetect noise threshold (dB).
    #[serde(default = "default_ffmpeg_silence_noise")]
    pub ffmpeg_silence_noise: f64,
    /// silencedetect minimum duration (s).
    #[serde(default = "default_ffmpeg_silence_duration")]
    pub ffmpeg_silence_duration: f64,
    #[serde(default)]
    pub vad_enabled: bool,
    #[serde(default = "default_true")]
    pub vad_avoid_speech: bool,
    /// Analysis frame for the energy/ZCR voice detector (ms).
    #[serde(default = "default_vad_frame_ms")]
    pub vad_frame_duration_ms: u32,
    #[serde(default = "default_true")]
    pub transient_detection_enabled: bool,
    /// dB jump between adjacent RMS windows that counts as a transient.
    #[serde(default = "default_transient_threshold")]
    pub transient_threshold_db: f64,
    #[serde(default = "default_transient_avoid_window")]
    pub transient_avoid_window_ms: f64,
    #[serde(default = "default_fusion_weight_silence")]
    pub fusion_weight_silence: f64,
    #[serde(default = "default_fusion_weight_no_speech")]
    pub fusion_weight_no_speech: f64,
    #[serde(default = "default_fusion_weight_duration")]
    pub fusion_weight_duration: f64,
    #[serde(default = "default_fusion_weight_no_transient")]
    pub fusion_weight_no_transient: f64,
    #[serde(default)]
    pub snap_to_video_frames: bool,
    /// Keyframes further away than this are not snapped to (s).
    #[serde(default = "default_video_snap_max_offset")]
    pub video_snap_max_offset_s: f64,
    #[serde(default)]
    pub fill_mode: FillMode,
    /// Below this normalized correlation, reference content is considered
    /// missing from the target and inserted as the fill.
    #[serde(default = "default_content_correlation_threshold")]
    pub content_correlation_threshold: f64,
    #[serde(default = "default_content_search_window")]
    pub content_search_window_s: f64,
    /// Shift subtitle events by the stepping EDL.
    #[serde(default = "default_true")]
    pub adjust_subtitles: bool,
    /// Run full Phase A for subs-only sources so their EDL is QA-verified.
    #[serde(default = "default_true")]
    pub adjust_subtitles_no_audio: bool,
    #[serde(default = "default_preserved_label")]
    pub preserved_track_label: String,
    #[serde(default = "default_corrected_label")]
    pub corrected_track_label: String,
}

fn default_min_chunks_per_cluster() -> u32 {
    3
}

fn default_min_cluster_percentage() -> f64 {
    5.0
}

fn default_min_cluster_duration() -> f64 {
    20.0
}

fn default_min_match_quality() -> f64 {
    85.0
}

fn default_min_total_clusters() -> u32 {
    2
}

fn default_stepping_scan_end() -> f64 {
    100.0
}

fn default_silence_search_window() -> f64 {
    3.0
}

fn default_silence_threshold_db() -> f64 {
    -40.0
}

fn default_silence_min_duration() -> f64 {
    100.0
}

fn default_ffmpeg_silence_noise() -> f64 {
    -35.0
}

fn default_ffmpeg_silence_duration() -> f64 {
    0.2
}

fn default_vad_frame_ms() -> u32 {
    30
}

fn default_transient_threshold() -> f64 {
    12.0
}

fn default_transient_avoid_window() -> f64 {
    150.0
}

fn default_fusion_weight_silence() -> f64 {
    10.0
}

fn default_fusion_weight_no_speech() -> f64 {
    8.0
}

fn default_fusion_weight_duration() -> f64 {
    5.0
}

fn default_fusion_weight_no_transient() -> f64 {
    3.0
}

fn default_video_snap_max_offset() -> f64 {
    2.0
}

fn default_content_correlation_threshold() -> f64 {
    0.3
}

fn default_content_search_window() -> f64 {
    5.0
}

fn default_preserved_label() -> String {
    "Original".to_string()
}

fn default_corrected_label() -> String {
    "Stepping Corrected".to_string()
}

impl Default for SteppingSettings {
    fn default() -> Self {
        Self {
            correction_mode: SteppingCorrectionMode::default(),
            quality_mode: SteppingQualityMode::default(),
            filtered_fallback: SteppingFallbackMode::default(),
            min_chunks_per_cluster: default_min_chunks_per_cluster(),
            min_cluster_percentage: default_min_cluster_percentage(),
            min_cluster_duration_s: default_min_cluster_duration(),
            min_match_quality_pct: default_min_match_quality(),
            min_total_clusters: default_min_total_clusters(),
            scan_start_percentage: 0.0,
            scan_end_percentage: default_stepping_scan_end(),
            snap_to_silence: true,
            silence_detection_method: SilenceDetectionMethod::default(),
            silence_search_window_s: default_silence_search_window(),
            silence_threshold_db: default_silence_threshold_db(),
            silence_min_duration_ms: default_silence_min_duration(),
            ffmpeg_silence_noise: default_ffmpeg_silence_noise(),
            ffmpeg_silence_duration: default_ffmpeg_silence_duration(),
            vad_enabled: false,
            vad_avoid_speech: true,
            vad_frame_duration_ms: default_vad_frame_ms(),
            transient_detection_enabled: true,
            transient_threshold_db: default_transient_threshold(),
            transient_avoid_window_ms: default_transient_avoid_window(),
            fusion_weight_silence: default_fusion_weight_silence(),
            fusion_weight_no_speech: default_fusion_weight_no_speech(),
            fusion_weight_duration: default_fusion_weight_duration(),
            fusion_weight_no_transient: default_fusion_weight_no_transient(),
            snap_to_video_frames: false,
            video_snap_max_offset_s: default_video_snap_max_offset(),
            fill_mode: FillMode::default(),
            content_correlation_threshold: default_content_correlation_threshold(),
            content_search_window_s: default_content_search_window(),
            adjust_subtitles: true,
            adjust_subtitles_no_audio: true,
            preserved_track_label: default_preserved_label(),
            corrected_track_label: default_corrected_label(),
        }
    }
}

/// Chapter handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSettings {
    #[serde(default)]
    pub snap_chapters: bool,
    #[serde(default)]
    pub snap_mode: SnapMode,
    #[serde(default = "default_snap_threshold")]
    pub snap_threshold_ms: u32,
    #[serde(default = "default_true")]
    pub snap_starts_only: bool,
    #[serde(default)]
    pub rename_chapters: bool,
}

fn default_snap_threshold() -> u32 {
    250
}

impl Default for ChapterSettings {
    fn default() -> Self {
        Self {
            snap_chapters: false,
            snap_mode: SnapMode::default(),
            snap_threshold_ms: default_snap_threshold(),
            snap_starts_only: true,
            rename_chapters: false,
        }
    }
}

/// Muxer-level post-processing flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostProcessSettings {
    /// Strip dialog normalization gain from AC-3/E-AC-3 tracks.
    #[serde(default)]
    pub apply_dialog_norm_gain: bool,
    #[serde(default)]
    pub disable_track_statistics_tags: bool,
    #[serde(default = "default_true")]
    pub disable_header_compression: bool,
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self {
            apply_dialog_norm_gain: false,
            disable_track_statistics_tags: false,
            disable_header_compression: true,
        }
    }
}

/// Subtitle timing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubtitleSettings {
    #[serde(default)]
    pub sync_mode: SubtitleSyncMode,
    /// Rounding mode applied when float ms hit the output format.
    #[serde(default)]
    pub rounding: SubtitleRounding,
}
