//! Drift and stepping diagnosis.
//!
//! Classifies a chunk series as UNIFORM, PAL_DRIFT, LINEAR_DRIFT, or
//! STEPPING. Stepping goes through DBSCAN clustering plus per-cluster
//! quality validation governed by the configured correction policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{mean_and_std, ChunkResult};
use crate::config::{AnalysisSettings, SteppingSettings};
use crate::logging::JobLogger;
use crate::models::{SteppingCorrectionMode, SteppingFallbackMode, SteppingQualityMode};

/// Expected drift rate of 23.976 fps content sped up to 25 fps, in ms/s.
pub const PAL_DRIFT_RATE_MS_PER_S: f64 = 40.9;
const PAL_DRIFT_TOLERANCE: f64 = 5.0;
const PAL_FRAMERATE_TOLERANCE: f64 = 0.1;
const MIN_CHUNKS_FOR_DIAGNOSIS: usize = 6;

/// Outcome of the timing diagnosis for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Diagnosis {
    /// Delays are consistent; no correction needed.
    Uniform,
    /// NTSC film running at PAL speed.
    PalDrift { rate_ms_per_s: f64 },
    /// Constant-slope drift with a good linear fit.
    LinearDrift { rate_ms_per_s: f64, r_squared: f64 },
    /// Two or more validated delay clusters.
    Stepping(SteppingDiagnosis),
}

/// Composition of one delay cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub id: i32,
    pub mean_delay_ms: f64,
    pub std_delay_ms: f64,
    pub chunk_count: usize,
    /// 1-based chunk numbers, sorted.
    pub chunk_numbers: Vec<usize>,
    /// Span of chunk start times (s), inclusive of the final chunk length.
    pub time_range: (f64, f64),
    pub mean_match_pct: f64,
    pub min_match_pct: f64,
}

/// One metric of a cluster's quality validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityCheck {
    pub label: String,
    pub passed: bool,
    pub value: f64,
    pub threshold: f64,
}

/// Validation verdict for one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterValidation {
    pub valid: bool,
    pub checks: Vec<QualityCheck>,
}

impl ClusterValidation {
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }
}

/// Full stepping diagnosis carried into correction and subtitle processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteppingDiagnosis {
    /// All non-noise clusters, sorted by mean delay.
    pub clusters: Vec<ClusterInfo>,
    pub valid_cluster_ids: Vec<i32>,
    pub invalid_cluster_ids: Vec<i32>,
    pub validations: BTreeMap<i32, ClusterValidation>,
    pub correction_mode: SteppingCorrectionMode,
    pub fallback_mode: SteppingFallbackMode,
}

impl SteppingDiagnosis {
    /// Time ranges covered by invalid clusters (filtered mode drops coarse
    /// scan points inside these).
    pub fn invalid_time_ranges(&self) -> Vec<(f64, f64)> {
        self.clusters
            .iter()
            .filter(|c| self.invalid_cluster_ids.contains(&c.id))
            .map(|c| c.time_range)
            .collect()
    }

    pub fn valid_cluster_count(&self) -> usize {
        self.valid_cluster_ids.len()
    }
}

/// Cluster quality thresholds, from a preset or the custom settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub min_chunks_per_cluster: usize,
    pub min_cluster_percentage: f64,
    pub min_cluster_duration_s: f64,
    pub min_match_quality_pct: f64,
    pub min_total_clusters: usize,
}

impl QualityThresholds {
    pub fn for_mode(mode: SteppingQualityMode, settings: &SteppingSettings) -> Self {
        match mode {
            SteppingQualityMode::Strict => Self {
                min_chunks_per_cluster: 3,
                min_cluster_percentage: 10.0,
                min_cluster_duration_s: 30.0,
                min_match_quality_pct: 90.0,
                min_total_clusters: 3,
            },
            SteppingQualityMode::Normal => Self {
                min_chunks_per_cluster: 3,
                min_cluster_percentage: 5.0,
                min_cluster_duration_s: 20.0,
                min_match_quality_pct: 85.0,
                min_total_clusters: 2,
            },
            SteppingQualityMode::Lenient => Self {
                min_chunks_per_cluster: 2,
                min_cluster_percentage: 3.0,
                min_cluster_duration_s: 10.0,
                min_match_quality_pct: 75.0,
                min_total_clusters: 2,
            },
            SteppingQualityMode::Custom => Self {
                min_chunks_per_cluster: settings.min_chunks_per_cluster as usize,
                min_cluster_percentage: settings.min_cluster_percentage,
                min_cluster_duration_s: settings.min_cluster_duration_s,
                min_match_quality_pct: settings.min_match_quality_pct,
                min_total_clusters: settings.min_total_clusters as usize,
            },
        }
    }
}

/// Classify the chunk series.
///
/// Tests run in order of specificity: PAL drift, stepping, linear drift,
/// then uniform.
pub fn diagnose(
    chunks: &[ChunkResult],
    framerate: Option<f64>,
    codec_id: &str,
    analysis: &AnalysisSettings,
    stepping: &SteppingSettings,
    logger: &JobLogger,
) -> Diagnosis {
    let accepted: Vec<&ChunkResult> = chunks.iter().filter(|c| c.accepted).collect();
    if accepted.len() < MIN_CHUNKS_FOR_DIAGNOSIS {
        return Diagnosis::Uniform;
    }

    let times: Vec<f64> = accepted.iter().map(|c| c.start_s).collect();
    let delays: Vec<f64> = accepted.iter().map(|c| c.delay_ms as f64).collect();

    // Test 1: PAL drift.
    if let Some(fps) = framerate {
        if (fps - 25.0).abs() < PAL_FRAMERATE_TOLERANCE {
            let (slope, _, _) = linear_regression(&times, &delays);
            if (slope - PAL_DRIFT_RATE_MS_PER_S).abs() < PAL_DRIFT_TOLERANCE {
                logger.message(&format!(
                    "[PAL Drift Detected] Framerate is ~25fps and audio drift rate is {:.2} ms/s.",
                    slope
                ));
                return Diagnosis::PalDrift { rate_ms_per_s: slope };
            }
        }
    }

    // Test 2: stepping.
    if let Some(diagnosis) = check_stepping(&accepted, &delays, analysis, stepping, logger) {
        return diagnosis;
    }

    // Test 3: linear drift, codec-aware thresholds.
    let codec_lower = codec_id.to_lowercase();
    let is_lossless = codec_lower.contains("pcm")
        || codec_lower.contains("flac")
        || codec_lower.contains("truehd")
        || codec_lower.contains("mlp");
    let slope_threshold = if is_lossless {
        analysis.drift_detection_slope_threshold_lossless
    } else {
        analysis.drift_detection_slope_threshold_lossy
    };
    let r2_threshold = if is_lossless {
        analysis.drift_detection_r2_threshold_lossless
    } else {
        analysis.drift_detection_r2_threshold
    };

    let (slope, _, r_squared) = linear_regression(&times, &delays);
    logger.message(&format!(
        "[DriftDiagnosis] Codec: {} (lossless={}). Using R²>{:.2}, slope>{:.1} ms/s.",
        codec_lower, is_lossless, r2_threshold, slope_threshold
    ));
    if slope.abs() > slope_threshold && r_squared > r2_threshold {
        logger.message(&format!(
            "[Linear Drift Detected] Delays fit a straight line with R-squared={:.3} and slope={:.2} ms/s.",
            r_squared, slope
        ));
        return Diagnosis::LinearDrift {
            rate_ms_per_s: slope,
            r_squared,
        };
    }

    Diagnosis::Uniform
}

fn check_stepping(
    accepted: &[&ChunkResult],
    delays: &[f64],
    analysis: &AnalysisSettings,
    stepping: &SteppingSettings,
    logger: &JobLogger,
) -> Option<Diagnosis> {
    let labels = dbscan_1d(
        delays,
        analysis.detection_dbscan_epsilon_ms,
        analysis.detection_dbscan_min_samples as usize,
    );

    let mut members: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        if label >= 0 {
            members.entry(label).or_default().push(idx);
        }
    }
    if members.len() <= 1 {
        return None;
    }

    if stepping.correction_mode == SteppingCorrectionMode::Disabled {
        logger.message(&format!(
            "[Stepping] Found {} timing clusters, but stepping correction is disabled.",
            members.len()
        ));
        return Some(Diagnosis::Uniform);
    }

    logger.message(&format!(
        "[Stepping Detection] Found {} timing clusters",
        members.len()
    ));
    logger.message(&format!(
        "[Stepping] Correction mode: {:?}, Quality mode: {:?}",
        stepping.correction_mode, stepping.quality_mode
    ));

    let thresholds = QualityThresholds::for_mode(stepping.quality_mode, stepping);
    let chunk_duration = analysis.scan_chunk_duration as f64;
    let total_chunks = accepted.len();

    let mut clusters: Vec<ClusterInfo> = Vec::new();
    let mut validations: BTreeMap<i32, ClusterValidation> = BTreeMap::new();
    let mut valid_ids = Vec::new();
    let mut invalid_ids = Vec::new();

    for (&label, indices) in &members {
        let info = build_cluster_info(label, indices, accepted, chunk_duration);
        let validation = validate_cluster(&info, total_chunks, &thresholds);
        log_cluster_validation(&info, &validation, logger);
        if validation.valid {
            valid_ids.push(label);
        } else {
            invalid_ids.push(label);
        }
        validations.insert(label, validation);
        clusters.push(info);
    }
    clusters.sort_by(|a, b| a.mean_delay_ms.partial_cmp(&b.mean_delay_ms).unwrap());

    narrate_transitions(&clusters, logger);

    let accept = match stepping.correction_mode {
        SteppingCorrectionMode::Full | SteppingCorrectionMode::Strict => {
            if !invalid_ids.is_empty() {
                logger.message(&format!(
                    "[Stepping Rejected] {}/{} clusters failed validation in '{:?}' mode.",
                    invalid_ids.len(),
                    clusters.len(),
                    stepping.correction_mode
                ));
                logger.message(
                    "  -> Treating as uniform delay. Switch to 'filtered' mode to use valid clusters only.",
                );
                false
            } else if valid_ids.len() < thresholds.min_total_clusters {
                logger.message(&format!(
                    "[Stepping Rejected] Only {} clusters (need {}+).",
                    valid_ids.len(),
                    thresholds.min_total_clusters
                ));
                false
            } else {
                logger.message(&format!(
                    "[Stepping Accepted] All {} clusters passed validation.",
                    valid_ids.len()
                ));
                true
            }
        }
        SteppingCorrectionMode::Filtered => {
            if valid_ids.len() < thresholds.min_total_clusters {
                logger.message(&format!(
                    "[Filtered Stepping Rejected] Only {} valid clusters (need {}+).",
                    valid_ids.len(),
                    thresholds.min_total_clusters
                ));
                false
            } else if stepping.filtered_fallback == SteppingFallbackMode::Reject
                && !invalid_ids.is_empty()
            {
                logger.message(&format!(
                    "[Filtered Stepping Rejected] Fallback mode is 'reject' and {} clusters were filtered.",
                    invalid_ids.len()
                ));
                false
            } else {
                logger.message(&format!(
                    "[Filtered Stepping Accepted] Using {}/{} valid clusters (filtered {}).",
                    valid_ids.len(),
                    clusters.len(),
                    invalid_ids.len()
                ));
                if !invalid_ids.is_empty() {
                    logger.message(&format!(
                        "  -> Filtered regions will use fallback mode: '{:?}'",
                        stepping.filtered_fallback
                    ));
                }
                true
            }
        }
        SteppingCorrectionMode::Disabled => false,
    };

    if !accept {
        return Some(Diagnosis::Uniform);
    }

    Some(Diagnosis::Stepping(SteppingDiagnosis {
        clusters,
        valid_cluster_ids: valid_ids,
        invalid_cluster_ids: invalid_ids,
        validations,
        correction_mode: stepping.correction_mode,
        fallback_mode: stepping.filtered_fallback,
    }))
}

fn build_cluster_info(
    label: i32,
    indices: &[usize],
    accepted: &[&ChunkResult],
    chunk_duration_s: f64,
) -> ClusterInfo {
    let delays: Vec<f64> = indices.iter().map(|&i| accepted[i].delay_ms as f64).collect();
    let (mean_delay, std_delay) = mean_and_std(&delays);

    let starts: Vec<f64> = indices.iter().map(|&i| accepted[i].start_s).collect();
    let min_time = starts.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_time = starts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let matches: Vec<f64> = indices.iter().map(|&i| accepted[i].match_pct).collect();
    let mean_match = matches.iter().sum::<f64>() / matches.len() as f64;
    let min_match = matches.iter().cloned().fold(f64::INFINITY, f64::min);

    let mut chunk_numbers: Vec<usize> = indices.iter().map(|&i| i + 1).collect();
    chunk_numbers.sort_unstable();

    ClusterInfo {
        id: label,
        mean_delay_ms: mean_delay,
        std_delay_ms: std_delay,
        chunk_count: indices.len(),
        chunk_numbers,
        time_range: (min_time, max_time + chunk_duration_s),
        mean_match_pct: mean_match,
        min_match_pct: min_match,
    }
}

fn validate_cluster(
    info: &ClusterInfo,
    total_chunks: usize,
    thresholds: &QualityThresholds,
) -> ClusterValidation {
    let percentage = if total_chunks > 0 {
        info.chunk_count as f64 / total_chunks as f64 * 100.0
    } else {
        0.0
    };
    let duration = info.time_range.1 - info.time_range.0;

    let checks = vec![
        QualityCheck {
            label: "Chunks".to_string(),
            passed: info.chunk_count >= thresholds.min_chunks_per_cluster,
            value: info.chunk_count as f64,
            threshold: thresholds.min_chunks_per_cluster as f64,
        },
        QualityCheck {
            label: "Percentage".to_string(),
            passed: percentage >= thresholds.min_cluster_percentage,
            value: percentage,
            threshold: thresholds.min_cluster_percentage,
        },
        QualityCheck {
            label: "Duration".to_string(),
            passed: duration >= thresholds.min_cluster_duration_s,
            value: duration,
            threshold: thresholds.min_cluster_duration_s,
        },
        QualityCheck {
            label: "Match quality".to_string(),
            passed: info.mean_match_pct >= thresholds.min_match_quality_pct,
            value: info.mean_match_pct,
            threshold: thresholds.min_match_quality_pct,
        },
    ];

    ClusterValidation {
        valid: checks.iter().all(|c| c.passed),
        checks,
    }
}

fn log_cluster_validation(info: &ClusterInfo, validation: &ClusterValidation, logger: &JobLogger) {
    logger.message(&format!(
        "  Cluster {} (@{:.1}s - {:.1}s): {:+.0}ms",
        info.id + 1,
        info.time_range.0,
        info.time_range.1,
        info.mean_delay_ms
    ));
    for check in &validation.checks {
        let symbol = if check.passed { "ok" } else { "FAIL" };
        logger.message(&format!(
            "    [{}] {}: {:.1} (need {:.1}+)",
            symbol, check.label, check.value, check.threshold
        ));
    }
    let status = if validation.valid { "ACCEPTED" } else { "FILTERED OUT" };
    logger.message(&format!(
        "    -> STATUS: {} ({}/{} checks passed)",
        status,
        validation.passed_count(),
        validation.checks.len()
    ));
}

/// Narrate cluster composition and the pattern of delay jumps.
fn narrate_transitions(clusters: &[ClusterInfo], logger: &JobLogger) {
    if clusters.len() < 2 {
        return;
    }

    logger.message("[Cluster Diagnostics] Detailed composition:");
    for (i, cluster) in clusters.iter().enumerate() {
        let jump_note = if i > 0 {
            let jump = cluster.mean_delay_ms - clusters[i - 1].mean_delay_ms;
            format!(" [{:+.0}ms jump]", jump)
        } else {
            String::new()
        };
        logger.message(&format!(
            "  Cluster {}: delay={:+.0}±{:.1}ms, chunks {} (@{:.1}s - @{:.1}s), match={:.1}% (min={:.1}%){}",
            i + 1,
            cluster.mean_delay_ms,
            cluster.std_delay_ms,
            format_chunk_range(&cluster.chunk_numbers),
            cluster.time_range.0,
            cluster.time_range.1,
            cluster.mean_match_pct,
            cluster.min_match_pct,
            jump_note
        ));
    }

    let jumps: Vec<f64> = clusters
        .windows(2)
        .map(|pair| pair[1].mean_delay_ms - pair[0].mean_delay_ms)
        .collect();

    logger.message("[Transition Analysis]:");
    if jumps.iter().all(|&j| j > 0.0) {
        logger.message("  -> All delays INCREASE (accumulating lag = missing content)");
    } else if jumps.iter().all(|&j| j < 0.0) {
        logger.message("  -> All delays DECREASE (accumulating lead = extra content)");
    } else {
        logger.message("  -> Mixed pattern (some increases, some decreases)");
    }

    let jump_sizes: Vec<f64> = jumps.iter().map(|j| j.abs()).collect();
    let mean_jump = jump_sizes.iter().sum::<f64>() / jump_sizes.len() as f64;
    let consistent = jump_sizes.iter().all(|j| (j - mean_jump).abs() < 50.0);
    if consistent && jumps.len() > 1 {
        logger.message(&format!(
            "  -> Consistent jump size: ~{:.0}ms per transition (likely reel changes or breaks)",
            mean_jump
        ));
    } else {
        logger.message(&format!(
            "  -> Variable jump sizes: {}",
            jumps
                .iter()
                .map(|j| format!("{:+.0}ms", j))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    let low_match = clusters.iter().filter(|c| c.min_match_pct < 70.0).count();
    if low_match > 0 {
        logger.message(&format!(
            "  [WARN] {} clusters have chunks with match < 70% (possible silence or content mismatch at transitions)",
            low_match
        ));
    }
}

/// Format 1-based chunk numbers as compact ranges, e.g. `1-3,5-25,30`.
pub fn format_chunk_range(chunk_numbers: &[usize]) -> String {
    if chunk_numbers.is_empty() {
        return String::new();
    }
    let mut ranges = Vec::new();
    let mut start = chunk_numbers[0];
    let mut end = chunk_numbers[0];
    for &num in &chunk_numbers[1..] {
        if num == end + 1 {
            end = num;
        } else {
            ranges.push(if start == end {
                format!("{}", start)
            } else {
                format!("{}-{}", start, end)
            });
            start = num;
            end = num;
        }
    }
    ranges.push(if start == end {
        format!("{}", start)
    } else {
        format!("{}-{}", start, end)
    });
    ranges.join(",")
}

/// Least-squares fit `y = slope * x + intercept`; returns
/// `(slope, intercept, r_squared)`.
pub fn linear_regression(x: &[f64], y: &[f64]) -> (f64, f64, f64) {
    if x.len() < 2 || x.len() != y.len() {
        return (0.0, 0.0, 0.0);
    }
    let n = x.len() as f64;
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..x.len() {
        num += (x[i] - x_mean) * (y[i] - y_mean);
        den += (x[i] - x_mean).powi(2);
    }
    if den.abs() < 1e-10 {
        return (0.0, y_mean, 0.0);
    }

    let slope = num / den;
    let intercept = y_mean - slope * x_mean;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for i in 0..x.len() {
        let predicted = slope * x[i] + intercept;
        ss_res += (y[i] - predicted).powi(2);
        ss_tot += (y[i] - y_mean).powi(2);
    }
    let r_squared = if ss_tot.abs() < 1e-10 {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).max(0.0)
    };

    (slope, intercept, r_squared)
}

/// 1-D DBSCAN. Returns a cluster label per point; -1 marks noise.
pub fn dbscan_1d(values: &[f64], epsilon: f64, min_samples: usize) -> Vec<i32> {
    let n = values.len();
    let mut labels = vec![-1i32; n];
    let mut cluster_id = 0i32;

    for i in 0..n {
        if labels[i] != -1 {
            continue;
        }
        let neighbors: Vec<usize> = (0..n)
            .filter(|&j| (values[i] - values[j]).abs() <= epsilon)
            .collect();
        if neighbors.len() < min_samples {
            continue;
        }

        labels[i] = cluster_id;
        let mut queue = neighbors;
        let mut head = 0;
        while head < queue.len() {
            let j = queue[head];
            head += 1;
            if labels[j] >= 0 && labels[j] != cluster_id {
                continue;
            }
            labels[j] = cluster_id;

            let j_neighbors: Vec<usize> = (0..n)
                .filter(|&k| (values[j] - values[k]).abs() <= epsilon)
                .collect();
            if j_neighbors.len() >= min_samples {
                for k in j_neighbors {
                    if labels[k] == -1 {
                        queue.push(k);
                    }
                }
            }
        }
        cluster_id += 1;
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{JobLogger, LogConfig};

    fn logger() -> JobLogger {
        JobLogger::sink_only("drift", LogConfig::default(), None)
    }

    fn chunk(start_s: f64, delay_ms: f64) -> ChunkResult {
        ChunkResult::new(delay_ms, 95.0, start_s, 5.0)
    }

    fn series(points: &[(f64, f64)]) -> Vec<ChunkResult> {
        points.iter().map(|&(t, d)| chunk(t, d)).collect()
    }

    fn default_settings() -> (AnalysisSettings, SteppingSettings) {
        (AnalysisSettings::default(), SteppingSettings::default())
    }

    #[test]
    fn uniform_delays_stay_uniform() {
        let (analysis, stepping) = default_settings();
        let chunks = series(&(0..10).map(|i| (i as f64 * 100.0, -500.0)).collect::<Vec<_>>());
        let diagnosis = diagnose(&chunks, None, "A_AAC", &analysis, &stepping, &logger());
        assert!(matches!(diagnosis, Diagnosis::Uniform));
    }

    #[test]
    fn pal_drift_requires_25fps() {
        let (analysis, stepping) = default_settings();
        let points: Vec<(f64, f64)> = (0..10).map(|i| {
            let t = i as f64 * 100.0;
            (t, t * PAL_DRIFT_RATE_MS_PER_S)
        }).collect();
        let chunks = series(&points);

        let at_25 = diagnose(&chunks, Some(25.0), "A_AC3", &analysis, &stepping, &logger());
        assert!(matches!(at_25, Diagnosis::PalDrift { .. }));

        let at_24 = diagnose(&chunks, Some(23.976), "A_AC3", &analysis, &stepping, &logger());
        assert!(!matches!(at_24, Diagnosis::PalDrift { .. }));
    }

    #[test]
    fn linear_drift_detected_with_good_fit() {
        let (analysis, stepping) = default_settings();
        let points: Vec<(f64, f64)> = (0..10).map(|i| {
            let t = i as f64 * 100.0;
            (t, t * 2.0)
        }).collect();
        let chunks = series(&points);
        // 2 ms/s over 900 s spans 1800 ms; DBSCAN at eps=20 sees many small
        // clusters but each lacks min duration, so stepping is rejected and
        // the linear test runs.
        let diagnosis = diagnose(&chunks, None, "A_AAC", &analysis, &stepping, &logger());
        match diagnosis {
            Diagnosis::LinearDrift { rate_ms_per_s, r_squared } => {
                assert!((rate_ms_per_s - 2.0).abs() < 0.1);
                assert!(r_squared > 0.9);
            }
            other => panic!("expected linear drift, got {:?}", other),
        }
    }

    #[test]
    fn stepping_detected_for_two_solid_clusters() {
        let (analysis, mut stepping) = default_settings();
        stepping.quality_mode = SteppingQualityMode::Lenient;
        let mut points = Vec::new();
        for i in 0..10 {
            points.push((i as f64 * 60.0, 0.0));
        }
        for i in 10..20 {
            points.push((i as f64 * 60.0, 120.0));
        }
        let chunks = series(&points);
        let diagnosis = diagnose(&chunks, None, "A_AAC", &analysis, &stepping, &logger());
        match diagnosis {
            Diagnosis::Stepping(d) => {
                assert_eq!(d.clusters.len(), 2);
                assert_eq!(d.valid_cluster_count(), 2);
            }
            other => panic!("expected stepping, got {:?}", other),
        }
    }

    #[test]
    fn stepping_disabled_never_emits_stepping() {
        let (analysis, mut stepping) = default_settings();
        stepping.correction_mode = SteppingCorrectionMode::Disabled;
        let mut points = Vec::new();
        for i in 0..10 {
            points.push((i as f64 * 60.0, 0.0));
        }
        for i in 10..20 {
            points.push((i as f64 * 60.0, 120.0));
        }
        let chunks = series(&points);
        let diagnosis = diagnose(&chunks, None, "A_AAC", &analysis, &stepping, &logger());
        assert!(matches!(diagnosis, Diagnosis::Uniform));
    }

    #[test]
    fn full_mode_rejects_when_any_cluster_invalid() {
        let (analysis, stepping) = default_settings();
        // Second cluster has only 2 chunks: fails "normal" min_chunks (3).
        let mut points = Vec::new();
        for i in 0..10 {
            points.push((i as f64 * 60.0, 0.0));
        }
        points.push((700.0, 150.0));
        points.push((760.0, 150.0));
        let chunks = series(&points);
        let diagnosis = diagnose(&chunks, None, "A_AAC", &analysis, &stepping, &logger());
        assert!(matches!(diagnosis, Diagnosis::Uniform));
    }

    #[test]
    fn filtered_mode_keeps_valid_clusters() {
        let (analysis, mut stepping) = default_settings();
        stepping.correction_mode = SteppingCorrectionMode::Filtered;
        stepping.quality_mode = SteppingQualityMode::Lenient;
        let mut points = Vec::new();
        for i in 0..10 {
            points.push((i as f64 * 60.0, 0.0));
        }
        for i in 10..20 {
            points.push((i as f64 * 60.0, 120.0));
        }
        let mut chunks = series(&points);
        // Low-confidence third cluster fails the match-quality gate.
        chunks.push(ChunkResult::new(400.0, 40.0, 1300.0, 5.0));
        chunks.push(ChunkResult::new(401.0, 42.0, 1315.0, 5.0));
        let diagnosis = diagnose(&chunks, None, "A_AAC", &analysis, &stepping, &logger());
        match diagnosis {
            Diagnosis::Stepping(d) => {
                assert_eq!(d.valid_cluster_count(), 2);
                assert_eq!(d.invalid_cluster_ids.len(), 1);
                assert_eq!(d.invalid_time_ranges().len(), 1);
            }
            other => panic!("expected filtered stepping, got {:?}", other),
        }
    }

    #[test]
    fn linear_regression_recovers_line() {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![10.0, 12.0, 14.0, 16.0, 18.0];
        let (slope, intercept, r2) = linear_regression(&x, &y);
        assert!((slope - 2.0).abs() < 1e-9);
        assert!((intercept - 10.0).abs() < 1e-9);
        assert!((r2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn dbscan_separates_clusters_and_noise() {
        let values = vec![0.0, 1.0, 2.0, 100.0, 101.0, 102.0, 1000.0];
        let labels = dbscan_1d(&values, 10.0, 2);
        let unique: std::collections::HashSet<i32> =
            labels.iter().copied().filter(|&l| l >= 0).collect();
        assert_eq!(unique.len(), 2);
        assert_eq!(labels[6], -1);
    }

    #[test]
    fn chunk_range_formatting() {
        assert_eq!(format_chunk_range(&[1, 2, 3, 5, 6, 9]), "1-3,5-6,9");
        assert_eq!(format_chunk_range(&[4]), "4");
        assert_eq!(format_chunk_range(&[]), "");
    }
}
