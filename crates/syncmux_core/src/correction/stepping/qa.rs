//! QA re-correlation of an assembled correction.
//!
//! The assembled track is run back through the standard analysis pipeline
//! with tightened thresholds; the residual delay must be uniform and close
//! to the anchor. A stepping-detected source has no safe fallback, so a QA
//! failure aborts the job.

use std::path::Path;

use crate::analysis::{median, run_audio_correlation};
use crate::config::{AnalysisSettings, SegmentSettings};
use crate::correction::SteppingFlag;
use crate::io::CommandRunner;
use crate::models::{SteppingCorrectionMode, SteppingFallbackMode};

const MEDIAN_TOLERANCE_MS: f64 = 20.0;
const MEDIAN_TOLERANCE_SKIP_MS: f64 = 100.0;
const STD_DEV_LIMIT_MS: f64 = 15.0;
const STD_DEV_LIMIT_SKIP_MS: f64 = 500.0;

/// Verify the corrected track against the reference.
pub fn qa_check(
    corrected_path: &Path,
    ref_file: &Path,
    base_delay_ms: i64,
    flag: &SteppingFlag,
    analysis: &AnalysisSettings,
    segment: &SegmentSettings,
    runner: &CommandRunner,
) -> bool {
    let logger = runner.logger().clone();
    logger.message("  [SteppingCorrector] Performing rigorous QA check on corrected audio map...");

    // Skip-fallback mode leaves filtered regions at their original timing,
    // so the stability gates relax.
    let skip_mode_active = flag.diagnosis.as_ref().is_some_and(|d| {
        d.correction_mode == SteppingCorrectionMode::Filtered
            && d.fallback_mode == SteppingFallbackMode::Skip
            && !d.invalid_cluster_ids.is_empty()
    });
    if skip_mode_active {
        logger.message(
            "  [QA] 'skip' fallback is active with filtered clusters; stability checks are relaxed.",
        );
    }

    let mut qa_settings = analysis.clone();
    qa_settings.scan_chunk_count = segment.qa_chunk_count;
    qa_settings.min_accepted_chunks = segment.qa_min_accepted_chunks;
    qa_settings.min_match_pct = segment.qa_threshold;
    logger.message(&format!(
        "  [QA] Using minimum match confidence of {:.1}% within main scan window.",
        segment.qa_threshold
    ));

    let run = match run_audio_correlation(
        ref_file,
        corrected_path,
        &qa_settings,
        runner,
        qa_settings.lang_source1.as_deref(),
        None,
        "QA",
    ) {
        Ok(run) => run,
        Err(e) => {
            logger.message(&format!("  [QA] FAILED with error: {}", e));
            return false;
        }
    };

    let accepted: Vec<_> = run.chunks.iter().filter(|c| c.accepted).collect();
    if accepted.len() < segment.qa_min_accepted_chunks as usize {
        logger.message(&format!(
            "  [QA] FAILED: Not enough confident chunks ({}/{}).",
            accepted.len(),
            segment.qa_min_accepted_chunks
        ));
        return false;
    }

    let delays: Vec<f64> = accepted.iter().map(|c| c.delay_ms as f64).collect();
    let median_delay = median(&delays);
    let tolerance = if skip_mode_active {
        MEDIAN_TOLERANCE_SKIP_MS
    } else {
        MEDIAN_TOLERANCE_MS
    };
    if (median_delay - base_delay_ms as f64).abs() > tolerance {
        logger.message(&format!(
            "  [QA] FAILED: Median delay ({:.1}ms) does not match base delay ({}ms).",
            median_delay, base_delay_ms
        ));
        return false;
    }

    let mean = delays.iter().sum::<f64>() / delays.len() as f64;
    let std_dev =
        (delays.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / delays.len() as f64).sqrt();
    let std_limit = if skip_mode_active {
        STD_DEV_LIMIT_SKIP_MS
    } else {
        STD_DEV_LIMIT_MS
    };
    if std_dev > std_limit {
        logger.message(&format!(
            "  [QA] FAILED: Delay is unstable (Std Dev = {:.1}ms).",
            std_dev
        ));
        return false;
    }

    logger.message("  [QA] PASSED: Timing map is verified and correct.");
    true
}
