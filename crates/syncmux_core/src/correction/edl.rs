//! Edit decision lists.

use serde::{Deserialize, Serialize};

use crate::analysis::{ChunkResult, SteppingDiagnosis};
use crate::logging::JobLogger;
use crate::models::SteppingCorrectionMode;

/// One action point on the target timeline.
///
/// `delay_ms` applies from `start_s` until the next segment's start. The
/// first segment of a well-formed EDL starts at 0 and starts are strictly
/// increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    /// Start on the target timeline (s).
    pub start_s: f64,
    /// End on the target timeline; redundant with the next start but carried
    /// explicitly.
    pub end_s: f64,
    /// Delay for mux-level sync (ms, rounded).
    pub delay_ms: i64,
    /// Raw delay for subtitle math (ms).
    pub delay_raw: f64,
    /// Time-stretch inside the segment; 0 means none.
    pub drift_rate_ms_s: f64,
}

impl AudioSegment {
    pub fn new(start_s: f64, delay_ms: i64, delay_raw: f64) -> Self {
        Self {
            start_s,
            end_s: start_s,
            delay_ms,
            delay_raw,
            drift_rate_ms_s: 0.0,
        }
    }
}

/// Check the structural invariants of an EDL: first start at zero, strictly
/// increasing starts.
pub fn edl_is_well_formed(edl: &[AudioSegment]) -> bool {
    match edl.first() {
        None => false,
        Some(first) if first.start_s != 0.0 => false,
        Some(_) => edl.windows(2).all(|w| w[0].start_s < w[1].start_s),
    }
}

/// Find the segment covering a target-timeline instant.
///
/// A segment covers the half-open interval `[start_s, next.start_s)`; times
/// before the first segment fall into it anyway (its start is 0).
pub fn segment_at<'a>(edl: &'a [AudioSegment], time_s: f64) -> Option<&'a AudioSegment> {
    if edl.is_empty() {
        return None;
    }
    let mut current = &edl[0];
    for segment in &edl[1..] {
        if time_s < segment.start_s {
            break;
        }
        current = segment;
    }
    Some(current)
}

/// Build a simplified EDL directly from correlation chunks.
///
/// Used when stepping is detected for a source whose only consumers are
/// subtitles and the fine boundary machinery is not warranted: consecutive
/// accepted chunks whose delays differ by more than the triage tolerance
/// open a new segment at the chunk boundary.
pub fn generate_edl_from_chunks(
    chunks: &[ChunkResult],
    triage_tolerance_ms: f64,
    diagnosis: Option<&SteppingDiagnosis>,
    logger: &JobLogger,
) -> Vec<AudioSegment> {
    let mut accepted: Vec<&ChunkResult> = chunks.iter().filter(|c| c.accepted).collect();
    if accepted.is_empty() {
        logger.message("[EDL Generation] No accepted chunks available for EDL generation");
        return Vec::new();
    }

    // Filtered stepping drops chunks inside invalid cluster time ranges.
    if let Some(diag) = diagnosis {
        if diag.correction_mode == SteppingCorrectionMode::Filtered {
            let invalid_ranges = diag.invalid_time_ranges();
            if !invalid_ranges.is_empty() {
                let before = accepted.len();
                accepted.retain(|c| {
                    !invalid_ranges
                        .iter()
                        .any(|&(start, end)| c.start_s >= start && c.start_s <= end)
                });
                logger.message(&format!(
                    "[EDL Generation] Filtered {} chunks from invalid clusters, {} remain",
                    before - accepted.len(),
                    accepted.len()
                ));
                if accepted.is_empty() {
                    return Vec::new();
                }
            }
        }
    }

    let mut edl = vec![AudioSegment::new(
        0.0,
        accepted[0].delay_ms,
        accepted[0].raw_delay_ms,
    )];
    logger.message(&format!(
        "[EDL Generation] Starting with delay: {}ms (raw: {:.3}ms)",
        accepted[0].delay_ms, accepted[0].raw_delay_ms
    ));

    let mut current_delay = accepted[0].delay_ms;
    for chunk in &accepted[1..] {
        if (chunk.delay_ms - current_delay).abs() as f64 > triage_tolerance_ms {
            current_delay = chunk.delay_ms;
            edl.push(AudioSegment::new(
                chunk.start_s,
                chunk.delay_ms,
                chunk.raw_delay_ms,
            ));
            logger.message(&format!(
                "[EDL Generation] Delay change at {:.1}s -> {}ms (raw: {:.3}ms)",
                chunk.start_s, chunk.delay_ms, chunk.raw_delay_ms
            ));
        }
    }

    logger.message(&format!(
        "[EDL Generation] Generated EDL with {} segment(s)",
        edl.len()
    ));
    edl
}
