//! Global shift calculation.
//!
//! In positive-only sync mode every delay the muxer will see must be
//! non-negative. The shift is the magnitude of the most negative delay among
//! sources contributing audio plus Source 1's audio container delays; it is
//! later added to every per-source delay, to Source 1's video/subtitles, and
//! to the chapter timestamps.

use serde::{Deserialize, Serialize};

use super::container_delays::ContainerDelayInfo;
use crate::logging::JobLogger;
use crate::models::{Delays, JobSpec, TrackType};

/// Result of the global shift computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalShift {
    pub shift_ms: i64,
    pub raw_shift_ms: f64,
    pub applied: bool,
}

/// Compute the shift needed to lift the most negative considered delay to
/// zero. Only sources that actually contribute audio tracks (and Source 1's
/// audio container delays) are considered.
pub fn calculate_global_shift(
    delays: &Delays,
    spec: &JobSpec,
    source1_container: Option<&ContainerDelayInfo>,
    shift_required: bool,
    logger: &JobLogger,
) -> GlobalShift {
    let mut considered: Vec<i64> = Vec::new();
    let mut considered_raw: Vec<f64> = Vec::new();

    if shift_required {
        logger.message("[Global Shift] Identifying delays from sources contributing audio tracks...");
        for entry in &spec.layout {
            if entry.track_type != Some(TrackType::Audio) {
                continue;
            }
            if let Some(rounded) = delays.rounded(&entry.source) {
                if !considered.contains(&rounded) {
                    considered.push(rounded);
                    considered_raw.push(delays.raw(&entry.source).unwrap_or(rounded as f64));
                    logger.message(&format!(
                        "  - Considering delay from {}: {}ms",
                        entry.source, rounded
                    ));
                }
            }
        }

        if let Some(container) = source1_container {
            let audio_delays: Vec<f64> = container.audio_delays_ms.values().copied().collect();
            if audio_delays.iter().any(|&d| d != 0.0) {
                considered.extend(audio_delays.iter().map(|&d| d.round() as i64));
                considered_raw.extend(audio_delays.iter().copied());
                logger.message(
                    "  - Considering Source 1 audio container delays (video delays ignored).",
                );
            }
        }
    }

    let most_negative = considered.iter().copied().min().unwrap_or(0);
    let most_negative_raw = considered_raw
        .iter()
        .copied()
        .fold(0.0f64, f64::min);

    if most_negative < 0 {
        let shift = GlobalShift {
            shift_ms: -most_negative,
            raw_shift_ms: -most_negative_raw,
            applied: true,
        };
        logger.message(&format!(
            "[Delay] Most negative relevant delay: {}ms (rounded), {:.3}ms (raw)",
            most_negative, most_negative_raw
        ));
        logger.message(&format!(
            "[Delay] Applying lossless global shift: +{}ms (rounded), +{:.3}ms (raw)",
            shift.shift_ms, shift.raw_shift_ms
        ));
        shift
    } else {
        logger.message("[Delay] All relevant delays are non-negative. No global shift needed.");
        GlobalShift::default()
    }
}

/// Fold the shift into every per-source delay and record it on `delays`.
pub fn apply_global_shift(delays: &mut Delays, shift: &GlobalShift, logger: &JobLogger) {
    delays.global_shift_ms = shift.shift_ms;
    delays.raw_global_shift_ms = shift.raw_shift_ms;
    if !shift.applied {
        return;
    }

    logger.message("[Delay] Adjusted delays after global shift:");
    let sources: Vec<String> = delays.source_delays_ms.keys().cloned().collect();
    for source in sources {
        let old_rounded = delays.source_delays_ms[&source];
        let old_raw = delays.raw_source_delays_ms[&source];
        let new_rounded = old_rounded + shift.shift_ms;
        let new_raw = old_raw + shift.raw_shift_ms;
        delays.source_delays_ms.insert(source.clone(), new_rounded);
        delays.raw_source_delays_ms.insert(source.clone(), new_raw);
        logger.message(&format!(
            "  - {}: {:+}ms -> {:+}ms (raw: {:+.3}ms -> {:+.3}ms)",
            source, old_rounded, new_rounded, old_raw, new_raw
        ));
    }
}
