//! Event timing adjustments: stepping EDL application and sync offsets.

use crate::correction::{segment_at, AudioSegment};
use crate::logging::JobLogger;

use super::types::{ClampReport, OperationStats, SubtitleData};

/// Shift every event by its covering EDL segment's raw delay.
///
/// The segment is chosen by the event's *start* time and the same offset is
/// added to both ends, preserving intra-segment duration. Events starting
/// inside a `skip_range` (time spans dropped by filtered stepping with the
/// skip fallback) keep their original times. Returns the number of events
/// whose offset was non-zero; zero offsets must not block the mux stage
/// from applying a per-track sync.
pub fn apply_stepping(
    data: &mut SubtitleData,
    edl: &[AudioSegment],
    skip_ranges: &[(f64, f64)],
    logger: &JobLogger,
) -> OperationStats {
    if edl.is_empty() {
        return OperationStats {
            events_affected: 0,
            summary: "empty EDL, no events shifted".to_string(),
            styles_missing: Vec::new(),
        };
    }

    let mut affected = 0usize;
    let mut skipped = 0usize;
    for event in &mut data.events {
        let start_s = event.start_ms / 1000.0;
        if skip_ranges.iter().any(|&(lo, hi)| start_s >= lo && start_s <= hi) {
            skipped += 1;
            continue;
        }
        let Some(segment) = segment_at(edl, start_s) else {
            continue;
        };
        if segment.delay_raw != 0.0 {
            event.start_ms += segment.delay_raw;
            event.end_ms += segment.delay_raw;
            affected += 1;
        }
    }
    if skipped > 0 {
        logger.message(&format!(
            "[SubtitleData] {} event(s) inside skipped regions keep their original timing",
            skipped
        ));
    }

    let stats = OperationStats {
        events_affected: affected,
        summary: format!(
            "shifted {} of {} events across {} segment(s)",
            affected,
            data.events.len(),
            edl.len()
        ),
        styles_missing: Vec::new(),
    };
    logger.message(&format!("[SubtitleData] Stepping: {}", stats.summary));
    stats
}

/// Add a uniform offset to every event.
///
/// Events whose start becomes negative are reported (they will be clamped
/// to zero at write time); `None` means nothing went negative.
pub fn apply_sync_offset(
    data: &mut SubtitleData,
    offset_ms: f64,
    logger: &JobLogger,
) -> (OperationStats, Option<ClampReport>) {
    if offset_ms == 0.0 {
        return (
            OperationStats {
                events_affected: 0,
                summary: "zero offset".to_string(),
                styles_missing: Vec::new(),
            },
            None,
        );
    }

    let mut affected = 0usize;
    for event in &mut data.events {
        event.start_ms += offset_ms;
        event.end_ms += offset_ms;
        affected += 1;
    }

    let negative: Vec<f64> = data
        .events
        .iter()
        .filter(|e| !e.is_comment && e.start_ms < 0.0)
        .map(|e| e.start_ms)
        .collect();
    let clamp = if negative.is_empty() {
        None
    } else {
        let min_time = negative.iter().cloned().fold(f64::INFINITY, f64::min);
        logger.warn(&format!(
            "[Sync] {} event(s) have negative timestamps (min {:.0}ms), will be clamped to 0ms on write",
            negative.len(),
            min_time
        ));
        Some(ClampReport {
            events_clamped: negative.len(),
            min_time_ms: min_time,
            offset_ms,
        })
    };

    let stats = OperationStats {
        events_affected: affected,
        summary: format!("offset {} events by {:+.3}ms", affected, offset_ms),
        styles_missing: Vec::new(),
    };
    logger.message(&format!("[SubtitleData] Sync: {}", stats.summary));
    (stats, clamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{JobLogger, LogConfig};
    use crate::subtitles::types::{SubtitleData, SubtitleEvent, SubtitleFormat};

    fn logger() -> JobLogger {
        JobLogger::sink_only("timing", LogConfig::default(), None)
    }

    fn data_with_events(times: &[(f64, f64)]) -> SubtitleData {
        let mut data = SubtitleData::new(SubtitleFormat::Ass);
        for &(start, end) in times {
            data.events.push(SubtitleEvent::new(start, end, "Default", "x"));
        }
        data
    }

    fn seg(start_s: f64, delay_ms: i64, raw: f64) -> AudioSegment {
        let mut s = AudioSegment::new(start_s, delay_ms, raw);
        s.end_s = start_s;
        s
    }

    #[test]
    fn stepping_shifts_by_covering_segment() {
        // Segment 1 covers [0, 600), segment 2 from 600 s on.
        let edl = vec![seg(0.0, 0, 0.0), seg(600.0, 120, 120.4)];
        let mut data = data_with_events(&[
            (10_000.0, 12_000.0),   // inside segment 1: unchanged (delay 0)
            (599_999.0, 601_000.0), // start in segment 1
            (600_000.0, 602_000.0), // start exactly at the boundary
        ]);
        let stats = apply_stepping(&mut data, &edl, &[], &logger());

        assert_eq!(data.events[0].start_ms, 10_000.0);
        assert_eq!(data.events[1].start_ms, 599_999.0);
        assert_eq!(data.events[2].start_ms, 600_000.0 + 120.4);
        assert_eq!(data.events[2].end_ms, 602_000.0 + 120.4);
        // Only the event with a non-zero offset counts.
        assert_eq!(stats.events_affected, 1);
    }

    #[test]
    fn stepping_preserves_duration() {
        let edl = vec![seg(0.0, 50, 50.5)];
        let mut data = data_with_events(&[(1000.0, 3000.0)]);
        apply_stepping(&mut data, &edl, &[], &logger());
        assert_eq!(data.events[0].end_ms - data.events[0].start_ms, 2000.0);
    }

    #[test]
    fn all_zero_offsets_report_zero_affected() {
        let edl = vec![seg(0.0, 0, 0.0), seg(100.0, 0, 0.0)];
        let mut data = data_with_events(&[(10_000.0, 11_000.0), (150_000.0, 151_000.0)]);
        let before = data.events.clone();
        let stats = apply_stepping(&mut data, &edl, &[], &logger());
        assert_eq!(stats.events_affected, 0);
        assert_eq!(data.events, before);
    }

    #[test]
    fn events_in_skip_ranges_keep_original_times() {
        let edl = vec![seg(0.0, 0, 0.0), seg(600.0, 120, 120.0)];
        let mut data = data_with_events(&[
            (700_000.0, 702_000.0), // inside the skipped region
            (900_000.0, 901_000.0), // past it: shifted normally
        ]);
        let stats = apply_stepping(&mut data, &edl, &[(650.0, 800.0)], &logger());
        assert_eq!(data.events[0].start_ms, 700_000.0);
        assert_eq!(data.events[1].start_ms, 900_120.0);
        assert_eq!(stats.events_affected, 1);
    }

    #[test]
    fn sync_offset_reports_negative_starts() {
        let mut data = data_with_events(&[(100.0, 500.0), (5000.0, 6000.0)]);
        let (stats, clamp) = apply_sync_offset(&mut data, -300.0, &logger());
        assert_eq!(stats.events_affected, 2);
        let clamp = clamp.unwrap();
        assert_eq!(clamp.events_clamped, 1);
        assert_eq!(clamp.min_time_ms, -200.0);
    }

    #[test]
    fn zero_sync_offset_is_a_no_op() {
        let mut data = data_with_events(&[(100.0, 500.0)]);
        let before = data.events.clone();
        let (stats, clamp) = apply_sync_offset(&mut data, 0.0, &logger());
        assert_eq!(stats.events_affected, 0);
        assert!(clamp.is_none());
        assert_eq!(data.events, before);
    }
}
