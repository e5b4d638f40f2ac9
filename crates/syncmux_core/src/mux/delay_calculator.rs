//! Effective per-track sync computation.

use crate::models::{Delays, PlanItem, TrackType, REFERENCE_SOURCE};

/// The sync delay (ms) the muxer applies to one plan item.
///
/// - Source 1 non-subtitle tracks keep their container-declared offset.
/// - Everything else takes its source's delay (external subtitles through
///   their sync anchor), zero if the source has no entry.
/// - Subtitle tracks whose event timestamps were already shifted (stepping
///   or an event-editing sync mode) get zero; the shift is baked in.
pub fn effective_sync_ms(item: &PlanItem, delays: &Delays) -> i64 {
    if item.track.track_type == TrackType::Subtitles
        && (item.stepping_adjusted || item.frame_adjusted)
    {
        return 0;
    }

    if item.track.source == REFERENCE_SOURCE {
        return match item.track.track_type {
            TrackType::Subtitles => delays.global_shift_ms,
            // Container offsets of the reference are preserved; the global
            // shift was already folded in upstream when required.
            _ => item.container_delay_ms + delays.global_shift_ms,
        };
    }

    let sync_key = if item.track.track_type == TrackType::Subtitles {
        item.sync_to.as_deref().unwrap_or(&item.track.source)
    } else {
        &item.track.source
    };
    delays.rounded(sync_key).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StreamProps, Track};

    fn item(source: &str, kind: TrackType) -> PlanItem {
        PlanItem::new(Track::new(source, 1, kind, StreamProps::new("X")))
    }

    fn delays() -> Delays {
        let mut d = Delays::default();
        d.set("Source 2", 250.0);
        d.set("Source 3", -80.0);
        d
    }

    #[test]
    fn reference_tracks_keep_container_delay_plus_shift() {
        let mut d = delays();
        d.global_shift_ms = 180;
        let mut audio = item(REFERENCE_SOURCE, TrackType::Audio);
        audio.container_delay_ms = 12;
        assert_eq!(effective_sync_ms(&audio, &d), 192);

        let video = item(REFERENCE_SOURCE, TrackType::Video);
        assert_eq!(effective_sync_ms(&video, &d), 180);

        let subs = item(REFERENCE_SOURCE, TrackType::Subtitles);
        assert_eq!(effective_sync_ms(&subs, &d), 180);
    }

    #[test]
    fn secondary_tracks_take_source_delay() {
        let d = delays();
        assert_eq!(effective_sync_ms(&item("Source 2", TrackType::Audio), &d), 250);
        assert_eq!(effective_sync_ms(&item("Source 3", TrackType::Audio), &d), -80);
        // Unknown source reads as zero.
        assert_eq!(effective_sync_ms(&item("Source 9", TrackType::Audio), &d), 0);
    }

    #[test]
    fn external_subtitles_follow_their_anchor() {
        let d = delays();
        let mut subs = item("External", TrackType::Subtitles);
        subs.sync_to = Some("Source 2".to_string());
        assert_eq!(effective_sync_ms(&subs, &d), 250);
    }

    #[test]
    fn adjusted_subtitles_get_zero() {
        let d = delays();
        let mut stepped = item("Source 2", TrackType::Subtitles);
        stepped.stepping_adjusted = true;
        assert_eq!(effective_sync_ms(&stepped, &d), 0);

        let mut framed = item("Source 2", TrackType::Subtitles);
        framed.frame_adjusted = true;
        assert_eq!(effective_sync_ms(&framed, &d), 0);

        // An adjusted *audio* track is unaffected by the subtitle rule.
        let mut audio = item("Source 2", TrackType::Audio);
        audio.stepping_adjusted = true;
        assert_eq!(effective_sync_ms(&audio, &d), 250);
    }
}
