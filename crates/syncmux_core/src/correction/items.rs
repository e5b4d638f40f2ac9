//! Corrected/preserved plan-item pairing.
//!
//! Every corrector replaces a track's payload with a FLAC and keeps the
//! original alongside it: the corrected item takes the new path, zero
//! container delay, and a labeled name; the preserved sibling keeps the
//! original payload and codec with an "(Original)"-style suffix.

use std::path::PathBuf;

use crate::models::{PlanItem, StreamProps, Track};

/// Rewrite `item` as the corrected track and return its preserved sibling.
///
/// The sibling shares `(source, id)`, codec id, and language with the
/// original, satisfying the preserved-pairing invariant. Callers append the
/// sibling to the plan after the corrected item.
pub fn split_corrected_pair(
    item: &mut PlanItem,
    corrected_path: PathBuf,
    corrected_label: &str,
    preserved_label: &str,
) -> PlanItem {
    let original_props = item.track.props.clone();

    let mut preserved = item.clone();
    preserved.is_preserved = true;
    preserved.is_default = false;
    preserved.track = Track::new(
        item.track.source.clone(),
        item.track.id,
        item.track.track_type,
        StreamProps {
            codec_id: original_props.codec_id.clone(),
            lang: original_props.lang.clone(),
            name: labeled_name(&original_props.name, preserved_label),
        },
    );
    preserved.apply_track_name = true;

    item.extracted_path = Some(corrected_path);
    item.is_corrected = true;
    item.container_delay_ms = 0; // fresh FLAC carries no container delay
    item.track = Track::new(
        item.track.source.clone(),
        item.track.id,
        item.track.track_type,
        StreamProps {
            codec_id: "A_FLAC".to_string(),
            lang: original_props.lang,
            name: labeled_name(&original_props.name, corrected_label),
        },
    );
    item.apply_track_name = true;

    preserved
}

fn labeled_name(original: &str, label: &str) -> String {
    if label.is_empty() {
        return original.to_string();
    }
    if original.is_empty() {
        label.to_string()
    } else {
        format!("{} ({})", original, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackType;

    fn audio_item() -> PlanItem {
        let mut item = PlanItem::new(Track::new(
            "Source 2",
            1,
            TrackType::Audio,
            StreamProps::new("A_DTS").with_lang("jpn").with_name("Surround"),
        ));
        item.extracted_path = Some("/tmp/orig.dts".into());
        item.container_delay_ms = 12;
        item.is_default = true;
        item
    }

    #[test]
    fn corrected_item_becomes_flac_with_zero_delay() {
        let mut item = audio_item();
        let preserved =
            split_corrected_pair(&mut item, "/tmp/fixed.flac".into(), "PAL Corrected", "Original");

        assert!(item.is_corrected);
        assert_eq!(item.container_delay_ms, 0);
        assert_eq!(item.track.props.codec_id, "A_FLAC");
        assert_eq!(item.track.props.name, "Surround (PAL Corrected)");
        assert_eq!(item.extracted_path.as_deref().unwrap().to_str(), Some("/tmp/fixed.flac"));

        assert!(preserved.is_preserved);
        assert!(!preserved.is_default);
        assert_eq!(preserved.track.props.codec_id, "A_DTS");
        assert_eq!(preserved.track.props.lang, "jpn");
        assert_eq!(preserved.track.props.name, "Surround (Original)");
        assert_eq!(preserved.track.source, item.track.source);
        assert_eq!(preserved.track.id, item.track.id);
        // Preserved keeps the original payload path.
        assert_eq!(preserved.extracted_path.as_deref().unwrap().to_str(), Some("/tmp/orig.dts"));
    }

    #[test]
    fn unnamed_track_uses_bare_label() {
        let mut item = PlanItem::new(Track::new(
            "Source 3",
            2,
            TrackType::Audio,
            StreamProps::new("A_AAC"),
        ));
        item.extracted_path = Some("/tmp/a.aac".into());
        let preserved =
            split_corrected_pair(&mut item, "/tmp/a.flac".into(), "Drift Corrected", "Original");
        assert_eq!(item.track.props.name, "Drift Corrected");
        assert_eq!(preserved.track.props.name, "Original");
    }
}
