//! Muxer token stream construction.
//!
//! Emits the argument list the external muxer consumes through a response
//! file (one token per line). Token order per item and the
//! preserved-after-audio reordering are load-bearing: players pick defaults
//! from the first flagged track of each kind, and "(Original)" tracks must
//! group with their corrected siblings.

use std::path::{Path, PathBuf};

use super::delay_calculator::effective_sync_ms;
use crate::config::Settings;
use crate::models::{Delays, PlanItem, TrackType};

/// Everything the mux step feeds the builder.
pub struct MuxPlan<'a> {
    pub items: &'a [PlanItem],
    pub delays: &'a Delays,
    pub chapters_xml: Option<&'a Path>,
    pub attachments: &'a [PathBuf],
    pub output_path: &'a Path,
}

/// Reorder plan items for the final mux: non-preserved items keep their
/// order and preserved items are inserted immediately after the last
/// non-preserved audio item (at the end when there is no audio).
pub fn final_item_order(items: &[PlanItem]) -> Vec<&PlanItem> {
    let non_preserved: Vec<&PlanItem> = items.iter().filter(|i| !i.is_preserved).collect();
    let preserved: Vec<&PlanItem> = items.iter().filter(|i| i.is_preserved).collect();

    let last_audio_idx = non_preserved
        .iter()
        .rposition(|i| i.track.track_type == TrackType::Audio);

    let mut ordered = Vec::with_capacity(items.len());
    match last_audio_idx {
        Some(idx) => {
            ordered.extend_from_slice(&non_preserved[..=idx]);
            ordered.extend_from_slice(&preserved);
            ordered.extend_from_slice(&non_preserved[idx + 1..]);
        }
        None => {
            ordered.extend_from_slice(&non_preserved);
            ordered.extend_from_slice(&preserved);
        }
    }
    ordered
}

/// Build the muxer token stream.
pub fn build_tokens(plan: &MuxPlan<'_>, settings: &Settings) -> Vec<String> {
    let mut tokens = Vec::new();

    tokens.push("-o".to_string());
    tokens.push(plan.output_path.to_string_lossy().into_owned());

    if let Some(chapters) = plan.chapters_xml {
        tokens.push("--chapters".to_string());
        tokens.push(chapters.to_string_lossy().into_owned());
    }
    if settings.postprocess.disable_track_statistics_tags {
        tokens.push("--disable-track-statistics-tags".to_string());
    }

    let ordered = final_item_order(plan.items);

    // Exactly one default per type: the first video item, the first audio
    // item flagged default, the first subtitle item flagged default. The
    // forced-display flag goes to the first subtitle flagged forced.
    let first_video = ordered
        .iter()
        .position(|i| i.track.track_type == TrackType::Video);
    let default_audio = ordered
        .iter()
        .position(|i| i.track.track_type == TrackType::Audio && i.is_default);
    let default_subs = ordered
        .iter()
        .position(|i| i.track.track_type == TrackType::Subtitles && i.is_default);
    let forced_subs = ordered
        .iter()
        .position(|i| i.track.track_type == TrackType::Subtitles && i.is_forced_display);

    let mut order_entries = Vec::new();
    for (i, item) in ordered.iter().enumerate() {
        let lang = if item.track.props.lang.is_empty() {
            "und"
        } else {
            &item.track.props.lang
        };
        tokens.push("--language".to_string());
        tokens.push(format!("0:{}", lang));

        if item.apply_track_name && !item.track.props.name.trim().is_empty() {
            tokens.push("--track-name".to_string());
            tokens.push(format!("0:{}", item.track.props.name));
        }

        let sync = effective_sync_ms(item, plan.delays);
        tokens.push("--sync".to_string());
        tokens.push(format!("0:{:+}", sync));

        let is_default =
            Some(i) == first_video || Some(i) == default_audio || Some(i) == default_subs;
        tokens.push("--default-track-flag".to_string());
        tokens.push(format!("0:{}", if is_default { "yes" } else { "no" }));

        if Some(i) == forced_subs {
            tokens.push("--forced-display-flag".to_string());
            tokens.push("0:yes".to_string());
        }

        if settings.postprocess.disable_header_compression {
            tokens.push("--compression".to_string());
            tokens.push("0:none".to_string());
        }

        if settings.postprocess.apply_dialog_norm_gain
            && item.track.track_type == TrackType::Audio
        {
            let codec = item.track.props.codec_id.to_uppercase();
            if codec.contains("AC3") || codec.contains("EAC3") {
                tokens.push("--remove-dialog-normalization-gain".to_string());
                tokens.push("0".to_string());
            }
        }

        let path = item
            .extracted_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        tokens.push("(".to_string());
        tokens.push(path);
        tokens.push(")".to_string());

        order_entries.push(format!("{}:0", i));
    }

    for attachment in plan.attachments {
        tokens.push("--attach-file".to_string());
        tokens.push(attachment.to_string_lossy().into_owned());
    }

    if !order_entries.is_empty() {
        tokens.push("--track-order".to_string());
        tokens.push(order_entries.join(","));
    }

    tokens
}

/// Write tokens as a muxer response file, one argument per line.
pub fn write_options_file(tokens: &[String], path: &Path) -> std::io::Result<()> {
    let mut body = tokens.join("\n");
    body.push('\n');
    std::fs::write(path, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StreamProps, Track};

    fn item(source: &str, id: u64, kind: TrackType, codec: &str) -> PlanItem {
        let mut item = PlanItem::new(Track::new(
            source,
            id,
            kind,
            StreamProps::new(codec).with_lang("eng"),
        ));
        item.extracted_path = Some(format!("/tmp/{}_{}.bin", source.replace(' ', "_"), id).into());
        item
    }

    fn count(tokens: &[String], needle: &str) -> usize {
        tokens.iter().filter(|t| *t == needle).count()
    }

    #[test]
    fn preserved_items_follow_last_audio() {
        let mut corrected = item("Source 2", 1, TrackType::Audio, "A_FLAC");
        corrected.is_corrected = true;
        let mut preserved = item("Source 2", 1, TrackType::Audio, "A_DTS");
        preserved.is_preserved = true;

        let items = vec![
            item("Source 1", 0, TrackType::Video, "V_MPEG4/ISO/AVC"),
            corrected,
            preserved,
            item("Source 2", 2, TrackType::Subtitles, "S_TEXT/ASS"),
        ];
        let ordered = final_item_order(&items);
        assert_eq!(ordered.len(), 4);
        assert!(ordered[1].is_corrected);
        assert!(ordered[2].is_preserved);
        assert_eq!(ordered[3].track.track_type, TrackType::Subtitles);
    }

    #[test]
    fn preserved_items_append_when_no_audio() {
        let mut preserved = item("Source 2", 1, TrackType::Subtitles, "S_TEXT/ASS");
        preserved.is_preserved = true;
        let items = vec![
            item("Source 1", 0, TrackType::Video, "V_AV1"),
            preserved,
            item("Source 2", 2, TrackType::Subtitles, "S_TEXT/ASS"),
        ];
        let ordered = final_item_order(&items);
        assert!(ordered[2].is_preserved);
    }

    #[test]
    fn exactly_one_default_per_type() {
        let mut audio1 = item("Source 2", 1, TrackType::Audio, "A_FLAC");
        audio1.is_default = true;
        let mut audio2 = item("Source 2", 2, TrackType::Audio, "A_AAC");
        audio2.is_default = true; // layout flagged two; only the first wins
        let items = vec![
            item("Source 1", 0, TrackType::Video, "V_AV1"),
            audio1,
            audio2,
        ];
        let mut delays = Delays::default();
        delays.set("Source 2", 0.0);
        let plan = MuxPlan {
            items: &items,
            delays: &delays,
            chapters_xml: None,
            attachments: &[],
            output_path: Path::new("/out.mkv"),
        };
        let tokens = build_tokens(&plan, &Settings::default());

        let yes_count = tokens
            .iter()
            .zip(tokens.iter().skip(1))
            .filter(|(a, b)| *a == "--default-track-flag" && *b == "0:yes")
            .count();
        // Video default + first flagged audio default.
        assert_eq!(yes_count, 2);
    }

    #[test]
    fn sync_tokens_carry_signed_values() {
        let items = vec![item("Source 2", 1, TrackType::Audio, "A_FLAC")];
        let mut delays = Delays::default();
        delays.set("Source 2", 250.0);
        let plan = MuxPlan {
            items: &items,
            delays: &delays,
            chapters_xml: None,
            attachments: &[],
            output_path: Path::new("/out.mkv"),
        };
        let tokens = build_tokens(&plan, &Settings::default());
        let sync_idx = tokens.iter().position(|t| t == "--sync").unwrap();
        assert_eq!(tokens[sync_idx + 1], "0:+250");
    }

    #[test]
    fn dialog_norm_applies_to_ac3_only() {
        let mut settings = Settings::default();
        settings.postprocess.apply_dialog_norm_gain = true;
        let items = vec![
            item("Source 2", 1, TrackType::Audio, "A_EAC3"),
            item("Source 2", 2, TrackType::Audio, "A_FLAC"),
        ];
        let mut delays = Delays::default();
        delays.set("Source 2", 0.0);
        let plan = MuxPlan {
            items: &items,
            delays: &delays,
            chapters_xml: None,
            attachments: &[],
            output_path: Path::new("/out.mkv"),
        };
        let tokens = build_tokens(&plan, &settings);
        assert_eq!(count(&tokens, "--remove-dialog-normalization-gain"), 1);
    }

    #[test]
    fn chapters_attachments_and_order_are_emitted() {
        let items = vec![
            item("Source 1", 0, TrackType::Video, "V_AV1"),
            item("Source 2", 1, TrackType::Audio, "A_FLAC"),
        ];
        let mut delays = Delays::default();
        delays.set("Source 2", 0.0);
        let attachments = vec![PathBuf::from("/tmp/font.ttf")];
        let plan = MuxPlan {
            items: &items,
            delays: &delays,
            chapters_xml: Some(Path::new("/tmp/chapters.xml")),
            attachments: &attachments,
            output_path: Path::new("/out.mkv"),
        };
        let tokens = build_tokens(&plan, &Settings::default());
        assert!(tokens.contains(&"--chapters".to_string()));
        assert!(tokens.contains(&"--attach-file".to_string()));
        let order_idx = tokens.iter().position(|t| t == "--track-order").unwrap();
        assert_eq!(tokens[order_idx + 1], "0:0,1:0");
    }

    #[test]
    fn empty_attachments_emit_no_flags() {
        let items = vec![item("Source 1", 0, TrackType::Video, "V_AV1")];
        let delays = Delays::default();
        let plan = MuxPlan {
            items: &items,
            delays: &delays,
            chapters_xml: None,
            attachments: &[],
            output_path: Path::new("/out.mkv"),
        };
        let tokens = build_tokens(&plan, &Settings::default());
        assert_eq!(count(&tokens, "--attach-file"), 0);
    }

    #[test]
    fn response_file_is_one_token_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.txt");
        write_options_file(
            &["-o".to_string(), "/out.mkv".to_string(), "(".to_string()],
            &path,
        )
        .unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body, "-o\n/out.mkv\n(\n");
    }
}
