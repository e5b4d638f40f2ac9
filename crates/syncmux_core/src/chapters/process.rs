//! Chapter processing: extract, snap, shift, normalize, rename, write.
//!
//! Order matters: snapping happens FIRST, in video time, and only then are
//! timestamps shifted into container time. The video track receives the
//! same container delay, so a keyframe at video time X sits at container
//! time X + shift in the final mux.

use std::path::{Path, PathBuf};

use super::keyframes::{pick_candidate, probe_keyframes_ns};
use super::timestamps::{format_delta, format_ns};
use super::types::{parse_chapters_xml, write_chapters_xml, ChapterError, ChapterSet};
use crate::config::ChapterSettings;
use crate::io::{argv, CommandRunner};
use crate::models::SnapMode;

/// Extract, transform, and persist the reference's chapters.
///
/// Returns `None` when the reference has no chapters; that is not an error.
pub fn process_chapters(
    ref_mkv: &Path,
    temp_dir: &Path,
    settings: &ChapterSettings,
    global_shift_ms: i64,
    runner: &CommandRunner,
) -> Result<Option<PathBuf>, ChapterError> {
    let logger = runner.logger().clone();

    let xml_content = runner
        .run(&argv([
            "mkvextract".to_string(),
            ref_mkv.to_string_lossy().into_owned(),
            "chapters".to_string(),
            "-".to_string(),
        ]))
        .map_err(|e| ChapterError::Xml(e.to_string()))?;

    if xml_content.trim().is_empty() {
        logger.message("No chapters found in reference file.");
        return Ok(None);
    }

    let mut set = match parse_chapters_xml(&xml_content) {
        Ok(set) => set,
        Err(ChapterError::Empty) => {
            logger.message("No chapters found in reference file.");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    // Snap first (video time), then shift to container time.
    if settings.snap_chapters {
        let keyframes = probe_keyframes_ns(ref_mkv, runner);
        if keyframes.is_empty() {
            logger.message("[Chapters] Snap skipped: could not load keyframes.");
        } else {
            snap_chapter_times(&mut set, &keyframes, settings, runner);
        }
    }

    let shift_ns = global_shift_ms * 1_000_000;
    if shift_ns != 0 {
        logger.message(&format!(
            "[Chapters] Shifting all timestamps by +{}ms.",
            global_shift_ms
        ));
        shift_chapters(&mut set, shift_ns);
    }

    logger.message("[Chapters] Normalizing chapter data...");
    normalize_chapters(&mut set, runner);

    if settings.rename_chapters {
        logger.message("[Chapters] Renaming chapters to \"Chapter NN\"...");
        rename_chapters(&mut set, runner);
    }

    let stem = ref_mkv
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    let out_path = temp_dir.join(format!("{}_chapters_modified.xml", stem));
    std::fs::write(&out_path, write_chapters_xml(&set))?;
    logger.message(&format!("Chapters XML written to: {}", out_path.display()));
    Ok(Some(out_path))
}

/// Snap chapter starts (and optionally ends) to keyframes within the
/// threshold. Moves beyond the threshold are logged as too far and left
/// alone.
pub fn snap_chapter_times(
    set: &mut ChapterSet,
    keyframes_ns: &[i64],
    settings: &ChapterSettings,
    runner: &CommandRunner,
) {
    let logger = runner.logger().clone();
    let nearest = settings.snap_mode == SnapMode::Nearest;
    let threshold_ns = settings.snap_threshold_ms as i64 * 1_000_000;
    let (mut moved, mut on_kf, mut too_far) = (0usize, 0usize, 0usize);

    logger.message(&format!(
        "[Chapters] Snapping with mode={:?}, threshold={}ms...",
        settings.snap_mode, settings.snap_threshold_ms
    ));

    for atom in &mut set.atoms {
        let name = atom.display_name().to_string();

        let mut snap_one = |ts_ns: i64, is_start: bool| -> i64 {
            let candidate = pick_candidate(keyframes_ns, ts_ns, nearest);
            let delta = candidate - ts_ns;
            if delta == 0 {
                if is_start {
                    on_kf += 1;
                }
                logger.message(&format!(
                    "  - Kept '{}' ({}) - already on keyframe.",
                    name,
                    format_ns(ts_ns)
                ));
                ts_ns
            } else if delta.abs() <= threshold_ns {
                if is_start {
                    moved += 1;
                }
                logger.message(&format!(
                    "  - Snapped '{}' ({} -> {}) (moved by {})",
                    name,
                    format_ns(ts_ns),
                    format_ns(candidate),
                    format_delta(delta)
                ));
                candidate
            } else {
                if is_start {
                    too_far += 1;
                }
                logger.message(&format!(
                    "  - Skipped '{}' ({}) - nearest keyframe is {} away (exceeds threshold).",
                    name,
                    format_ns(ts_ns),
                    format_delta(delta)
                ));
                ts_ns
            }
        };

        atom.start_ns = snap_one(atom.start_ns, true);
        if !settings.snap_starts_only {
            if let Some(end) = atom.end_ns {
                atom.end_ns = Some(snap_one(end, false));
            }
        }
    }

    logger.message(&format!(
        "[Chapters] Snap complete: {} moved, {} on keyframe, {} skipped.",
        moved, on_kf, too_far
    ));
}

/// Shift every start/end by `shift_ns` (chapters land in container time).
pub fn shift_chapters(set: &mut ChapterSet, shift_ns: i64) {
    for atom in &mut set.atoms {
        atom.start_ns += shift_ns;
        if let Some(end) = atom.end_ns {
            atom.end_ns = Some(end + shift_ns);
        }
    }
}

/// Sort by start, drop duplicates at identical starts, make segments
/// seamless, and give the final chapter a sensible end.
pub fn normalize_chapters(set: &mut ChapterSet, runner: &CommandRunner) {
    let logger = runner.logger().clone();
    set.atoms.sort_by_key(|a| a.start_ns);

    let mut seen = std::collections::HashSet::new();
    set.atoms.retain(|atom| {
        if seen.insert(atom.start_ns) {
            true
        } else {
            logger.message(&format!(
                "  - Removed duplicate chapter '{}' found at timestamp {}",
                atom.display_name(),
                format_ns(atom.start_ns)
            ));
            false
        }
    });

    let count = set.atoms.len();
    for i in 0..count {
        let next_start = set.atoms.get(i + 1).map(|a| a.start_ns);
        let atom = &mut set.atoms[i];
        let desired_end = match next_start {
            // Seamless: each end equals the next start.
            Some(next) => next,
            // Last chapter: at least one second long, never shortened.
            None => {
                let original = atom.end_ns.unwrap_or(atom.start_ns);
                original.max(atom.start_ns + 1_000_000_000)
            }
        };
        if atom.end_ns != Some(desired_end) {
            logger.message(&format!(
                "  - Normalized '{}' end time -> {}",
                atom.display_name(),
                format_ns(desired_end)
            ));
            atom.end_ns = Some(desired_end);
        }
    }
}

/// Rename every display to `Chapter NN` while keeping language metadata.
pub fn rename_chapters(set: &mut ChapterSet, runner: &CommandRunner) {
    let logger = runner.logger().clone();
    for (i, atom) in set.atoms.iter_mut().enumerate() {
        let number = i + 1;
        let (language, ietf_language) = atom
            .displays
            .first()
            .map(|d| (d.language.clone(), d.ietf_language.clone()))
            .unwrap_or_else(|| ("und".to_string(), "und".to_string()));
        atom.displays = vec![super::types::ChapterDisplay {
            name: format!("Chapter {:02}", number),
            language: language.clone(),
            ietf_language: ietf_language.clone(),
        }];
        logger.message(&format!(
            "  - Renamed chapter {} (language: {}, IETF: {})",
            number, language, ietf_language
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::types::{ChapterAtom, ChapterDisplay};
    use crate::io::ToolPaths;
    use crate::logging::{JobLogger, LogConfig};
    use std::sync::Arc;

    fn runner() -> CommandRunner {
        let logger = Arc::new(JobLogger::sink_only("chap", LogConfig::default(), None));
        CommandRunner::new(logger, ToolPaths::bare())
    }

    fn atom(start_ns: i64, end_ns: Option<i64>, name: &str) -> ChapterAtom {
        ChapterAtom {
            uid: None,
            start_ns,
            end_ns,
            hidden: false,
            displays: vec![ChapterDisplay {
                name: name.to_string(),
                language: "eng".to_string(),
                ietf_language: "en".to_string(),
            }],
        }
    }

    fn sec(s: i64) -> i64 {
        s * 1_000_000_000
    }

    #[test]
    fn snap_respects_threshold() {
        let r = runner();
        let mut set = ChapterSet {
            edition_uid: None,
            // 100 ms past a keyframe (snappable), and 2 s past (too far).
            atoms: vec![
                atom(sec(10) + 100_000_000, None, "Close"),
                atom(sec(30) + sec(2), None, "Far"),
            ],
        };
        let keyframes = vec![sec(0), sec(10), sec(30), sec(60)];
        let settings = ChapterSettings {
            snap_chapters: true,
            snap_mode: SnapMode::Previous,
            snap_threshold_ms: 250,
            snap_starts_only: true,
            rename_chapters: false,
        };
        snap_chapter_times(&mut set, &keyframes, &settings, &r);
        assert_eq!(set.atoms[0].start_ns, sec(10));
        // Too far: not moved.
        assert_eq!(set.atoms[1].start_ns, sec(32));
    }

    #[test]
    fn normalize_sorts_dedupes_and_seals() {
        let r = runner();
        let mut set = ChapterSet {
            edition_uid: None,
            atoms: vec![
                atom(sec(300), Some(sec(301)), "C"),
                atom(sec(0), Some(sec(200)), "A"),
                atom(sec(0), None, "A-dup"),
                atom(sec(150), None, "B"),
            ],
        };
        normalize_chapters(&mut set, &r);
        assert_eq!(set.atoms.len(), 3);
        assert_eq!(set.atoms[0].start_ns, sec(0));
        // Seamless: end equals the next start, overriding the old end.
        assert_eq!(set.atoms[0].end_ns, Some(sec(150)));
        assert_eq!(set.atoms[1].end_ns, Some(sec(300)));
        // Last chapter keeps max(start + 1s, original end).
        assert_eq!(set.atoms[2].end_ns, Some(sec(301)));
    }

    #[test]
    fn last_chapter_gets_minimum_length() {
        let r = runner();
        let mut set = ChapterSet {
            edition_uid: None,
            atoms: vec![atom(sec(10), Some(sec(10)), "Tail")],
        };
        normalize_chapters(&mut set, &r);
        assert_eq!(set.atoms[0].end_ns, Some(sec(11)));
    }

    #[test]
    fn shift_moves_both_ends() {
        let mut set = ChapterSet {
            edition_uid: None,
            atoms: vec![atom(sec(1), Some(sec(2)), "X")],
        };
        shift_chapters(&mut set, 180_000_000);
        assert_eq!(set.atoms[0].start_ns, sec(1) + 180_000_000);
        assert_eq!(set.atoms[0].end_ns, Some(sec(2) + 180_000_000));
    }

    #[test]
    fn rename_preserves_language_codes() {
        let r = runner();
        let mut set = ChapterSet {
            edition_uid: None,
            atoms: vec![atom(sec(0), None, "Prologue"), atom(sec(60), None, "Part 1")],
        };
        rename_chapters(&mut set, &r);
        assert_eq!(set.atoms[0].displays[0].name, "Chapter 01");
        assert_eq!(set.atoms[1].displays[0].name, "Chapter 02");
        assert_eq!(set.atoms[0].displays[0].language, "eng");
        assert_eq!(set.atoms[0].displays[0].ietf_language, "en");
    }
}
