//! Chapter extraction, keyframe snapping, shifting, and normalization.

mod keyframes;
mod process;
mod timestamps;
mod types;

pub use keyframes::{pick_candidate, probe_keyframes_ns};
pub use process::{
    normalize_chapters, process_chapters, rename_chapters, shift_chapters, snap_chapter_times,
};
pub use timestamps::{format_delta, format_ns, parse_ns};
pub use types::{
    derive_legacy_language, parse_chapters_xml, write_chapters_xml, ChapterAtom, ChapterDisplay,
    ChapterError, ChapterSet,
};
