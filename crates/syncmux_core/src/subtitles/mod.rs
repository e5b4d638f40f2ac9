//! Subtitle loading, timing adjustment, style transforms, and writing.

pub mod parsers;
mod process;
mod style;
mod timestamps;
mod timing;
pub mod types;
pub mod writers;

pub use process::{process_subtitle_track, SubtitleContext};
pub use style::{
    apply_font_replacements, apply_rescale, apply_size_multiplier, apply_style_patch,
    filter_by_styles,
};
pub use timestamps::{
    format_ass_timestamp, format_srt_timestamp, parse_ass_timestamp, parse_srt_timestamp,
    round_to_centiseconds, round_to_milliseconds, timestamp_precision,
};
pub use timing::{apply_stepping, apply_sync_offset};
pub use types::{
    ClampReport, OperationStats, SubtitleData, SubtitleError, SubtitleEvent, SubtitleFormat,
    SubtitleResult, SubtitleStyle,
};
