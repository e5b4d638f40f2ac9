//! Container probing and track/attachment extraction.

mod attachments;
mod probe;
mod tracks;
mod types;

pub use attachments::{extract_font_attachments, is_font_mime};
pub use probe::{parse_probe_json, probe_file};
pub use tracks::{ext_for_codec, extract_tracks, pcm_codec_from_bit_depth};
pub use types::{
    ExtractedTrack, ExtractionError, ExtractionResult, ProbeAttachment, ProbeResult, ProbeTrack,
};
