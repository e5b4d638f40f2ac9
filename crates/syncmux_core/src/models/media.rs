//! Track identity and stream properties.

use serde::{Deserialize, Serialize};

use super::enums::TrackType;

/// Stream-level properties carried with a track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProps {
    /// Opaque codec identifier from the container probe (e.g. "A_FLAC").
    pub codec_id: String,
    /// Language tag as stored in the container ("und" when absent).
    #[serde(default)]
    pub lang: String,
    /// Human-readable track name; empty when the container has none.
    #[serde(default)]
    pub name: String,
}

impl StreamProps {
    pub fn new(codec_id: impl Into<String>) -> Self {
        Self {
            codec_id: codec_id.into(),
            lang: String::new(),
            name: String::new(),
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Identity of one track within one source container.
///
/// Immutable once constructed; correction steps build a new `Track` rather
/// than mutating the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Source key, e.g. "Source 1".
    pub source: String,
    /// Track id assigned by the container probe.
    pub id: u64,
    /// Track kind.
    #[serde(rename = "type")]
    pub track_type: TrackType,
    /// Stream properties.
    pub props: StreamProps,
}

impl Track {
    pub fn new(
        source: impl Into<String>,
        id: u64,
        track_type: TrackType,
        props: StreamProps,
    ) -> Self {
        Self {
            source: source.into(),
            id,
            track_type,
            props,
        }
    }

    /// Synthetic key used by the diagnosis flag maps: `"{source}_{id}"`.
    pub fn flag_key(&self) -> String {
        format!("{}_{}", self.source, self.id)
    }
}

/// Parse the source key back out of a `"{source}_{id}"` flag key.
///
/// Source keys contain spaces ("Source 2"), so split on the *last*
/// underscore.
pub fn source_from_flag_key(key: &str) -> &str {
    match key.rfind('_') {
        Some(idx) => &key[..idx],
        None => key,
    }
}

/// Parse the track id out of a `"{source}_{id}"` flag key.
pub fn track_id_from_flag_key(key: &str) -> Option<u64> {
    key.rfind('_').and_then(|idx| key[idx + 1..].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_key_round_trips() {
        let track = Track::new("Source 2", 3, TrackType::Audio, StreamProps::new("A_AAC"));
        let key = track.flag_key();
        assert_eq!(key, "Source 2_3");
        assert_eq!(source_from_flag_key(&key), "Source 2");
        assert_eq!(track_id_from_flag_key(&key), Some(3));
    }

    #[test]
    fn flag_key_without_underscore_is_source_only() {
        assert_eq!(source_from_flag_key("External"), "External");
        assert_eq!(track_id_from_flag_key("External"), None);
    }
}
