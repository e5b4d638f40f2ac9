//! In-memory subtitle model.
//!
//! Timestamps stay float milliseconds until the single write-time rounding.
//! Styles keep their original field order so a load/save cycle only touches
//! what a transform actually changed.

use serde::{Deserialize, Serialize};

/// Source/target subtitle format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtitleFormat {
    Ass,
    Srt,
}

/// One event (Dialogue/Comment line, or one SRT cue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEvent {
    pub start_ms: f64,
    pub end_ms: f64,
    pub style: String,
    pub text: String,
    pub is_comment: bool,
    /// ASS layer field (0 for SRT input).
    #[serde(default)]
    pub layer: String,
    /// ASS actor/name field.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub margin_l: String,
    #[serde(default)]
    pub margin_r: String,
    #[serde(default)]
    pub margin_v: String,
    #[serde(default)]
    pub effect: String,
}

impl SubtitleEvent {
    pub fn new(start_ms: f64, end_ms: f64, style: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            style: style.into(),
            text: text.into(),
            is_comment: false,
            layer: "0".to_string(),
            name: String::new(),
            margin_l: "0".to_string(),
            margin_r: "0".to_string(),
            margin_v: "0".to_string(),
            effect: String::new(),
        }
    }
}

/// One ASS style: the Format field order plus aligned values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStyle {
    /// Field names from the Format line, lowercased.
    pub format: Vec<String>,
    /// Values aligned with `format`.
    pub values: Vec<String>,
}

impl SubtitleStyle {
    pub fn get(&self, field: &str) -> Option<&str> {
        let field = field.to_lowercase();
        self.format
            .iter()
            .position(|f| *f == field)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        let field = field.to_lowercase();
        if let Some(i) = self.format.iter().position(|f| *f == field) {
            self.values[i] = value.into();
            true
        } else {
            false
        }
    }

    pub fn name(&self) -> &str {
        self.get("name").unwrap_or("")
    }

    pub fn font_name(&self) -> &str {
        self.get("fontname").unwrap_or("")
    }

    pub fn font_size(&self) -> Option<f64> {
        self.get("fontsize").and_then(|s| s.parse().ok())
    }

    /// The default V4+ style used when SRT input is converted to ASS.
    pub fn default_ass() -> Self {
        let format: Vec<String> = DEFAULT_STYLE_FORMAT
            .iter()
            .map(|f| f.to_lowercase())
            .collect();
        let values = vec![
            "Default".to_string(),
            "Arial".to_string(),
            "48".to_string(),
            "&H00FFFFFF".to_string(),
            "&H000000FF".to_string(),
            "&H00000000".to_string(),
            "&H00000000".to_string(),
            "0".to_string(),
            "0".to_string(),
            "0".to_string(),
            "0".to_string(),
            "100".to_string(),
            "100".to_string(),
            "0".to_string(),
            "0".to_string(),
            "1".to_string(),
            "2".to_string(),
            "2".to_string(),
            "2".to_string(),
            "10".to_string(),
            "10".to_string(),
            "10".to_string(),
            "1".to_string(),
        ];
        Self { format, values }
    }
}

/// Canonical V4+ style field order.
pub const DEFAULT_STYLE_FORMAT: [&str; 23] = [
    "Name", "Fontname", "Fontsize", "PrimaryColour", "SecondaryColour", "OutlineColour",
    "BackColour", "Bold", "Italic", "Underline", "StrikeOut", "ScaleX", "ScaleY", "Spacing",
    "Angle", "BorderStyle", "Outline", "Shadow", "Alignment", "MarginL", "MarginR", "MarginV",
    "Encoding",
];

/// A loaded subtitle file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleData {
    pub format: SubtitleFormat,
    /// Script Info entries in file order (`key -> value`).
    pub metadata: Vec<(String, String)>,
    pub styles: Vec<SubtitleStyle>,
    pub events: Vec<SubtitleEvent>,
}

impl SubtitleData {
    pub fn new(format: SubtitleFormat) -> Self {
        Self {
            format,
            metadata: Vec::new(),
            styles: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn metadata_get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.metadata
            .iter()
            .find(|(k, _)| k.to_lowercase() == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn metadata_set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let lower = key.to_lowercase();
        if let Some(entry) = self
            .metadata
            .iter_mut()
            .find(|(k, _)| k.to_lowercase() == lower)
        {
            entry.1 = value;
        } else {
            self.metadata.push((key.to_string(), value));
        }
    }

    pub fn play_res(&self) -> (Option<u32>, Option<u32>) {
        (
            self.metadata_get("PlayResX").and_then(|v| v.parse().ok()),
            self.metadata_get("PlayResY").and_then(|v| v.parse().ok()),
        )
    }

    pub fn style(&self, name: &str) -> Option<&SubtitleStyle> {
        self.styles.iter().find(|s| s.name() == name)
    }

    /// Declared style names, in order.
    pub fn style_names(&self) -> Vec<String> {
        self.styles.iter().map(|s| s.name().to_string()).collect()
    }
}

/// Outcome of one in-place subtitle operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub events_affected: usize,
    pub summary: String,
    /// Declared filter styles that matched nothing (warned, not fatal).
    #[serde(default)]
    pub styles_missing: Vec<String>,
}

/// Events driven negative by an offset; written clamped and reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampReport {
    pub events_clamped: usize,
    pub min_time_ms: f64,
    pub offset_ms: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum SubtitleError {
    #[error("failed to parse {format} line {line}: {message}")]
    Parse {
        format: &'static str,
        line: usize,
        message: String,
    },

    #[error("unsupported subtitle payload: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type SubtitleResult<T> = Result<T, SubtitleError>;
