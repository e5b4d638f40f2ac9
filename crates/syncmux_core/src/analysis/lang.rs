//! Language tag normalization.
//!
//! Container metadata mixes 2-letter ISO 639-1 and 3-letter ISO 639-2 codes.
//! Stream selection compares 3-letter codes, so 2-letter tags are widened
//! through a fixed table. The table is built once per process and read-only
//! afterwards.

use std::collections::HashMap;

use once_cell::sync::Lazy;

static LANG_2_TO_3: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("en", "eng"),
        ("ja", "jpn"),
        ("jp", "jpn"),
        ("zh", "zho"),
        ("cn", "zho"),
        ("es", "spa"),
        ("de", "deu"),
        ("fr", "fra"),
        ("it", "ita"),
        ("pt", "por"),
        ("ru", "rus"),
        ("ko", "kor"),
        ("ar", "ara"),
        ("tr", "tur"),
        ("pl", "pol"),
        ("nl", "nld"),
        ("sv", "swe"),
        ("no", "nor"),
        ("fi", "fin"),
        ("da", "dan"),
        ("cs", "ces"),
        ("sk", "slk"),
        ("sl", "slv"),
        ("hu", "hun"),
        ("el", "ell"),
        ("he", "heb"),
        ("id", "ind"),
        ("vi", "vie"),
        ("th", "tha"),
        ("hi", "hin"),
        ("ur", "urd"),
        ("fa", "fas"),
        ("uk", "ukr"),
        ("ro", "ron"),
        ("bg", "bul"),
        ("sr", "srp"),
        ("hr", "hrv"),
        ("ms", "msa"),
        ("bn", "ben"),
        ("ta", "tam"),
        ("te", "tel"),
    ])
});

/// Normalize a language tag to lowercase ISO 639-2.
///
/// Returns `None` for empty or "und" tags. Idempotent:
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize_lang(lang: Option<&str>) -> Option<String> {
    let s = lang?.trim().to_lowercase();
    if s.is_empty() || s == "und" {
        return None;
    }
    if s.len() == 2 {
        Some(
            LANG_2_TO_3
                .get(s.as_str())
                .map(|&t| t.to_string())
                .unwrap_or(s),
        )
    } else {
        Some(s)
    }
}
