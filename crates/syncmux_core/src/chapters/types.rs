//! Chapter model: parse Matroska chapter XML into owned atoms and write it
//! back out.
//!
//! roxmltree is read-only, so the writer is a plain string serializer over
//! the owned model; everything the pipeline does not touch is carried
//! through the model untouched.

use roxmltree::{Document, ParsingOptions};
use serde::{Deserialize, Serialize};

use super::timestamps::{format_ns, parse_ns};

/// One ChapterDisplay block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDisplay {
    pub name: String,
    /// Legacy 3-letter code (ChapterLanguage).
    pub language: String,
    /// BCP-47 code (ChapLanguageIETF); derived when the source lacks it.
    pub ietf_language: String,
}

/// One ChapterAtom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterAtom {
    pub uid: Option<String>,
    pub start_ns: i64,
    pub end_ns: Option<i64>,
    pub hidden: bool,
    pub displays: Vec<ChapterDisplay>,
}

impl ChapterAtom {
    pub fn display_name(&self) -> &str {
        self.displays
            .first()
            .map(|d| d.name.as_str())
            .unwrap_or("(unnamed)")
    }
}

/// A parsed edition of chapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterSet {
    pub edition_uid: Option<String>,
    pub atoms: Vec<ChapterAtom>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChapterError {
    #[error("failed to parse chapter XML: {0}")]
    Xml(String),

    #[error("chapter XML has no editions")]
    Empty,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Small 3-letter to BCP-47 table for display languages; falls back to
/// "und".
fn ietf_from_legacy(lang: &str) -> &'static str {
    match lang {
        "eng" => "en",
        "jpn" => "ja",
        "spa" => "es",
        "fra" => "fr",
        "deu" => "de",
        "ita" => "it",
        "por" => "pt",
        "rus" => "ru",
        "kor" => "ko",
        "zho" => "zh",
        _ => "und",
    }
}

/// Reverse table: BCP-47 to legacy 3-letter.
fn legacy_from_ietf(lang: &str) -> &'static str {
    match lang {
        "en" => "eng",
        "ja" => "jpn",
        "es" => "spa",
        "fr" => "fra",
        "de" => "deu",
        "it" => "ita",
        "pt" => "por",
        "ru" => "rus",
        "ko" => "kor",
        "zh" => "zho",
        _ => "und",
    }
}

/// Parse chapter XML (first edition).
pub fn parse_chapters_xml(xml: &str) -> Result<ChapterSet, ChapterError> {
    let xml = xml.trim_start_matches('\u{feff}');
    // mkvextract emits a matroskachapters.dtd DOCTYPE line.
    let options = ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| ChapterError::Xml(e.to_string()))?;

    let edition = doc
        .descendants()
        .find(|n| n.has_tag_name("EditionEntry"))
        .ok_or(ChapterError::Empty)?;

    let edition_uid = edition
        .children()
        .find(|n| n.has_tag_name("EditionUID"))
        .and_then(|n| n.text())
        .map(str::to_string);

    let mut atoms = Vec::new();
    for atom_node in edition.children().filter(|n| n.has_tag_name("ChapterAtom")) {
        let text_of = |tag: &str| -> Option<String> {
            atom_node
                .children()
                .find(|n| n.has_tag_name(tag))
                .and_then(|n| n.text())
                .map(str::to_string)
        };

        let Some(start_ns) = text_of("ChapterTimeStart").as_deref().and_then(parse_ns) else {
            continue;
        };
        let end_ns = text_of("ChapterTimeEnd").as_deref().and_then(parse_ns);

        let mut displays = Vec::new();
        for display_node in atom_node.children().filter(|n| n.has_tag_name("ChapterDisplay")) {
            let child_text = |tag: &str| -> Option<String> {
                display_node
                    .children()
                    .find(|n| n.has_tag_name(tag))
                    .and_then(|n| n.text())
                    .map(str::to_string)
            };
            let name = child_text("ChapterString").unwrap_or_default();
            let language = child_text("ChapterLanguage").unwrap_or_else(|| "und".to_string());
            // Preserve both codes; derive the missing one from the other.
            let ietf_language = child_text("ChapLanguageIETF")
                .unwrap_or_else(|| ietf_from_legacy(&language).to_string());
            displays.push(ChapterDisplay {
                name,
                language,
                ietf_language,
            });
        }

        atoms.push(ChapterAtom {
            uid: text_of("ChapterUID"),
            start_ns,
            end_ns,
            hidden: text_of("ChapterFlagHidden").as_deref() == Some("1"),
            displays,
        });
    }

    Ok(ChapterSet {
        edition_uid,
        atoms,
    })
}

/// Serialize a chapter set back to Matroska chapter XML.
pub fn write_chapters_xml(set: &ChapterSet) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<!DOCTYPE Chapters SYSTEM \"matroskachapters.dtd\">\n");
    out.push_str("<Chapters>\n  <EditionEntry>\n");
    if let Some(uid) = &set.edition_uid {
        out.push_str(&format!("    <EditionUID>{}</EditionUID>\n", escape_xml(uid)));
    }
    for atom in &set.atoms {
        out.push_str("    <ChapterAtom>\n");
        if let Some(uid) = &atom.uid {
            out.push_str(&format!("      <ChapterUID>{}</ChapterUID>\n", escape_xml(uid)));
        }
        out.push_str(&format!(
            "      <ChapterTimeStart>{}</ChapterTimeStart>\n",
            format_ns(atom.start_ns)
        ));
        if let Some(end) = atom.end_ns {
            out.push_str(&format!(
                "      <ChapterTimeEnd>{}</ChapterTimeEnd>\n",
                format_ns(end)
            ));
        }
        if atom.hidden {
            out.push_str("      <ChapterFlagHidden>1</ChapterFlagHidden>\n");
        }
        for display in &atom.displays {
            out.push_str("      <ChapterDisplay>\n");
            out.push_str(&format!(
                "        <ChapterString>{}</ChapterString>\n",
                escape_xml(&display.name)
            ));
            out.push_str(&format!(
                "        <ChapterLanguage>{}</ChapterLanguage>\n",
                escape_xml(&display.language)
            ));
            out.push_str(&format!(
                "        <ChapLanguageIETF>{}</ChapLanguageIETF>\n",
                escape_xml(&display.ietf_language)
            ));
            out.push_str("      </ChapterDisplay>\n");
        }
        out.push_str("    </ChapterAtom>\n");
    }
    out.push_str("  </EditionEntry>\n</Chapters>\n");
    out
}

/// Derive the legacy code for a display that only carries an IETF tag.
pub fn derive_legacy_language(ietf: &str) -> String {
    legacy_from_ietf(ietf).to_string()
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<Chapters>
  <EditionEntry>
    <EditionUID>12345</EditionUID>
    <ChapterAtom>
      <ChapterUID>1</ChapterUID>
      <ChapterTimeStart>00:00:00.000000000</ChapterTimeStart>
      <ChapterTimeEnd>00:05:00.000000000</ChapterTimeEnd>
      <ChapterDisplay>
        <ChapterString>Opening</ChapterString>
        <ChapterLanguage>eng</ChapterLanguage>
      </ChapterDisplay>
    </ChapterAtom>
    <ChapterAtom>
      <ChapterTimeStart>00:05:00.000000000</ChapterTimeStart>
      <ChapterDisplay>
        <ChapterString>Part One &amp; Two</ChapterString>
        <ChapterLanguage>jpn</ChapterLanguage>
        <ChapLanguageIETF>ja</ChapLanguageIETF>
      </ChapterDisplay>
    </ChapterAtom>
  </EditionEntry>
</Chapters>"#;

    #[test]
    fn parses_atoms_and_displays() {
        let set = parse_chapters_xml(SAMPLE).unwrap();
        assert_eq!(set.edition_uid.as_deref(), Some("12345"));
        assert_eq!(set.atoms.len(), 2);
        assert_eq!(set.atoms[0].start_ns, 0);
        assert_eq!(set.atoms[0].end_ns, Some(300_000_000_000));
        assert_eq!(set.atoms[0].display_name(), "Opening");
        // IETF derived from the legacy code when absent.
        assert_eq!(set.atoms[0].displays[0].ietf_language, "en");
        // Both preserved when present.
        assert_eq!(set.atoms[1].displays[0].language, "jpn");
        assert_eq!(set.atoms[1].displays[0].ietf_language, "ja");
    }

    #[test]
    fn serializer_round_trips_through_parser() {
        let set = parse_chapters_xml(SAMPLE).unwrap();
        let xml = write_chapters_xml(&set);
        let reparsed = parse_chapters_xml(&xml).unwrap();
        assert_eq!(set, reparsed);
    }

    #[test]
    fn entities_are_escaped() {
        let set = parse_chapters_xml(SAMPLE).unwrap();
        let xml = write_chapters_xml(&set);
        assert!(xml.contains("Part One &amp; Two"));
    }

    #[test]
    fn empty_document_errors() {
        assert!(matches!(
            parse_chapters_xml("<Chapters></Chapters>"),
            Err(ChapterError::Empty)
        ));
        assert!(matches!(
            parse_chapters_xml("not xml"),
            Err(ChapterError::Xml(_))
        ));
    }
}
