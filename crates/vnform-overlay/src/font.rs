//! Font discovery (§4.7 "Font"). Vietnamese answer text needs full Unicode
//! coverage beyond WinAnsiEncoding, so the overlay always embeds a real
//! TrueType font rather than reusing one of the 14 standard PDF fonts.
//! Grounded on `scostello-pdf_oxide`'s `fontdb`/`ttf-parser` pairing
//! (platform font discovery + cmap/metrics reading) — the teacher has no
//! font-embedding code of its own.

use fontdb::{Database, Family, Query, Weight, ID};
use ttf_parser::Face;
use vnform_core::error::{Result, VnFormError};

pub const DEFAULT_FONT_SIZE: f32 = 12.0;

const SERIF_CANDIDATES: &[&str] = &["Liberation Serif", "Times New Roman", "Nimbus Roman", "DejaVu Serif"];
const SANS_CANDIDATES: &[&str] = &["Noto Sans", "DejaVu Sans", "Liberation Sans", "FreeSans", "Arial"];

/// A system font loaded into memory, ready for `ttf-parser` inspection and
/// for embedding as a `FontFile2` stream.
pub struct LoadedFont {
    pub name: String,
    pub data: Vec<u8>,
    pub face_index: u32,
}

impl LoadedFont {
    pub fn face(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, self.face_index)
            .map_err(|e| VnFormError::ConversionFailed(format!("failed to parse embedded font '{}': {e}", self.name)))
    }
}

/// Prefers Liberation Serif (or a Times-compatible stand-in) when the
/// detector's primary font is a serif/Times family, else a Unicode-capable
/// sans fallback, discovered by probing the system's installed fonts.
pub fn discover_font(primary_font: &str) -> Result<LoadedFont> {
    let mut db = Database::new();
    db.load_system_fonts();

    let is_serif = ["Times", "Serif", "Liberation"].iter().any(|hint| primary_font.contains(hint));
    let candidates: &[&str] = if is_serif { SERIF_CANDIDATES } else { SANS_CANDIDATES };

    for family in candidates {
        if let Some(font) = query_family(&db, family) {
            return Ok(font);
        }
    }
    // Last resort: whatever the platform has, so Vietnamese diacritics still
    // get *some* embedded Unicode coverage instead of failing the overlay.
    let fallback_id = db.faces().next().map(|face| face.id);
    fallback_id
        .and_then(|id| load_face(&db, id))
        .ok_or_else(|| VnFormError::ConversionFailed("no usable system font found for embedding".to_string()))
}

fn query_family(db: &Database, family: &str) -> Option<LoadedFont> {
    let query = Query { families: &[Family::Name(family)], weight: Weight::NORMAL, ..Query::default() };
    let id = db.query(&query)?;
    load_face(db, id)
}

fn load_face(db: &Database, id: ID) -> Option<LoadedFont> {
    let name = db.face(id)?.families.first().map(|(n, _)| n.clone()).unwrap_or_else(|| "Embedded".to_string());
    db.with_face_data(id, |data, face_index| LoadedFont { name: name.clone(), data: data.to_vec(), face_index })
}

#[cfg(test)]
mod tests {
    use super::*;

    // These skip rather than fail when the sandbox has no fonts installed —
    // font availability is an environment fact, not something this crate
    // controls (mirrors `convert.rs`'s missing-LibreOffice test).
    #[test]
    fn serif_hint_prefers_a_serif_family_when_available() {
        let Ok(font) = discover_font("TimesNewRomanPSMT") else { return };
        assert!(!font.data.is_empty());
    }

    #[test]
    fn non_serif_hint_still_resolves_to_some_font() {
        let Ok(font) = discover_font("Helvetica") else { return };
        assert!(font.face().is_ok());
    }
}
