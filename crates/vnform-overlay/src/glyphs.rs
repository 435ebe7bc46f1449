//! Glyph metrics for the embedded composite font (§4.7 "Font embedding").
//! CIDToGIDMap is always `Identity`, so a glyph's Identity-H code, its CID
//! and its GID are the same `u16` throughout this module.

use std::collections::BTreeMap;
use ttf_parser::Face;

/// Per-glyph data collected from every string the overlay will draw, so the
/// embedded font only carries metrics (and a `ToUnicode` entry) for glyphs
/// actually used.
#[derive(Debug, Default)]
pub struct GlyphTable {
    /// gid -> advance width scaled to a 1000-unit em (the PDF `W` array
    /// convention), read from the font's `hmtx` table.
    pub widths: BTreeMap<u16, u16>,
    /// gid -> the Unicode scalar it renders, for the `ToUnicode` CMap.
    pub to_unicode: BTreeMap<u16, char>,
}

impl GlyphTable {
    pub fn record(&mut self, face: &Face, text: &str) {
        let units_per_em = face.units_per_em() as f32;
        for ch in text.chars() {
            let Some(gid) = face.glyph_index(ch) else { continue };
            self.to_unicode.entry(gid.0).or_insert(ch);
            self.widths.entry(gid.0).or_insert_with(|| {
                let advance = face.glyph_hor_advance(gid).unwrap_or(units_per_em as u16) as f32;
                ((advance / units_per_em) * 1000.0).round() as u16
            });
        }
    }

    /// Encodes `text` as the 2-byte-per-glyph Identity-H code string (each
    /// code equals its CID equals its GID).
    pub fn encode(&self, face: &Face, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.chars().count() * 2);
        for ch in text.chars() {
            let gid = face.glyph_index(ch).map(|g| g.0).unwrap_or(0);
            out.extend_from_slice(&gid.to_be_bytes());
        }
        out
    }
}

/// Builds the PDF `W` array contents as `[gid [width] gid [width] ...]`
/// entries, one per used glyph.
pub fn width_entries(table: &GlyphTable) -> Vec<(u16, u16)> {
    table.widths.iter().map(|(&gid, &w)| (gid, w)).collect()
}

/// Renders a `ToUnicode` CMap stream mapping each used glyph back to the
/// Unicode scalar it represents, chunked at 100 `bfchar` entries per block
/// per the CMap spec's per-operator limit.
pub fn to_unicode_cmap(table: &GlyphTable) -> Vec<u8> {
    const CHUNK: usize = 100;
    let entries: Vec<(u16, char)> = table.to_unicode.iter().map(|(&g, &c)| (g, c)).collect();

    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    for chunk in entries.chunks(CHUNK) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, ch) in chunk {
            let mut utf16 = [0u16; 2];
            for unit in ch.encode_utf16(&mut utf16) {
                out.push_str(&format!("<{:04X}> <{:04X}>\n", gid, unit));
            }
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\nCMapType findresource pop\nend\nend\n");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_entries_sorted_by_gid() {
        let mut table = GlyphTable::default();
        table.widths.insert(5, 600);
        table.widths.insert(2, 500);
        let entries = width_entries(&table);
        assert_eq!(entries, vec![(2, 500), (5, 600)]);
    }

    #[test]
    fn cmap_contains_codespace_and_bfchar_block() {
        let mut table = GlyphTable::default();
        table.to_unicode.insert(10, 'A');
        let cmap = String::from_utf8(to_unicode_cmap(&table)).unwrap();
        assert!(cmap.contains("begincodespacerange"));
        assert!(cmap.contains("<000A> <0041>"));
    }
}
