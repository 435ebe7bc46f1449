//! The fallback summary page (§4.7 "Rendering rules": "no bbox known for
//! any answered field"). Appended after all original pages, titled "Thông
//! tin đã điền", one `label: value` line per answered field, word-wrapped
//! at `page_width - 144` points, starting a fresh page whenever the cursor
//! would drop below y = 80.

use lopdf::content::Content;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use ttf_parser::Face;
use vnform_core::error::{Result, VnFormError};

use crate::content::{draw_lines, LINE_HEIGHT};
use crate::font::DEFAULT_FONT_SIZE;
use crate::glyphs::GlyphTable;
use crate::wrap::wrap_text;

const TITLE: &str = "Thông tin đã điền";
const MARGIN: f32 = 72.0;
const BOTTOM_GUARD: f32 = 80.0;

/// Appends one or more new pages listing `items` as `label: value` lines.
pub fn append_summary_pages(
    doc: &mut Document,
    face: &Face,
    table: &GlyphTable,
    page_width: f32,
    page_height: f32,
    items: &[(String, String)],
) -> Result<()> {
    let wrap_width = page_width - 144.0;
    let mut lines = vec![TITLE.to_string(), String::new()];
    for (label, value) in items {
        let entry = format!("{label}: {value}");
        lines.extend(wrap_text(face, DEFAULT_FONT_SIZE, wrap_width, &entry));
    }

    let mut pages: Vec<Vec<String>> = vec![Vec::new()];
    let mut y = page_height - MARGIN;
    for line in lines {
        if y < BOTTOM_GUARD {
            pages.push(Vec::new());
            y = page_height - MARGIN;
        }
        pages.last_mut().unwrap().push(line);
        y -= LINE_HEIGHT;
    }

    for page_lines in pages {
        add_text_page(doc, face, table, page_width, page_height, &page_lines)?;
    }
    Ok(())
}

fn add_text_page(doc: &mut Document, face: &Face, table: &GlyphTable, page_width: f32, page_height: f32, lines: &[String]) -> Result<()> {
    let ops = draw_lines(face, table, DEFAULT_FONT_SIZE, MARGIN, page_height - MARGIN, lines);
    let content_bytes = Content { operations: ops }
        .encode()
        .map_err(|e| VnFormError::ConversionFailed(format!("failed to encode summary page content: {e}")))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

    let (pages_root, next_number) = pages_root(doc)?;
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_root),
        "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {},
    });
    crate::embed::register_in_page_resources(doc, page_id, table_font_id(doc, pages_root)?)?;
    append_kid(doc, pages_root, page_id, next_number)?;
    Ok(())
}

/// The font object id is registered once, on the first original page; later
/// pages (including these new ones) reuse it by reading it back off that
/// page's resources rather than re-embedding the font.
fn table_font_id(doc: &Document, pages_root: ObjectId) -> Result<ObjectId> {
    let _ = pages_root;
    for page_id in doc.get_pages().values() {
        if let Ok(dict) = doc.get_dictionary(*page_id) {
            if let Ok(Object::Reference(resources_id)) = dict.get(b"Resources") {
                if let Ok(resources) = doc.get_dictionary(*resources_id) {
                    if let Ok(Object::Reference(font_dict_id)) = resources.get(b"Font") {
                        if let Ok(font_dict) = doc.get_dictionary(*font_dict_id) {
                            if let Ok(Object::Reference(font_id)) = font_dict.get(crate::embed::FONT_RESOURCE_NAME.as_bytes()) {
                                return Ok(*font_id);
                            }
                        }
                    }
                }
            }
        }
    }
    Err(VnFormError::ConversionFailed("embedded overlay font not found on any page".to_string()))
}

fn pages_root(doc: &Document) -> Result<(ObjectId, u32)> {
    let pages = doc.get_pages();
    let root_id = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(crate::embed::as_reference)
        .and_then(|catalog_id| doc.get_dictionary(catalog_id).ok().map(|c| (catalog_id, c)))
        .and_then(|(_, catalog)| catalog.get(b"Pages").ok().and_then(crate::embed::as_reference))
        .ok_or_else(|| VnFormError::ConversionFailed("document has no /Root/Pages entry".to_string()))?;
    Ok((root_id, pages.len() as u32 + 1))
}

fn append_kid(doc: &mut Document, pages_root: ObjectId, page_id: ObjectId, next_number: u32) -> Result<()> {
    let _ = next_number;
    let pages_dict = doc
        .objects
        .get_mut(&pages_root)
        .and_then(crate::embed::as_dict_mut)
        .ok_or_else(|| VnFormError::ConversionFailed("Pages root vanished while appending summary page".to_string()))?;

    let mut kids = match pages_dict.get(b"Kids").ok().cloned() {
        Some(Object::Array(kids)) => kids,
        _ => Vec::new(),
    };
    kids.push(Object::Reference(page_id));
    let count = kids.len() as i64;
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", Object::Integer(count));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::embed_font;
    use crate::font::discover_font;

    fn sample_document() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! { "Type" => "Pages", "Kids" => Vec::<Object>::new(), "Count" => 0i64 });
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
        });
        {
            let pages_dict = crate::embed::as_dict_mut(doc.objects.get_mut(&pages_id).unwrap()).unwrap();
            pages_dict.set("Kids", vec![Object::Reference(page_id)]);
            pages_dict.set("Count", 1i64);
        }
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => Object::Reference(pages_id) });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    #[test]
    fn appends_at_least_one_page_with_short_item_list() {
        let Ok(font) = discover_font("Helvetica") else { return };
        let Ok(face) = font.face() else { return };
        let mut doc = sample_document();
        let mut table = GlyphTable::default();
        table.record(&face, "Họ tên: Nguyễn Văn A");

        let font_id = embed_font(&mut doc, &font.name, &font.data, &face, &table).unwrap();
        let first_page = *doc.get_pages().values().next().unwrap();
        crate::embed::register_in_page_resources(&mut doc, first_page, font_id).unwrap();

        let before = doc.get_pages().len();
        append_summary_pages(&mut doc, &face, &table, 612.0, 792.0, &[("Họ tên".to_string(), "Nguyễn Văn A".to_string())]).unwrap();
        assert!(doc.get_pages().len() > before);
    }
}
