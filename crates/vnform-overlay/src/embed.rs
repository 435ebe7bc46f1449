//! Embeds the discovered font into a `lopdf::Document` as a composite
//! Type0/CIDFontType2 font (§4.7 "Font embedding"), since Vietnamese text
//! needs coverage none of the 14 standard PDF fonts provide. Grounded on
//! `lopdf`'s object/dictionary API as the teacher already uses it for
//! metadata reads (`vnform-detector::font`); here it builds objects instead
//! of just traversing them.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use ttf_parser::Face;
use vnform_core::error::{Result, VnFormError};

use crate::glyphs::{to_unicode_cmap, width_entries, GlyphTable};

/// The resource name every content stream operator refers to this font by.
pub const FONT_RESOURCE_NAME: &str = "FVnOverlay";

/// Adds the font's `FontFile2`, descriptor, CID font and Type0 wrapper
/// objects, returning the Type0 font's object id.
pub fn embed_font(doc: &mut Document, font_name: &str, font_data: &[u8], face: &Face, table: &GlyphTable) -> Result<ObjectId> {
    let font_file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => font_data.len() as i64 },
        font_data.to_vec(),
    ));

    let bbox = face.global_bounding_box();
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(font_name.as_bytes().to_vec()),
        "Flags" => 4i64, // Symbolic (non-WinAnsi glyph set)
        "FontBBox" => vec![
            Object::Integer(bbox.x_min as i64),
            Object::Integer(bbox.y_min as i64),
            Object::Integer(bbox.x_max as i64),
            Object::Integer(bbox.y_max as i64),
        ],
        "ItalicAngle" => 0i64,
        "Ascent" => face.ascender() as i64,
        "Descent" => face.descender() as i64,
        "CapHeight" => face.capital_height().unwrap_or(face.ascender()) as i64,
        "StemV" => 80i64,
        "FontFile2" => Object::Reference(font_file_id),
    });

    let w_array: Vec<Object> = width_entries(table)
        .into_iter()
        .flat_map(|(gid, width)| {
            vec![
                Object::Integer(gid as i64),
                Object::Array(vec![Object::Integer(width as i64)]),
            ]
        })
        .collect();

    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(font_name.as_bytes().to_vec()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0i64,
        },
        "FontDescriptor" => Object::Reference(descriptor_id),
        "DW" => 1000i64,
        "W" => Object::Array(w_array),
        "CIDToGIDMap" => "Identity",
    });

    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(table)));

    let type0_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(font_name.as_bytes().to_vec()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => Object::Reference(to_unicode_id),
    });

    Ok(type0_id)
}

/// Registers `font_id` under `FONT_RESOURCE_NAME` in `page_id`'s resource
/// dictionary, creating `/Resources` and `/Resources/Font` inline if the
/// page doesn't already have them.
pub fn register_in_page_resources(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<()> {
    let resources_id = resolve_or_create_dict(doc, page_id, b"Resources")?;
    let font_dict_id = resolve_or_create_dict(doc, resources_id, b"Font")?;

    let font_dict = doc
        .objects
        .get_mut(&font_dict_id)
        .and_then(as_dict_mut)
        .ok_or_else(|| VnFormError::ConversionFailed("font resource dictionary vanished during embedding".to_string()))?;
    font_dict.set(FONT_RESOURCE_NAME, Object::Reference(font_id));
    Ok(())
}

/// Follows `parent_id`'s `key` entry, dereferencing indirect references; if
/// the key is absent, creates a fresh empty dictionary object, stores a
/// reference to it under `key`, and returns its id.
fn resolve_or_create_dict(doc: &mut Document, parent_id: ObjectId, key: &[u8]) -> Result<ObjectId> {
    let existing = doc
        .get_dictionary(parent_id)
        .ok()
        .and_then(|dict| dict.get(key).ok().cloned());

    match existing {
        Some(Object::Reference(id)) => Ok(id),
        Some(Object::Dictionary(inline)) => {
            let new_id = doc.add_object(inline);
            set_reference(doc, parent_id, key, new_id)?;
            Ok(new_id)
        }
        _ => {
            let new_id = doc.add_object(dictionary! {});
            set_reference(doc, parent_id, key, new_id)?;
            Ok(new_id)
        }
    }
}

fn set_reference(doc: &mut Document, parent_id: ObjectId, key: &[u8], target: ObjectId) -> Result<()> {
    let parent = doc
        .objects
        .get_mut(&parent_id)
        .and_then(as_dict_mut)
        .ok_or_else(|| VnFormError::ConversionFailed("parent dictionary vanished during embedding".to_string()))?;
    parent.set(key, Object::Reference(target));
    Ok(())
}

pub(crate) fn as_dict_mut(obj: &mut Object) -> Option<&mut lopdf::Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

pub(crate) fn as_reference(obj: &Object) -> Option<ObjectId> {
    match obj {
        Object::Reference(id) => Some(*id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::discover_font;

    #[test]
    fn embedding_registers_a_type0_font_object() {
        let Ok(font) = discover_font("Helvetica") else { return };
        let Ok(face) = font.face() else { return };
        let mut table = GlyphTable::default();
        table.record(&face, "Nguyen Van A");

        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });

        let font_id = embed_font(&mut doc, &font.name, &font.data, &face, &table).unwrap();
        register_in_page_resources(&mut doc, page_id, font_id).unwrap();

        let resources = doc.get_dictionary(page_id).unwrap().get(b"Resources").unwrap();
        let Object::Reference(resources_id) = resources else { panic!("expected indirect Resources") };
        let fonts = doc.get_dictionary(*resources_id).unwrap().get(b"Font").unwrap();
        let Object::Reference(fonts_id) = fonts else { panic!("expected indirect Font dict") };
        assert!(doc.get_dictionary(*fonts_id).unwrap().get(FONT_RESOURCE_NAME.as_bytes()).is_ok());
    }
}
