//! Top-level overlay entry point (§4.7). Draws answered fields onto the
//! original PDF at their detected positions, falls back to a synthesized
//! summary page when no field carries a bbox, and — on any unexpected
//! error — returns the original bytes unchanged rather than ever emitting
//! a corrupted or partial document.

use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use vnform_core::error::{Result, VnFormError};
use vnform_core::model::{BboxDetection, FieldDescriptor, FormSchema};
use vnform_core::session::AnswerValue;

use crate::content::draw_lines;
use crate::embed::{embed_font, register_in_page_resources};
use crate::font::{discover_font, DEFAULT_FONT_SIZE};
use crate::glyphs::GlyphTable;
use crate::summary::append_summary_pages;
use crate::transform::{draw_position, scale_factors};
use crate::wrap::wrap_text;

/// Renders `answers` onto `original_pdf` per `schema`'s field positions.
/// Never fails outward: any internal error is logged and the original
/// bytes are returned unchanged.
pub fn render_overlay(original_pdf: &[u8], schema: &FormSchema, answers: &BTreeMap<String, AnswerValue>) -> Vec<u8> {
    if answers.is_empty() {
        return original_pdf.to_vec();
    }
    match try_render(original_pdf, schema, answers) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(form_id = %schema.form_id, error = %err, "overlay render failed, returning original PDF unchanged");
            original_pdf.to_vec()
        }
    }
}

struct AnsweredField<'a> {
    field: &'a FieldDescriptor,
    text: String,
}

fn try_render(original_pdf: &[u8], schema: &FormSchema, answers: &BTreeMap<String, AnswerValue>) -> Result<Vec<u8>> {
    let answered = collect_answered_fields(schema, answers);
    if answered.is_empty() {
        return Ok(original_pdf.to_vec());
    }

    let mut doc = Document::load_mem(original_pdf).map_err(|e| VnFormError::ConversionFailed(format!("failed to load PDF: {e}")))?;
    let (first_page_id, page_width, page_height) = first_page_media_box(&doc)?;

    let font = discover_font(&schema.bbox_detection.font_info.primary_font)?;
    let face = font.face()?;

    let mut table = GlyphTable::default();
    for item in &answered {
        table.record(&face, &item.text);
        table.record(&face, &item.field.label);
    }
    table.record(&face, "Thông tin đã điền");

    let font_id = embed_font(&mut doc, &font.name, &font.data, &face, &table)?;
    register_in_page_resources(&mut doc, first_page_id, font_id)?;

    let any_bbox = answered.iter().any(|a| a.field.bbox.is_some());
    if !any_bbox {
        let items: Vec<(String, String)> = answered.iter().map(|a| (a.field.label.clone(), a.text.clone())).collect();
        append_summary_pages(&mut doc, &face, &table, page_width, page_height, &items)?;
    } else {
        draw_positioned_fields(&mut doc, &face, &table, first_page_id, page_width, page_height, &schema.bbox_detection, &answered)?;
    }

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| VnFormError::ConversionFailed(format!("failed to serialize overlaid PDF: {e}")))?;
    Ok(out)
}

fn collect_answered_fields<'a>(schema: &'a FormSchema, answers: &BTreeMap<String, AnswerValue>) -> Vec<AnsweredField<'a>> {
    schema
        .fields
        .iter()
        .filter_map(|field| {
            let value = answers.get(&field.id)?;
            let subfield_order: Vec<String> = field.subfields.iter().map(|s| s.id.clone()).collect();
            let text = value.flatten(&subfield_order);
            if text.is_empty() {
                return None;
            }
            Some(AnsweredField { field, text })
        })
        .collect()
}

fn draw_positioned_fields(
    doc: &mut Document,
    face: &ttf_parser::Face,
    table: &GlyphTable,
    page_id: ObjectId,
    page_width: f32,
    page_height: f32,
    bbox_detection: &BboxDetection,
    answered: &[AnsweredField],
) -> Result<()> {
    let image_width = bbox_detection.image_width.ok_or_else(|| VnFormError::ConversionFailed("bbox present but image_width missing".to_string()))?;
    let image_height = bbox_detection.image_height.ok_or_else(|| VnFormError::ConversionFailed("bbox present but image_height missing".to_string()))?;
    let scale = scale_factors(page_width, page_height, image_width as f32, image_height as f32);

    let mut ops = Vec::new();
    for item in answered {
        let Some(bbox) = item.field.bbox else { continue };
        let (x, y) = draw_position(&bbox, page_height, scale);
        let wrap_width = page_width - x - 72.0;
        let lines = wrap_text(face, DEFAULT_FONT_SIZE, wrap_width.max(1.0), &item.text);
        ops.extend(draw_lines(face, table, DEFAULT_FONT_SIZE, x, y, &lines));
    }

    let existing = doc.get_page_content(page_id).map_err(|e| VnFormError::ConversionFailed(format!("failed to read page content: {e}")))?;
    let mut content = Content::decode(&existing).map_err(|e| VnFormError::ConversionFailed(format!("failed to decode page content: {e}")))?;
    content.operations.extend(ops);
    let encoded = content.encode().map_err(|e| VnFormError::ConversionFailed(format!("failed to encode page content: {e}")))?;
    doc.change_page_content(page_id, encoded).map_err(|e| VnFormError::ConversionFailed(format!("failed to write page content: {e}")))?;
    Ok(())
}

/// Page 1's id and its `MediaBox` width/height in points, walking up
/// `/Parent` references when the page doesn't carry its own `MediaBox`
/// (inherited page attributes, per the PDF spec).
fn first_page_media_box(doc: &Document) -> Result<(ObjectId, f32, f32)> {
    let page_id = *doc
        .get_pages()
        .values()
        .next()
        .ok_or_else(|| VnFormError::ConversionFailed("PDF has no pages".to_string()))?;
    let (width, height) = media_box(doc, page_id)?;
    Ok((page_id, width, height))
}

fn media_box(doc: &Document, mut id: ObjectId) -> Result<(f32, f32)> {
    loop {
        let dict = doc
            .get_dictionary(id)
            .map_err(|e| VnFormError::ConversionFailed(format!("failed to read page dictionary: {e}")))?;
        if let Ok(Object::Array(box_values)) = dict.get(b"MediaBox") {
            if box_values.len() == 4 {
                let nums: Vec<f32> = box_values.iter().filter_map(number_value).collect();
                if nums.len() == 4 {
                    return Ok((nums[2] - nums[0], nums[3] - nums[1]));
                }
            }
        }
        match dict.get(b"Parent").ok().and_then(object_reference) {
            Some(parent_id) => id = parent_id,
            None => return Err(VnFormError::ConversionFailed("no MediaBox found in page ancestry".to_string())),
        }
    }
}

fn number_value(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f as f32),
        _ => None,
    }
}

fn object_reference(obj: &Object) -> Option<ObjectId> {
    match obj {
        Object::Reference(id) => Some(*id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use vnform_core::model::{BBox, BlobRef, DetectionType, FieldPosition, FieldType, FontInfo};

    fn schema_with_field(bbox: Option<BBox>) -> FormSchema {
        FormSchema {
            form_id: "form1".to_string(),
            title: "Mau don".to_string(),
            aliases: BTreeSet::new(),
            page_count: 1,
            source: BlobRef { bucket: "forms".to_string(), key: "form1".to_string() },
            fields: vec![FieldDescriptor {
                id: "full_name".to_string(),
                label: "Họ tên".to_string(),
                field_type: FieldType::Text,
                required: true,
                page: 1,
                bbox,
                subfields: vec![],
            }],
            bbox_detection: BboxDetection {
                image_width: Some(600),
                image_height: Some(800),
                font_info: FontInfo::default(),
                field_positions: vec![FieldPosition {
                    field_id: "full_name".to_string(),
                    label: "Họ tên".to_string(),
                    bbox: BBox { x: 100.0, y: 100.0, width: 200.0, height: 20.0, page: 1 },
                    confidence: 0.9,
                    detection_type: DetectionType::Layout,
                }],
                error: None,
            },
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn empty_answers_returns_original_bytes_unchanged() {
        let schema = schema_with_field(None);
        let original = b"%PDF-1.4 not a real pdf".to_vec();
        let result = render_overlay(&original, &schema, &BTreeMap::new());
        assert_eq!(result, original);
    }

    #[test]
    fn malformed_pdf_falls_back_to_original_bytes() {
        let schema = schema_with_field(Some(BBox { x: 100.0, y: 100.0, width: 200.0, height: 20.0, page: 1 }));
        let mut answers = BTreeMap::new();
        answers.insert("full_name".to_string(), AnswerValue::Scalar("Nguyễn Văn A".to_string()));
        let original = b"this is not a pdf at all".to_vec();
        let result = render_overlay(&original, &schema, &answers);
        assert_eq!(result, original);
    }
}
