//! The full C6 pipeline (§4.3): classify, convert if needed, rasterize,
//! detect, OCR, extract, title, upsert. One event in, at most one
//! `FormSchema` upsert out (§4.3 "Invariants").

use chrono::Utc;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;
use vnform_core::error::{Result, VnFormError};
use vnform_core::model::{BlobRef, FieldDescriptor, FieldType, FormSchema};
use vnform_detector::ocr::OcrEngine;
use vnform_eventbus::ObjectCreatedEvent;
use vnform_llm::LlmClient;
use vnform_storage::{converted_pdf_key, ObjectStore, SqliteMetadataStore};

use crate::classify::{sniff, SniffedFormat};
use crate::convert::convert_to_pdf;
use crate::extract::{best_bbox_match, detect_compound_fields, fallback_extract_simple_fields};
use crate::ocr_text::extract_plain_text;
use crate::rasterize::rasterize_first_page;

const VIETNAMESE_DIACRITIC_RANGES: [(char, char); 2] = [('\u{0300}', '\u{036f}'), ('\u{1ea0}', '\u{1ef9}')];

pub struct FormWorker<S: ObjectStore> {
    pub object_store: S,
    pub metadata: SqliteMetadataStore,
    pub pdfium: pdfium_render::prelude::Pdfium,
    pub ocr_engine: Box<dyn OcrEngine>,
    pub llm: LlmClient,
}

impl<S: ObjectStore> FormWorker<S> {
    /// §4.2 "C6 must be idempotent on form_id" — safe to call more than
    /// once for the same event.
    pub async fn handle_event(&self, event: &ObjectCreatedEvent, work_dir: &Path) -> Result<String> {
        let original_bytes = self.object_store.get(&event.key)?;
        let sniffed = sniff(&original_bytes);

        let (form_id, pdf_bytes) = match sniffed {
            SniffedFormat::Pdf => (event.key.clone(), original_bytes),
            SniffedFormat::ProbableDocx | SniffedFormat::LegacyDoc => {
                let input_path = work_dir.join(Path::new(&event.key).file_name().unwrap_or_default());
                tokio::fs::write(&input_path, &original_bytes).await?;
                let produced = convert_to_pdf(&input_path, work_dir).await?;
                let converted_bytes = tokio::fs::read(&produced).await?;
                let pdf_key = converted_pdf_key(&event.key);
                self.object_store.put(&pdf_key, &converted_bytes, "application/pdf")?;
                (pdf_key, converted_bytes)
            }
            SniffedFormat::Image | SniffedFormat::Unknown => {
                return Err(VnFormError::ConversionFailed(format!(
                    "unsupported source format for key '{}'",
                    event.key
                )));
            }
        };

        let schema = self.build_schema(&form_id, &pdf_bytes).await?;
        self.metadata.upsert_form_schema(&schema)?;
        info!(form_id = %form_id, fields = schema.fields.len(), "form schema upserted");
        Ok(form_id)
    }

    async fn build_schema(&self, form_id: &str, pdf_bytes: &[u8]) -> Result<FormSchema> {
        let image = rasterize_first_page(&self.pdfium, pdf_bytes)?;

        let pdf_doc = lopdf::Document::load_mem(pdf_bytes).ok();
        let bbox_detection = vnform_detector::detect(&image, pdf_doc.as_ref(), self.ocr_engine.as_ref());

        let ocr_text = extract_plain_text(self.ocr_engine.as_ref(), &image).unwrap_or_default();

        let compounds = detect_compound_fields(&ocr_text);
        let llm_extraction = self.llm.extract_fields(&ocr_text).await;
        let simple_fields = if llm_extraction.fields.is_empty() {
            fallback_extract_simple_fields(&ocr_text, &compounds)
        } else {
            llm_extraction.fields
        };

        let mut fields = Vec::new();
        for (idx, compound) in compounds.iter().enumerate() {
            fields.push(FieldDescriptor {
                id: format!("compound_{idx}"),
                label: compound.label.clone(),
                field_type: FieldType::Compound,
                required: true,
                page: 1,
                bbox: None,
                subfields: compound.subfields.clone(),
            });
        }
        for (idx, extracted) in simple_fields.iter().enumerate() {
            let bbox = best_bbox_match(&extracted.label, &bbox_detection.field_positions, |p| p.label.as_str())
                .map(|p| p.bbox);
            fields.push(FieldDescriptor {
                id: format!("field_{idx}"),
                label: extracted.label.clone(),
                field_type: extracted.field_type,
                required: true,
                page: 1,
                bbox,
                subfields: vec![],
            });
        }

        let has_diacritics = ocr_text.chars().any(is_vietnamese_diacritic);
        let title = self.llm.synthesize_title(&ocr_text, has_diacritics).await;

        Ok(FormSchema {
            form_id: form_id.to_string(),
            title,
            aliases: BTreeSet::new(),
            page_count: 1,
            source: BlobRef {
                bucket: self.object_store.bucket().to_string(),
                key: form_id.to_string(),
            },
            fields,
            bbox_detection,
            created_at: Utc::now(),
        })
    }
}

fn is_vietnamese_diacritic(c: char) -> bool {
    VIETNAMESE_DIACRITIC_RANGES.iter().any(|(lo, hi)| *lo <= c && c <= *hi)
        || matches!(c, 'đ' | 'Đ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_vietnamese_diacritics() {
        assert!("Cộng hòa".chars().any(is_vietnamese_diacritic));
        assert!(!"Republic".chars().any(is_vietnamese_diacritic));
    }

    #[test]
    fn detects_dd_as_diacritic() {
        assert!("Độc lập".chars().any(is_vietnamese_diacritic));
    }
}
