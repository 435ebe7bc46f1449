//! C7: the field-position detector (§4.4). Two strategies run in sequence:
//! layout-first (universal) falls back to keyword-anchored when it yields
//! too few labeled positions.

pub mod font;
pub mod labels;
pub mod ocr;
pub mod strategy_b;
pub mod underline;

use image::DynamicImage;
use lopdf::Document;
use tracing::warn;
use vnform_core::model::BboxDetection;

use labels::{assign_labels, group_words, ElementCandidate};
use ocr::OcrEngine;
use strategy_b::MIN_LAYOUT_POSITIONS;
use underline::{detect_boxes, detect_underlines};

/// Runs Strategy A, falling back to Strategy B when too few positions are
/// found, and attaches font metadata from the source PDF. Any failure
/// inside the pipeline is captured into `BboxDetection::error` rather than
/// propagated — downstream components must tolerate an empty detection
/// (§4.4 "Failure semantics").
pub fn detect(image: &DynamicImage, pdf_doc: Option<&Document>, ocr_engine: &dyn OcrEngine) -> BboxDetection {
    let (width, height) = (image.width(), image.height());

    let font_info = pdf_doc.map(font::extract_font_info).unwrap_or_default();

    let words = match ocr_engine.recognize(image) {
        Ok(words) => words,
        Err(e) => {
            warn!(error = %e, "ocr engine failed");
            return BboxDetection {
                image_width: Some(width),
                image_height: Some(height),
                font_info,
                field_positions: Vec::new(),
                error: Some(e.to_string()),
            };
        }
    };

    let underlines = detect_underlines(image);
    let boxes = detect_boxes(image, &underlines);

    let elements: Vec<ElementCandidate> = underlines
        .iter()
        .copied()
        .chain(boxes.iter().copied())
        .map(ElementCandidate::from)
        .collect();

    let grouped_labels = group_words(&words);
    let mut positions = assign_labels(&elements, &grouped_labels, 1);

    if positions.len() < MIN_LAYOUT_POSITIONS {
        let fallback = strategy_b::detect(&words, &underlines);
        positions.extend(fallback);
    }

    BboxDetection {
        image_width: Some(width),
        image_height: Some(height),
        font_info,
        field_positions: positions,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr::{StubOcrEngine, WordBox};

    #[test]
    fn falls_back_to_strategy_b_when_strategy_a_finds_too_few() {
        let image = DynamicImage::new_rgb8(400, 200);
        let words = vec![WordBox {
            text: "Điện thoại".to_string(),
            x: 10.0,
            y: 10.0,
            width: 80.0,
            height: 14.0,
            confidence: 0.9,
        }];
        let engine = StubOcrEngine::new(words);
        let detection = detect(&image, None, &engine);
        assert!(detection.field_positions.iter().any(|p| p.field_id == "phone"));
        assert!(detection.error.is_none());
    }

    #[test]
    fn ocr_failure_yields_empty_positions_with_error() {
        struct FailingEngine;
        impl OcrEngine for FailingEngine {
            fn recognize(&self, _image: &DynamicImage) -> vnform_core::error::Result<Vec<WordBox>> {
                Err(vnform_core::error::VnFormError::DetectorFailed("boom".to_string()))
            }
        }
        let image = DynamicImage::new_rgb8(100, 100);
        let detection = detect(&image, None, &FailingEngine);
        assert!(detection.field_positions.is_empty());
        assert!(detection.error.is_some());
    }
}
