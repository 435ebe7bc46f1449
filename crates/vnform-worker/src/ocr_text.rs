//! Plain-text OCR for steps that need running text rather than word boxes
//! (title synthesis, field extraction, compound-triple detection) — reuses
//! the same `OcrEngine` the detector runs, reading lines off `WordBox.y`.

use image::DynamicImage;
use vnform_core::error::Result;
use vnform_detector::ocr::OcrEngine;

const LINE_HEIGHT_TOLERANCE: f32 = 5.0;

/// Joins recognized words into lines (grouped by `y` within tolerance, each
/// line's words ordered left to right) and lines with `\n`.
pub fn extract_plain_text(engine: &dyn OcrEngine, image: &DynamicImage) -> Result<String> {
    let mut words = engine.recognize(image)?;
    words.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap().then(a.x.partial_cmp(&b.x).unwrap()));

    let mut lines: Vec<Vec<String>> = Vec::new();
    let mut last_y: Option<f32> = None;
    for word in words {
        match last_y {
            Some(y) if (word.y - y).abs() <= LINE_HEIGHT_TOLERANCE => {
                lines.last_mut().unwrap().push(word.text);
            }
            _ => {
                lines.push(vec![word.text]);
            }
        }
        last_y = Some(word.y);
    }

    Ok(lines.into_iter().map(|words| words.join(" ")).collect::<Vec<_>>().join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnform_detector::ocr::{StubOcrEngine, WordBox};

    fn word(text: &str, x: f32, y: f32) -> WordBox {
        WordBox { text: text.to_string(), x, y, width: 40.0, height: 14.0, confidence: 0.9 }
    }

    #[test]
    fn groups_words_into_lines_by_y_proximity() {
        let engine = StubOcrEngine::new(vec![
            word("Họ", 10.0, 10.0),
            word("tên:", 60.0, 11.0),
            word("Địa", 10.0, 50.0),
            word("chỉ:", 60.0, 50.0),
        ]);
        let image = DynamicImage::new_rgb8(800, 600);
        let text = extract_plain_text(&engine, &image).unwrap();
        assert_eq!(text, "Họ tên:\nĐịa chỉ:");
    }

    #[test]
    fn empty_recognition_yields_empty_text() {
        let engine = StubOcrEngine::empty();
        let image = DynamicImage::new_rgb8(100, 100);
        assert_eq!(extract_plain_text(&engine, &image).unwrap(), "");
    }
}
