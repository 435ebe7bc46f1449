//! Strategy B — keyword-anchored fallback (§4.4), run when Strategy A
//! yields fewer than `MIN_LAYOUT_POSITIONS` labeled positions.

use once_cell::sync::Lazy;
use regex::Regex;
use vnform_core::model::{BBox, DetectionType, FieldPosition};

use crate::ocr::WordBox;
use crate::underline::RectBox;

pub const MIN_LAYOUT_POSITIONS: usize = 3;

const FALLBACK_WIDTH: f32 = 200.0;
const NEAREST_UNDERLINE_MAX_DY: f32 = 80.0;
const NEAREST_UNDERLINE_COLUMN_TOLERANCE: f32 = 200.0;

struct KeywordPattern {
    field_id: &'static str,
    regex: Regex,
}

static PATTERNS: Lazy<Vec<KeywordPattern>> = Lazy::new(|| {
    vec![
        ("phone", r"(?i)điện thoại|sđt|phone|tel\b"),
        ("email", r"(?i)email|e-mail|thư điện tử"),
        ("name", r"(?i)họ và tên|họ tên|full name|name\b"),
        ("dob", r"(?i)ngày sinh|date of birth|dob\b"),
        ("address", r"(?i)địa chỉ|nơi ở|address\b"),
        ("id_number", r"(?i)số cmnd|số cccd|id number|chứng minh"),
        ("position", r"(?i)chức vụ|position\b"),
        ("department", r"(?i)phòng ban|department\b"),
        ("education", r"(?i)trình độ|education\b"),
        ("company", r"(?i)công ty|company\b"),
    ]
    .into_iter()
    .map(|(field_id, pattern)| KeywordPattern {
        field_id,
        regex: Regex::new(pattern).unwrap(),
    })
    .collect()
});

/// For each keyword match in OCR words, find the nearest underline below
/// (same column within 200px, vertical gap 0-80px); if none, emit a
/// fallback position 10px to the right of the label baseline, width 200px.
pub fn detect(words: &[WordBox], underlines: &[RectBox]) -> Vec<FieldPosition> {
    let mut positions = Vec::new();
    let mut used_field_ids = std::collections::HashSet::new();

    for word in words {
        let Some(pattern) = PATTERNS.iter().find(|p| p.regex.is_match(&word.text)) else {
            continue;
        };
        if !used_field_ids.insert(pattern.field_id) {
            continue;
        }

        let nearest = underlines
            .iter()
            .filter(|u| {
                let dx = (u.x - word.x).abs();
                let dy = u.y - word.baseline_y();
                dx < NEAREST_UNDERLINE_COLUMN_TOLERANCE && (0.0..=NEAREST_UNDERLINE_MAX_DY).contains(&dy)
            })
            .min_by(|a, b| {
                (a.y - word.baseline_y())
                    .partial_cmp(&(b.y - word.baseline_y()))
                    .unwrap()
            });

        let bbox = match nearest {
            Some(u) => BBox { x: u.x, y: u.y, width: u.width, height: u.height, page: 1 },
            None => BBox {
                x: word.x + word.width + 10.0,
                y: word.y,
                width: FALLBACK_WIDTH,
                height: word.height,
                page: 1,
            },
        };

        positions.push(FieldPosition {
            field_id: pattern.field_id.to_string(),
            label: word.text.clone(),
            bbox,
            confidence: word.confidence,
            detection_type: DetectionType::Keyword,
        });
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: f32, y: f32) -> WordBox {
        WordBox { text: text.to_string(), x, y, width: 60.0, height: 14.0, confidence: 0.9 }
    }

    #[test]
    fn anchors_to_nearest_underline_below() {
        let words = vec![word("Điện thoại", 10.0, 10.0)];
        let underlines = vec![RectBox { x: 12.0, y: 40.0, width: 100.0, height: 1.0 }];
        let positions = detect(&words, &underlines);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].field_id, "phone");
        assert_eq!(positions[0].bbox.y, 40.0);
    }

    #[test]
    fn falls_back_to_offset_position_when_no_underline_nearby() {
        let words = vec![word("Email", 10.0, 10.0)];
        let positions = detect(&words, &[]);
        assert_eq!(positions[0].bbox.x, 10.0 + 60.0 + 10.0);
        assert_eq!(positions[0].bbox.width, FALLBACK_WIDTH);
    }

    #[test]
    fn only_emits_one_position_per_field_kind() {
        let words = vec![word("Email", 10.0, 10.0), word("email thứ hai", 10.0, 100.0)];
        let positions = detect(&words, &[]);
        assert_eq!(positions.len(), 1);
    }
}
