//! Deterministic rule-based fallback for every C10 method (§4.6: "Every call
//! has a deterministic fallback... C10 never blocks the critical path").
//! These are pure functions so the transport layer can call them with no
//! network involvement at all, and so they are independently testable.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use vnform_core::model::{FieldDescriptor, FieldType, SubfieldDescriptor};

use crate::types::{CompoundParseResult, ExtractedField, FieldExtractionResult};

/// Deterministic question phrasing from a field's label and type, with
/// disambiguation lookback (§4.5 "Question rendering").
pub fn fallback_question(field: &FieldDescriptor, subject_hint: Option<&str>) -> String {
    let label = match subject_hint {
        Some(subject) if is_ambiguous_label(&field.label) => {
            format!("{} {}", field.label, subject)
        }
        _ => field.label.clone(),
    };
    match field.field_type {
        FieldType::Email => format!("Vui lòng cho biết {label} (dạng email@example.com):"),
        FieldType::Tel => format!("Vui lòng cho biết {label} (số điện thoại):"),
        FieldType::Date => format!("Vui lòng cho biết {label} (định dạng dd/mm/yyyy):"),
        FieldType::Number => format!("Vui lòng cho biết {label} (chỉ nhập số):"),
        _ => format!("Vui lòng cho biết {label}:"),
    }
}

const AMBIGUOUS_LABELS: &[&str] = &["cấp ngày", "tại", "nơi cấp", "ngày cấp", "số"];

fn is_ambiguous_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    AMBIGUOUS_LABELS.iter().any(|needle| lower.contains(needle))
}

/// The rule-based fallback never second-guesses a value that already passed
/// the field's own normalizers/validators (§4.5): it is always `Valid`.
pub fn fallback_validate_answer() -> crate::types::AnswerClassification {
    crate::types::AnswerClassification::Valid
}

/// `"{label}: {value}"` join in field order (§4.5 "Preview").
pub fn fallback_preview(items: &[(String, String)]) -> String {
    items
        .iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First line after skipping known header patterns (national slogan, decree
/// numbers), truncated to 100 characters (§4.3 step 6).
pub fn fallback_title(ocr_text: &str) -> String {
    static DECREE_PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)^(số|no\.?|độc lập|cộng hòa)").unwrap());

    let title = ocr_text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !DECREE_PATTERN.is_match(line))
        .unwrap_or("Mẫu đơn");

    truncate_chars(title, 100)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Keyword-pattern extractor recognizing Vietnamese form idioms (§4.3 step 4).
pub fn fallback_extract_fields(ocr_text: &str) -> FieldExtractionResult {
    static PATTERNS: Lazy<Vec<(Regex, FieldType)>> = Lazy::new(|| {
        vec![
            (Regex::new(r"(?i)email|thư điện tử").unwrap(), FieldType::Email),
            (Regex::new(r"(?i)điện thoại|sđt|số đt").unwrap(), FieldType::Tel),
            (Regex::new(r"(?i)ngày sinh|ngày cấp|ngày tháng").unwrap(), FieldType::Date),
            (Regex::new(r"(?i)số nhà|nơi ở|địa chỉ").unwrap(), FieldType::Address),
            (Regex::new(r"(?i)họ và tên|họ tên|tên").unwrap(), FieldType::Text),
        ]
    });

    let mut fields = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for line in ocr_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        for (pattern, field_type) in PATTERNS.iter() {
            if pattern.is_match(line) && seen.insert(line.to_string()) {
                fields.push(ExtractedField {
                    label: line.to_string(),
                    field_type: *field_type,
                });
                break;
            }
        }
    }
    FieldExtractionResult { fields }
}

/// Fallback compound parser: recognizes the national-ID triple
/// (số / cấp ngày / cấp tại) per §8 scenarios S4/S5.
pub fn fallback_parse_compound(subfields: &[SubfieldDescriptor], raw: &str) -> CompoundParseResult {
    static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{9,12}\b").unwrap());
    static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").unwrap());
    static PLACE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)(?:tại|nơi cấp)\s+(.+)$").unwrap());

    let mut parsed = BTreeMap::new();
    for sub in subfields {
        let id_lower = sub.id.to_lowercase();
        if id_lower.contains("ngay") || id_lower.contains("ngày") {
            if let Some(m) = DATE.find(raw) {
                parsed.insert(sub.id.clone(), m.as_str().to_string());
            }
        } else if id_lower.contains("tai") || id_lower.contains("tại") || id_lower.contains("noi") || id_lower.contains("nơi") {
            if let Some(caps) = PLACE.captures(raw) {
                parsed.insert(sub.id.clone(), caps[1].trim().to_string());
            }
        } else if let Some(m) = NUMBER.find(raw) {
            parsed.insert(sub.id.clone(), m.as_str().to_string());
        }
    }

    let missing: Vec<String> = subfields
        .iter()
        .map(|s| s.id.clone())
        .filter(|id| !parsed.contains_key(id))
        .collect();

    CompoundParseResult {
        needs_clarification: !missing.is_empty(),
        parsed,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnform_core::model::{BBox, FieldDescriptor};

    fn field(label: &str, field_type: FieldType) -> FieldDescriptor {
        FieldDescriptor {
            id: "f1".to_string(),
            label: label.to_string(),
            field_type,
            required: true,
            page: 1,
            bbox: Some(BBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0, page: 1 }),
            subfields: vec![],
        }
    }

    #[test]
    fn ambiguous_label_gets_subject_prepended() {
        let f = field("cấp ngày", FieldType::Date);
        let q = fallback_question(&f, Some("CMND"));
        assert!(q.contains("CMND"));
    }

    #[test]
    fn non_ambiguous_label_ignores_subject_hint() {
        let f = field("Họ và tên", FieldType::Text);
        let q = fallback_question(&f, Some("CMND"));
        assert!(!q.contains("CMND"));
    }

    #[test]
    fn title_skips_decree_header_and_truncates() {
        let text = "Độc lập - Tự do - Hạnh phúc\nĐƠN XIN CẤP LẠI CMND\nHọ tên: ...";
        let title = fallback_title(text);
        assert_eq!(title, "ĐƠN XIN CẤP LẠI CMND");
    }

    #[test]
    fn compound_parse_full_triple_matches_spec_scenario_s4() {
        let subfields = vec![
            SubfieldDescriptor { id: "so".to_string(), label: "Số".to_string(), field_type: FieldType::Text, prompt: String::new() },
            SubfieldDescriptor { id: "cap_ngay".to_string(), label: "Cấp ngày".to_string(), field_type: FieldType::Date, prompt: String::new() },
            SubfieldDescriptor { id: "cap_tai".to_string(), label: "Cấp tại".to_string(), field_type: FieldType::Text, prompt: String::new() },
        ];
        let result = fallback_parse_compound(&subfields, "001234567890 cấp ngày 15/05/2020 tại Hà Nội");
        assert_eq!(result.parsed.get("so").unwrap(), "001234567890");
        assert_eq!(result.parsed.get("cap_ngay").unwrap(), "15/05/2020");
        assert_eq!(result.parsed.get("cap_tai").unwrap(), "Hà Nội");
        assert!(result.missing.is_empty());
        assert!(!result.needs_clarification);
    }

    #[test]
    fn compound_parse_partial_reports_missing_per_spec_scenario_s5() {
        let subfields = vec![
            SubfieldDescriptor { id: "so".to_string(), label: "Số".to_string(), field_type: FieldType::Text, prompt: String::new() },
            SubfieldDescriptor { id: "cap_ngay".to_string(), label: "Cấp ngày".to_string(), field_type: FieldType::Date, prompt: String::new() },
            SubfieldDescriptor { id: "cap_tai".to_string(), label: "Cấp tại".to_string(), field_type: FieldType::Text, prompt: String::new() },
        ];
        let result = fallback_parse_compound(&subfields, "001234567890");
        assert_eq!(result.missing, vec!["cap_ngay".to_string(), "cap_tai".to_string()]);
        assert!(result.needs_clarification);
    }
}
