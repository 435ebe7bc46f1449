//! Step 4: typed field list from OCR text (§4.3), and step 5's fuzzy
//! bbox-attachment (§4.3: "case-folded similarity ≥ 0.30, keep best").
//!
//! The LLM path is `vnform_llm::LlmClient::extract_fields`; this module
//! supplies the compound-triple detection the spec calls out on top of it
//! (national ID + issue date + issue place, passport), plus the fallback
//! used when the LLM is unavailable — reusing `vnform_llm::fallback` for
//! the simple-field heuristics so the two paths agree on field typing.

use once_cell::sync::Lazy;
use regex::Regex;
use vnform_core::model::{FieldType, SubfieldDescriptor};
use vnform_llm::{fallback, ExtractedField, FieldExtractionResult};

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundFieldSpec {
    pub label: String,
    pub subfields: Vec<SubfieldDescriptor>,
}

static NATIONAL_ID_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)số cmnd|cccd|chứng minh nhân dân|căn cước").unwrap());
static ISSUE_DATE_ANCHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)cấp ngày|ngày cấp").unwrap());
static ISSUE_PLACE_ANCHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)nơi cấp|cấp tại|tại").unwrap());
static PASSPORT_ANCHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)hộ chiếu|passport").unwrap());

/// Detects national-ID and passport compound triples in OCR text (§4.3
/// step 4 "detects compound triples"). A triple is recognized when all
/// three anchor phrases (number / issue date / issue place) co-occur.
pub fn detect_compound_fields(ocr_text: &str) -> Vec<CompoundFieldSpec> {
    let mut compounds = Vec::new();

    let has_national_id = NATIONAL_ID_ANCHOR.is_match(ocr_text);
    let has_passport = PASSPORT_ANCHOR.is_match(ocr_text);
    let has_date = ISSUE_DATE_ANCHOR.is_match(ocr_text);
    let has_place = ISSUE_PLACE_ANCHOR.is_match(ocr_text);

    if has_national_id && has_date && has_place {
        compounds.push(CompoundFieldSpec {
            label: "Số CMND/CCCD".to_string(),
            subfields: vec![
                SubfieldDescriptor { id: "so".to_string(), label: "Số".to_string(), field_type: FieldType::Text, prompt: "Số CMND/CCCD của bạn là gì?".to_string() },
                SubfieldDescriptor { id: "cap_ngay".to_string(), label: "Cấp ngày".to_string(), field_type: FieldType::Date, prompt: "Ngày cấp (dd/mm/yyyy)?".to_string() },
                SubfieldDescriptor { id: "cap_tai".to_string(), label: "Cấp tại".to_string(), field_type: FieldType::Text, prompt: "Nơi cấp?".to_string() },
            ],
        });
    }

    if has_passport && has_date && has_place {
        compounds.push(CompoundFieldSpec {
            label: "Hộ chiếu".to_string(),
            subfields: vec![
                SubfieldDescriptor { id: "so".to_string(), label: "Số hộ chiếu".to_string(), field_type: FieldType::Text, prompt: "Số hộ chiếu của bạn là gì?".to_string() },
                SubfieldDescriptor { id: "ngay_cap".to_string(), label: "Ngày cấp".to_string(), field_type: FieldType::Date, prompt: "Ngày cấp (dd/mm/yyyy)?".to_string() },
                SubfieldDescriptor { id: "noi_cap".to_string(), label: "Nơi cấp".to_string(), field_type: FieldType::Text, prompt: "Nơi cấp?".to_string() },
            ],
        });
    }

    compounds
}

/// Fallback simple-field extraction excluding lines already captured by a
/// compound triple, so the same anchor phrase is not emitted twice.
pub fn fallback_extract_simple_fields(ocr_text: &str, compounds: &[CompoundFieldSpec]) -> Vec<ExtractedField> {
    let FieldExtractionResult { fields } = fallback::fallback_extract_fields(ocr_text);
    fields
        .into_iter()
        .filter(|f| {
            !compounds.iter().any(|c| {
                NATIONAL_ID_ANCHOR.is_match(&f.label) && c.label.starts_with("Số")
                    || PASSPORT_ANCHOR.is_match(&f.label) && c.label.starts_with("Hộ")
            })
        })
        .collect()
}

/// §4.3 step 5: case-folded similarity ≥ 0.30 between an extracted label and
/// each detected layout label, keeping the best match.
pub fn best_bbox_match<'a, T>(
    extracted_label: &str,
    candidates: &'a [T],
    label_of: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    const MIN_SIMILARITY: f64 = 0.30;
    let needle = extracted_label.to_lowercase();

    candidates
        .iter()
        .map(|c| (c, strsim::normalized_levenshtein(&needle, &label_of(c).to_lowercase())))
        .filter(|(_, score)| *score >= MIN_SIMILARITY)
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
        .map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_national_id_triple_when_all_anchors_present() {
        let text = "Số CMND: ...\nCấp ngày: 15/05/2020\nNơi cấp: Hà Nội";
        let compounds = detect_compound_fields(text);
        assert_eq!(compounds.len(), 1);
        assert_eq!(compounds[0].subfields.len(), 3);
    }

    #[test]
    fn no_compound_when_place_anchor_missing() {
        let text = "Số CMND: ...\nCấp ngày: 15/05/2020";
        assert!(detect_compound_fields(text).is_empty());
    }

    #[test]
    fn best_bbox_match_picks_highest_similarity_above_threshold() {
        let candidates = vec!["Họ và tên:".to_string(), "Địa chỉ:".to_string()];
        let best = best_bbox_match("họ tên", &candidates, |s| s.as_str());
        assert_eq!(best.unwrap(), "Họ và tên:");
    }

    #[test]
    fn best_bbox_match_returns_none_below_threshold() {
        let candidates = vec!["Số điện thoại di động:".to_string()];
        let best = best_bbox_match("zzzzzzz", &candidates, |s| s.as_str());
        assert!(best.is_none());
    }
}
