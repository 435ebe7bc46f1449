//! Validators and normalizers as sum types with an interpreter (§9 Design
//! Notes: "represent FieldDescriptor as a tagged variant ... validators and
//! normalizers are sum types with an interpreter").

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single normalization step, applied in declared order (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalizer {
    Strip,
    CollapseWhitespace,
    Upper,
    Lower,
    Title,
}

impl Normalizer {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Normalizer::Strip => value.trim().to_string(),
            Normalizer::CollapseWhitespace => {
                value.split_whitespace().collect::<Vec<_>>().join(" ")
            }
            Normalizer::Upper => value.to_uppercase(),
            Normalizer::Lower => value.to_lowercase(),
            Normalizer::Title => value
                .split_whitespace()
                .map(title_case_word)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// A single validation rule. Applied after normalizers; the first failure
/// wins and its message is returned to the caller as a regular turn
/// outcome, not an error (§7 ValidationFailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validator {
    Regex { pattern: String, message: String },
    Length { min: usize, max: usize, message: String },
    NumericRange { min: f64, max: f64, message: String },
    /// `dd/mm/yyyy` date range validator (§4.5).
    DateRange {
        min: Option<chrono::NaiveDate>,
        max: Option<chrono::NaiveDate>,
        message: String,
    },
}

impl Validator {
    /// Returns `Ok(())` on success or `Err(message)` on failure.
    pub fn check(&self, value: &str) -> Result<(), String> {
        match self {
            Validator::Regex { pattern, message } => {
                let re = Regex::new(pattern).map_err(|e| {
                    format!("invalid validator pattern '{pattern}': {e}")
                })?;
                if re.is_match(value) {
                    Ok(())
                } else {
                    Err(message.clone())
                }
            }
            Validator::Length { min, max, message } => {
                let len = value.chars().count();
                if len >= *min && len <= *max {
                    Ok(())
                } else {
                    Err(message.clone())
                }
            }
            Validator::NumericRange { min, max, message } => match value.trim().parse::<f64>() {
                Ok(n) if n >= *min && n <= *max => Ok(()),
                _ => Err(message.clone()),
            },
            Validator::DateRange { min, max, message } => {
                match chrono::NaiveDate::parse_from_str(value.trim(), "%d/%m/%Y") {
                    Ok(date) => {
                        if min.map(|m| date >= m).unwrap_or(true)
                            && max.map(|m| date <= m).unwrap_or(true)
                        {
                            Ok(())
                        } else {
                            Err(message.clone())
                        }
                    }
                    Err(_) => Err(message.clone()),
                }
            }
        }
    }
}

/// The applicable interpreter (§9): apply normalizers in order, then run
/// validators in order, short-circuiting on the first failure.
pub fn apply_pipeline(
    raw: &str,
    normalizers: &[Normalizer],
    validators: &[Validator],
) -> Result<String, String> {
    let mut value = raw.to_string();
    for normalizer in normalizers {
        value = normalizer.apply(&value);
    }
    for validator in validators {
        validator.check(&value)?;
    }
    Ok(value)
}

/// Per-field-type default normalizer/validator pipelines, used by C6 when it
/// cannot derive anything more specific from LLM extraction, and by C8 as
/// the deterministic fallback behind any LLM-classified "needs review".
pub fn default_pipeline(field_type: super::model::FieldType) -> (Vec<Normalizer>, Vec<Validator>) {
    use super::model::FieldType::*;
    let strip_collapse = vec![Normalizer::Strip, Normalizer::CollapseWhitespace];
    match field_type {
        Text | Textarea | Address | Compound => (strip_collapse, vec![]),
        Email => (
            strip_collapse,
            vec![Validator::Regex {
                pattern: r"^[^\s@]+@[^\s@]+\.[^\s@]+$".to_string(),
                message: "Email không hợp lệ, vui lòng kiểm tra lại.".to_string(),
            }],
        ),
        Tel => (
            strip_collapse,
            vec![Validator::Regex {
                pattern: r"^(0|\+84)[0-9]{9,10}$".to_string(),
                message: "Số điện thoại không hợp lệ.".to_string(),
            }],
        ),
        Date => (
            strip_collapse,
            vec![Validator::DateRange {
                min: None,
                max: None,
                message: "Ngày không hợp lệ, định dạng đúng là dd/mm/yyyy.".to_string(),
            }],
        ),
        Number => (
            strip_collapse,
            vec![Validator::NumericRange {
                min: f64::MIN,
                max: f64::MAX,
                message: "Giá trị phải là một số.".to_string(),
            }],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    #[test]
    fn normalizers_apply_in_order() {
        let result = apply_pipeline(
            "  nguyễn   văn a  ",
            &[
                Normalizer::Strip,
                Normalizer::CollapseWhitespace,
                Normalizer::Title,
            ],
            &[],
        )
        .unwrap();
        assert_eq!(result, "Nguyễn Văn A");
    }

    #[test]
    fn email_validator_rejects_bad_input() {
        let (norm, valid) = default_pipeline(FieldType::Email);
        assert!(apply_pipeline("not-an-email", &norm, &valid).is_err());
        assert!(apply_pipeline("a@b.com", &norm, &valid).is_ok());
    }

    #[test]
    fn date_range_validator_parses_dd_mm_yyyy() {
        let v = Validator::DateRange {
            min: None,
            max: None,
            message: "bad date".to_string(),
        };
        assert!(v.check("15/05/2020").is_ok());
        assert!(v.check("2020-05-15").is_err());
    }
}
