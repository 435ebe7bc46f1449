//! Wire and result types for the six C10 capability methods (§4.6).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vnform_core::model::FieldType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldExtractionResult {
    pub fields: Vec<ExtractedField>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerClassification {
    Valid,
    NeedsConfirmation { hint: Option<String> },
    Invalid { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompoundParseResult {
    pub parsed: BTreeMap<String, String>,
    pub missing: Vec<String>,
    pub needs_clarification: bool,
}
