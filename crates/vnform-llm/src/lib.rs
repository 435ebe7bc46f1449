//! C10: narrow LLM capability contract with a deterministic fallback behind
//! every method (§4.6).

pub mod client;
pub mod fallback;
pub mod types;

pub use client::LlmClient;
pub use types::{AnswerClassification, CompoundParseResult, ExtractedField, FieldExtractionResult};
