//! `FillingSession` state (§3) and the session stage machine (§4.5).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The discrete stage of a filling session (glossary: "Session stage").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ask,
    Confirm,
    Review,
}

/// An answer value: a scalar for regular fields, or a subfield map for
/// compound fields (§3: "either a scalar string or ... a mapping").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Scalar(String),
    Compound(BTreeMap<String, String>),
}

impl AnswerValue {
    /// Flatten a compound value in subfield declaration order, joined by
    /// ", " (§4.7 "Compound-field values are flattened ...").
    pub fn flatten(&self, subfield_order: &[String]) -> String {
        match self {
            AnswerValue::Scalar(s) => s.clone(),
            AnswerValue::Compound(map) => subfield_order
                .iter()
                .filter_map(|id| map.get(id))
                .filter(|v| !v.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// A rendered question prompt cached per-field, so C8 does not re-derive the
/// same phrasing on every turn (§4.5 "Question rendering" + §9
/// "process-wide mutable state" exception for the question cache).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub field_id: String,
    pub prompt: String,
    /// True once an LLM-phrased version has replaced the deterministic
    /// fallback; the engine only ever upgrades a cache entry, never
    /// downgrades it.
    pub llm_enriched: bool,
}

/// Client metadata attached to a session at creation time (free-form, not
/// interpreted by the core — e.g. channel/locale hints for the HTTP shell).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientInfo {
    pub channel: Option<String>,
    pub locale: Option<String>,
}

/// Per-user filling session state (§3 FillingSession). The entire struct is
/// the unit of persistence in C4 (§9 Design Notes: "represent the entire
/// session as one serialized blob").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillingSession {
    pub id: String,
    pub form_id: String,
    pub answers: BTreeMap<String, AnswerValue>,
    pub field_idx: usize,
    pub questions: Vec<QuestionRecord>,
    pub skipped: BTreeSet<String>,
    pub pending: Option<AnswerValue>,
    pub stage: Stage,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_active_at: chrono::DateTime<chrono::Utc>,
    pub answer_count: u32,
    pub client_info: ClientInfo,
}

impl FillingSession {
    pub fn new(id: String, form_id: String, client_info: ClientInfo) -> Self {
        let now = chrono::Utc::now();
        FillingSession {
            id,
            form_id,
            answers: BTreeMap::new(),
            field_idx: 0,
            questions: Vec::new(),
            skipped: BTreeSet::new(),
            pending: None,
            stage: Stage::Ask,
            created_at: now,
            last_active_at: now,
            answer_count: 0,
            client_info,
        }
    }

    pub fn touch(&mut self) {
        self.last_active_at = chrono::Utc::now();
    }

    /// §3 invariants, checked by tests and defensively by the engine after
    /// every transition.
    pub fn validate_invariants(&self, field_count: usize) -> Result<(), String> {
        if self.field_idx > field_count {
            return Err(format!(
                "field_idx {} out of bounds (len {})",
                self.field_idx, field_count
            ));
        }
        if self.stage == Stage::Confirm && self.pending.is_none() {
            return Err("stage=confirm requires pending to be set".to_string());
        }
        Ok(())
    }

    pub fn cached_question(&self, field_id: &str) -> Option<&QuestionRecord> {
        self.questions.iter().find(|q| q.field_id == field_id)
    }

    pub fn upsert_question(&mut self, field_id: &str, prompt: String, llm_enriched: bool) {
        if let Some(existing) = self.questions.iter_mut().find(|q| q.field_id == field_id) {
            // Never downgrade an LLM-enriched entry with a fallback one.
            if llm_enriched || !existing.llm_enriched {
                existing.prompt = prompt;
                existing.llm_enriched = llm_enriched;
            }
        } else {
            self.questions.push(QuestionRecord {
                field_id: field_id.to_string(),
                prompt,
                llm_enriched,
            });
        }
    }
}
