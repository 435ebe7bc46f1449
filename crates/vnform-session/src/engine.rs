//! The ask/confirm/review state machine (§4.5 "State machine"). Mutations
//! are serialized per session id through `SessionLockTable`, then applied
//! via read-modify-write against `SqliteSessionStore`, matching
//! `sg-daemon::server`'s dispatch-by-request pattern against a store-backed
//! session.

use vnform_core::error::{Result, VnFormError};
use vnform_core::field::{apply_pipeline, default_pipeline};
use vnform_core::model::{FormSchema, FormSummary};
use vnform_core::session::{AnswerValue, ClientInfo, FillingSession, Stage};
use vnform_llm::{AnswerClassification, LlmClient};
use vnform_sessionstore::{SessionLockTable, SqliteSessionStore};
use vnform_storage::SqliteMetadataStore;

use crate::protocol::{TurnOutcome, TurnPrompt};
use crate::question::render_cached_or_fallback;

pub struct SessionEngine {
    pub metadata: SqliteMetadataStore,
    pub sessions: SqliteSessionStore,
    pub locks: SessionLockTable,
    pub llm: LlmClient,
}

impl SessionEngine {
    pub fn list_forms(&self) -> Result<Vec<FormSummary>> {
        self.metadata.list_forms()
    }

    pub fn get_form(&self, form_id: &str) -> Result<FormSchema> {
        self.metadata.get_form_schema(form_id)
    }

    /// Creates a new session at `{stage: ask, field_idx: 0}` and renders the
    /// first question (or jumps straight to `review` for a schema with no
    /// fields — an edge case the spec does not rule out).
    pub fn start_session(
        &self,
        session_id: String,
        form_id: String,
        client_info: ClientInfo,
    ) -> Result<(FillingSession, TurnPrompt)> {
        let schema = self.metadata.get_form_schema(&form_id)?;
        let mut session = FillingSession::new(session_id, form_id, client_info);
        if schema.fields.is_empty() {
            session.stage = Stage::Review;
        }
        let prompt = self.render_prompt(&session, &schema)?;
        self.sessions.save(&session)?;
        Ok((session, prompt))
    }

    /// Applies one user turn, serialized per session id (§4.5 "Concurrency
    /// on a single session").
    pub async fn turn(&self, session_id: &str, input: &str) -> Result<TurnOutcome> {
        let _guard = self.locks.acquire(session_id);
        let mut session = self.sessions.load(session_id)?;
        let schema = self.metadata.get_form_schema(&session.form_id)?;
        session.touch();

        let rejection = self.apply_input(&mut session, &schema, input).await?;
        session
            .validate_invariants(schema.fields.len())
            .map_err(VnFormError::ValidationFailed)?;

        let prompt = Some(self.render_prompt(&session, &schema)?);
        self.sessions.save(&session)?;

        Ok(TurnOutcome {
            session_id: session.id.clone(),
            stage: session.stage,
            prompt,
            rejection,
        })
    }

    /// Returns `Some(message)` when the input was rejected (validation
    /// failure, invalid LLM classification, clarification needed) and the
    /// session should re-ask the same field.
    async fn apply_input(
        &self,
        session: &mut FillingSession,
        schema: &FormSchema,
        input: &str,
    ) -> Result<Option<String>> {
        match session.stage {
            Stage::Confirm => {
                let yes = matches!(input.trim().to_lowercase().as_str(), "yes" | "co" | "có" | "y" | "ừ" | "đúng");
                if yes {
                    if let Some(pending) = session.pending.take() {
                        self.commit_answer(session, schema, pending);
                    }
                } else {
                    session.pending = None;
                }
                session.stage = Stage::Ask;
                Ok(None)
            }
            Stage::Review => Ok(None),
            Stage::Ask => self.apply_ask_input(session, schema, input).await,
        }
    }

    async fn apply_ask_input(
        &self,
        session: &mut FillingSession,
        schema: &FormSchema,
        input: &str,
    ) -> Result<Option<String>> {
        let field = match schema.fields.get(session.field_idx) {
            Some(f) => f.clone(),
            None => {
                session.stage = Stage::Review;
                return Ok(None);
            }
        };

        let trimmed = input.trim();
        let is_skip = trimmed.is_empty() || trimmed.eq_ignore_ascii_case("skip") || trimmed.eq_ignore_ascii_case("bỏ qua");
        if is_skip {
            if field.required {
                return Ok(Some(format!("\"{}\" là trường bắt buộc, không thể bỏ qua.", field.label)));
            }
            session.skipped.insert(field.id.clone());
            self.advance(session, schema);
            return Ok(None);
        }

        if field.is_compound() {
            let parsed = self.llm.parse_compound(&field.subfields, trimmed).await;
            if parsed.needs_clarification {
                let missing_labels: Vec<String> = field
                    .subfields
                    .iter()
                    .filter(|s| parsed.missing.contains(&s.id))
                    .map(|s| s.label.clone())
                    .collect();
                return Ok(Some(format!(
                    "Bạn chưa cung cấp: {}. Vui lòng cung cấp đầy đủ thông tin.",
                    missing_labels.join(", ")
                )));
            }
            self.commit_answer(session, schema, AnswerValue::Compound(parsed.parsed));
            return Ok(None);
        }

        let (normalizers, validators) = default_pipeline(field.field_type);
        let normalized = match apply_pipeline(trimmed, &normalizers, &validators) {
            Ok(v) => v,
            Err(message) => return Ok(Some(message)),
        };

        match self.llm.validate_answer(&field, &normalized).await {
            AnswerClassification::Invalid { reason } => Ok(Some(reason)),
            AnswerClassification::NeedsConfirmation { hint } => {
                session.pending = Some(AnswerValue::Scalar(normalized));
                session.stage = Stage::Confirm;
                Ok(hint)
            }
            AnswerClassification::Valid => {
                self.commit_answer(session, schema, AnswerValue::Scalar(normalized));
                Ok(None)
            }
        }
    }

    fn commit_answer(&self, session: &mut FillingSession, schema: &FormSchema, value: AnswerValue) {
        let field_id = schema.fields[session.field_idx].id.clone();
        session.answers.insert(field_id, value);
        session.answer_count += 1;
        self.advance(session, schema);
    }

    fn advance(&self, session: &mut FillingSession, schema: &FormSchema) {
        session.field_idx += 1;
        session.stage = if session.field_idx >= schema.fields.len() { Stage::Review } else { Stage::Ask };
    }

    fn render_prompt(&self, session: &FillingSession, schema: &FormSchema) -> Result<TurnPrompt> {
        Ok(match session.stage {
            Stage::Ask => {
                let field = schema
                    .fields
                    .get(session.field_idx)
                    .ok_or_else(|| VnFormError::NotFound(format!("field index {}", session.field_idx)))?;
                TurnPrompt::Ask {
                    field_id: field.id.clone(),
                    question: render_cached_or_fallback(session, &schema.fields, session.field_idx),
                }
            }
            Stage::Confirm => {
                let field = schema
                    .fields
                    .get(session.field_idx)
                    .ok_or_else(|| VnFormError::NotFound(format!("field index {}", session.field_idx)))?;
                TurnPrompt::Confirm {
                    field_id: field.id.clone(),
                    question: format!("Bạn có chắc muốn lưu giá trị này cho \"{}\"? (có/không)", field.label),
                }
            }
            Stage::Review => TurnPrompt::Review { preview: self.assemble_preview_sync(session, schema) },
        })
    }

    /// §4.5 "Preview": a synchronous `{label}: {value}` join. The LLM-polished
    /// version is assembled separately via `preview` (async) when the caller
    /// can await it.
    fn assemble_preview_sync(&self, session: &FillingSession, schema: &FormSchema) -> String {
        let items = self.preview_items(session, schema);
        vnform_llm::fallback::fallback_preview(&items)
    }

    /// Async, LLM-polished preview (falls back to the same deterministic
    /// join on any C10 failure) — call this from a caller able to await.
    pub async fn preview(&self, session: &FillingSession, schema: &FormSchema) -> String {
        let items = self.preview_items(session, schema);
        self.llm.render_preview(&items).await
    }

    fn preview_items(&self, session: &FillingSession, schema: &FormSchema) -> Vec<(String, String)> {
        schema
            .fields
            .iter()
            .filter_map(|field| {
                session.answers.get(&field.id).map(|value| {
                    let subfield_order: Vec<String> = field.subfields.iter().map(|s| s.id.clone()).collect();
                    (field.label.clone(), value.flatten(&subfield_order))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vnform_core::config::{AppConfig, LogFormat};
    use vnform_core::model::{BlobRef, FieldDescriptor, FieldType};
    use std::collections::BTreeSet;

    fn unconfigured_llm() -> LlmClient {
        LlmClient::from_config(&AppConfig {
            sources: vec![],
            crawl_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
            max_retries: 0,
            object_store_root: String::new(),
            metadata_db_path: String::new(),
            session_ttl: Duration::from_secs(1800),
            llm_endpoint: None,
            llm_api_key: None,
            llm_timeout: Duration::from_secs(1),
            log_level: "info".to_string(),
            log_format: LogFormat::Human,
        })
    }

    fn field(id: &str, label: &str, field_type: FieldType, required: bool) -> FieldDescriptor {
        FieldDescriptor { id: id.to_string(), label: label.to_string(), field_type, required, page: 1, bbox: None, subfields: vec![] }
    }

    fn compound_field() -> FieldDescriptor {
        use vnform_core::model::SubfieldDescriptor;
        FieldDescriptor {
            id: "cmnd".to_string(),
            label: "Số CMND".to_string(),
            field_type: FieldType::Compound,
            required: true,
            page: 1,
            bbox: None,
            subfields: vec![
                SubfieldDescriptor { id: "so".to_string(), label: "Số".to_string(), field_type: FieldType::Text, prompt: String::new() },
                SubfieldDescriptor { id: "cap_ngay".to_string(), label: "ngày cấp".to_string(), field_type: FieldType::Date, prompt: String::new() },
                SubfieldDescriptor { id: "cap_tai".to_string(), label: "nơi cấp".to_string(), field_type: FieldType::Text, prompt: String::new() },
            ],
        }
    }

    fn engine_with_schema(fields: Vec<FieldDescriptor>) -> (SessionEngine, FormSchema) {
        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let schema = FormSchema {
            form_id: "form1".to_string(),
            title: "Mẫu đơn".to_string(),
            aliases: BTreeSet::new(),
            page_count: 1,
            source: BlobRef { bucket: "forms".to_string(), key: "raw/mau-1.pdf".to_string() },
            fields,
            bbox_detection: Default::default(),
            created_at: chrono::Utc::now(),
        };
        metadata.upsert_form_schema(&schema).unwrap();
        let engine = SessionEngine {
            metadata,
            sessions: SqliteSessionStore::open_in_memory(Duration::from_secs(1800)).unwrap(),
            locks: SessionLockTable::new(),
            llm: unconfigured_llm(),
        };
        (engine, schema)
    }

    #[tokio::test]
    async fn happy_path_advances_through_two_text_fields_to_review() {
        let (engine, _schema) = engine_with_schema(vec![
            field("ho_ten", "Họ và tên", FieldType::Text, true),
            field("dia_chi", "Địa chỉ", FieldType::Text, true),
        ]);
        let (session, prompt) = engine.start_session("s1".to_string(), "form1".to_string(), ClientInfo::default()).unwrap();
        assert!(matches!(prompt, TurnPrompt::Ask { .. }));
        assert_eq!(session.stage, Stage::Ask);

        let outcome = engine.turn("s1", "Nguyễn Văn A").await.unwrap();
        assert!(outcome.rejection.is_none());
        assert_eq!(outcome.stage, Stage::Ask);

        let outcome = engine.turn("s1", "123 Lê Lợi").await.unwrap();
        assert!(outcome.rejection.is_none());
        assert_eq!(outcome.stage, Stage::Review);
        assert!(matches!(outcome.prompt, Some(TurnPrompt::Review { .. })));
    }

    #[tokio::test]
    async fn skipping_a_required_field_is_rejected() {
        let (engine, _schema) = engine_with_schema(vec![field("ho_ten", "Họ và tên", FieldType::Text, true)]);
        engine.start_session("s1".to_string(), "form1".to_string(), ClientInfo::default()).unwrap();
        let outcome = engine.turn("s1", "").await.unwrap();
        assert!(outcome.rejection.is_some());
        assert_eq!(outcome.stage, Stage::Ask);
    }

    #[tokio::test]
    async fn skipping_an_optional_field_advances() {
        let (engine, _schema) = engine_with_schema(vec![
            field("ghi_chu", "Ghi chú", FieldType::Text, false),
            field("ho_ten", "Họ và tên", FieldType::Text, true),
        ]);
        engine.start_session("s1".to_string(), "form1".to_string(), ClientInfo::default()).unwrap();
        let outcome = engine.turn("s1", "skip").await.unwrap();
        assert!(outcome.rejection.is_none());
        assert_eq!(outcome.stage, Stage::Ask);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_and_stays_on_same_field() {
        let (engine, _schema) = engine_with_schema(vec![field("email", "Email", FieldType::Email, true)]);
        engine.start_session("s1".to_string(), "form1".to_string(), ClientInfo::default()).unwrap();
        let outcome = engine.turn("s1", "not-an-email").await.unwrap();
        assert!(outcome.rejection.is_some());
        assert_eq!(outcome.stage, Stage::Ask);
    }

    #[tokio::test]
    async fn compound_field_with_full_triple_commits_and_advances() {
        let (engine, _schema) = engine_with_schema(vec![compound_field()]);
        engine.start_session("s1".to_string(), "form1".to_string(), ClientInfo::default()).unwrap();
        let outcome = engine.turn("s1", "001234567890 cấp ngày 15/05/2020 tại Hà Nội").await.unwrap();
        assert!(outcome.rejection.is_none());
        assert_eq!(outcome.stage, Stage::Review);
    }

    #[tokio::test]
    async fn compound_field_missing_subfields_asks_for_clarification() {
        let (engine, _schema) = engine_with_schema(vec![compound_field()]);
        engine.start_session("s1".to_string(), "form1".to_string(), ClientInfo::default()).unwrap();
        let outcome = engine.turn("s1", "001234567890").await.unwrap();
        assert_eq!(
            outcome.rejection,
            Some("Bạn chưa cung cấp: ngày cấp, nơi cấp. Vui lòng cung cấp đầy đủ thông tin.".to_string())
        );
        assert_eq!(outcome.stage, Stage::Ask);
    }

    #[test]
    fn empty_schema_starts_directly_in_review() {
        let (engine, _schema) = engine_with_schema(vec![]);
        let (session, prompt) = engine.start_session("s1".to_string(), "form1".to_string(), ClientInfo::default()).unwrap();
        assert_eq!(session.stage, Stage::Review);
        assert!(matches!(prompt, TurnPrompt::Review { .. }));
    }
}
