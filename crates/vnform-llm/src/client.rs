//! §4.6 transport: a single `LlmClient` wraps a pooled HTTP client plus the
//! configured endpoint/key/timeout and exposes the six capability methods as
//! inherent methods, each wrapping an OpenAI-chat-completions-shaped HTTP
//! call with a hard timeout and falling back to `fallback::*` on any error.
//! Grounded in shape (external capability, graceful degradation, no
//! retries) on `sg-core::embedder`'s "backend unavailable -> deterministic
//! path" pattern.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use vnform_core::config::AppConfig;
use vnform_core::model::{FieldDescriptor, SubfieldDescriptor};

use crate::fallback;
use crate::types::{AnswerClassification, CompoundParseResult, FieldExtractionResult};

pub struct LlmClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl LlmClient {
    pub fn from_config(config: &AppConfig) -> Self {
        LlmClient {
            http: reqwest::Client::new(),
            endpoint: config.llm_endpoint.clone(),
            api_key: config.llm_api_key.clone(),
            timeout: config.llm_timeout,
        }
    }

    fn configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// One chat-completion round trip. Returns `None` on any failure
    /// (timeout, network, non-2xx, malformed body) — callers always have a
    /// fallback ready and never propagate this as an error.
    async fn complete(&self, system: &str, user: &str) -> Option<String> {
        let endpoint = self.endpoint.as_ref()?;
        let body = json!({
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let mut req = self.http.post(endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let result = tokio::time::timeout(self.timeout, req.send()).await;
        let response = match result {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                debug!(error = %e, "llm request failed");
                return None;
            }
            Err(_) => {
                debug!("llm request timed out");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "llm request returned non-success status");
            return None;
        }

        response
            .json::<ChatCompletion>()
            .await
            .ok()
            .and_then(|c| c.choices.into_iter().next())
            .map(|c| c.message.content)
    }

    pub async fn generate_questions(&self, field: &FieldDescriptor, subject_hint: Option<&str>) -> String {
        if !self.configured() {
            return fallback::fallback_question(field, subject_hint);
        }
        let user = format!(
            "Soạn một câu hỏi ngắn gọn, lịch sự bằng tiếng Việt để hỏi người dùng về trường \"{}\" (loại: {:?}).",
            field.label, field.field_type
        );
        match self.complete("Bạn là trợ lý điền biểu mẫu tiếng Việt.", &user).await {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => fallback::fallback_question(field, subject_hint),
        }
    }

    pub async fn validate_answer(&self, field: &FieldDescriptor, value: &str) -> AnswerClassification {
        if !self.configured() {
            return fallback::fallback_validate_answer();
        }
        let user = format!(
            "Giá trị \"{value}\" cho trường \"{}\" có hợp lệ không? Trả lời JSON {{\"status\":\"valid|needs_confirmation|invalid\",\"hint\":string|null}}.",
            field.label
        );
        match self.complete("Bạn kiểm tra dữ liệu biểu mẫu.", &user).await {
            Some(text) => parse_classification(&text).unwrap_or_else(fallback::fallback_validate_answer),
            None => fallback::fallback_validate_answer(),
        }
    }

    pub async fn parse_compound(&self, subfields: &[SubfieldDescriptor], raw: &str) -> CompoundParseResult {
        if !self.configured() {
            return fallback::fallback_parse_compound(subfields, raw);
        }
        let ids: Vec<&str> = subfields.iter().map(|s| s.id.as_str()).collect();
        let user = format!(
            "Tách câu trả lời \"{raw}\" thành các trường {ids:?}. Trả lời JSON {{\"parsed\":{{}},\"missing\":[],\"needs_clarification\":bool}}."
        );
        match self.complete("Bạn tách dữ liệu biểu mẫu tiếng Việt.", &user).await {
            Some(text) => serde_json::from_str::<CompoundParseResult>(&text)
                .unwrap_or_else(|_| fallback::fallback_parse_compound(subfields, raw)),
            None => fallback::fallback_parse_compound(subfields, raw),
        }
    }

    pub async fn extract_fields(&self, ocr_text: &str) -> FieldExtractionResult {
        if !self.configured() {
            return fallback::fallback_extract_fields(ocr_text);
        }
        let user = format!(
            "Từ văn bản OCR sau, liệt kê các trường biểu mẫu dạng JSON {{\"fields\":[{{\"label\":string,\"type\":\"text|email|tel|date|number|textarea\"}}]}}:\n{ocr_text}"
        );
        match self.complete("Bạn trích xuất trường biểu mẫu tiếng Việt.", &user).await {
            Some(text) => serde_json::from_str::<FieldExtractionResult>(&text)
                .unwrap_or_else(|_| fallback::fallback_extract_fields(ocr_text)),
            None => fallback::fallback_extract_fields(ocr_text),
        }
    }

    pub async fn synthesize_title(&self, ocr_text: &str, has_diacritics: bool) -> String {
        if !self.configured() || !has_diacritics {
            return fallback::fallback_title(ocr_text);
        }
        let user = format!("Đặt tiêu đề ngắn gọn (tối đa 100 ký tự) cho biểu mẫu sau:\n{ocr_text}");
        match self.complete("Bạn đặt tiêu đề biểu mẫu tiếng Việt.", &user).await {
            Some(text) if !text.trim().is_empty() => text.trim().chars().take(100).collect(),
            _ => fallback::fallback_title(ocr_text),
        }
    }

    pub async fn render_preview(&self, items: &[(String, String)]) -> String {
        if !self.configured() {
            return fallback::fallback_preview(items);
        }
        let joined = fallback::fallback_preview(items);
        let user = format!("Viết lại thông tin sau thành đoạn văn xuôi mạch lạc để người dùng xác nhận:\n{joined}");
        match self.complete("Bạn tóm tắt thông tin biểu mẫu tiếng Việt.", &user).await {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => joined,
        }
    }
}

fn parse_classification(text: &str) -> Option<AnswerClassification> {
    #[derive(Deserialize)]
    struct Wire {
        status: String,
        hint: Option<String>,
    }
    let wire: Wire = serde_json::from_str(text).ok()?;
    Some(match wire.status.as_str() {
        "invalid" => AnswerClassification::Invalid {
            reason: wire.hint.unwrap_or_default(),
        },
        "needs_confirmation" => AnswerClassification::NeedsConfirmation { hint: wire.hint },
        _ => AnswerClassification::Valid,
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    #[allow(dead_code)]
    role: String,
    content: String,
}
