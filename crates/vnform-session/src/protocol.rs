//! The in-process request/response contract for C8 (§4.5). This is not an
//! HTTP wire format (the real HTTP shell is out of scope, §1 Non-goals) —
//! it is the typed boundary a caller (the CLI, or eventually an HTTP
//! handler) dispatches through, shaped the way `sg-daemon::protocol`
//! shapes its own client/daemon request enum.

use serde::{Deserialize, Serialize};
use vnform_core::model::{FormSchema, FormSummary};
use vnform_core::session::Stage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    ListForms,
    GetForm { form_id: String },
    StartSession { form_id: String, client_channel: Option<String>, client_locale: Option<String> },
    Turn { session_id: String, input: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Forms(Vec<FormSummary>),
    Form(FormSchema),
    SessionStarted { session_id: String, prompt: TurnPrompt },
    Turn(TurnOutcome),
    NotFound(String),
    Error(String),
}

/// What the engine wants to say to the user after a turn: either the next
/// question, a yes/no confirmation, or the assembled review preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TurnPrompt {
    Ask { field_id: String, question: String },
    Confirm { field_id: String, question: String },
    Review { preview: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub stage: Stage,
    pub prompt: Option<TurnPrompt>,
    /// Set when the turn's input failed validation or was rejected by C10;
    /// the caller re-renders `prompt` together with this message.
    pub rejection: Option<String>,
}
