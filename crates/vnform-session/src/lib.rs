//! C8: the session engine (§4.5). Wires the state machine, question cache,
//! and the in-process request/response contract callers dispatch through.

pub mod engine;
pub mod protocol;
pub mod question;

pub use engine::SessionEngine;
pub use protocol::{Request, Response, TurnOutcome, TurnPrompt};
