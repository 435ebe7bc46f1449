//! Shared data model, validators/normalizers interpreter, session state, and
//! configuration for the Vietnamese form-filling pipeline core.
//!
//! See `SPEC_FULL.md` at the workspace root for the full specification this
//! crate (and its sibling crates) implement.

pub mod config;
pub mod error;
pub mod field;
pub mod model;
pub mod session;

pub use error::{Result, VnFormError};
