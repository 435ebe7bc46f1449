//! Shared error taxonomy (§7, §4.10).
//!
//! `VnFormError` is the library-level error enum every core crate returns.
//! Binaries wrap it in `anyhow::Context` at their outermost boundary; the
//! library itself never depends on `anyhow`.

use thiserror::Error;

/// The error kinds surfaced by the core, per SPEC_FULL.md §7.
#[derive(Debug, Error)]
pub enum VnFormError {
    /// A form or session id is unknown. Surfaced to the caller as-is.
    #[error("not found: {0}")]
    NotFound(String),

    /// A normalizer or validator rejected the input. Not an error for the
    /// caller — callers should render this as a regular turn outcome.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// A remote capability (LLM, object store, event bus) did not respond.
    /// C10 callers never see this variant directly — they degrade silently.
    #[error("external dependency unavailable: {0}")]
    ExternalUnavailable(String),

    /// Format conversion (e.g. DOCX → PDF via the headless converter)
    /// failed or timed out.
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// The field-position detector raised an exception. Never fatal: the
    /// worker still persists a schema with empty `field_positions`.
    #[error("detector failed: {0}")]
    DetectorFailed(String),

    /// Metadata/session store I/O failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Event bus I/O failure.
    #[error("event bus error: {0}")]
    EventBus(String),

    /// HTTP fetch failure (crawler source, LLM provider).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Generic filesystem/network I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON crossing a store or wire boundary.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VnFormError>;
