//! C3: at-least-once delivery of object-created events from C1 to C6,
//! with SQLite-backed visibility-timeout semantics (§4.2, §9.1).

pub mod envelope;
pub mod queue;

pub use envelope::{parse_envelope, ObjectCreatedEvent};
pub use queue::{DeliveredEvent, EventBus, SqliteEventQueue};
