//! SQLite-backed at-least-once queue with visibility timeout (§9.1 Open
//! Question resolution): the same `EventBus` trait could be backed by SQS
//! or NATS without changing C6. Grounded in shape on `sg-daemon`'s debounced
//! event handling in `watcher.rs`, schema-as-const-string per `sg-core`.

use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::Mutex;
use vnform_core::error::{Result, VnFormError};

use crate::envelope::ObjectCreatedEvent;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS event_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bucket TEXT NOT NULL,
    key TEXT NOT NULL,
    enqueued_at TEXT NOT NULL,
    visible_at TEXT NOT NULL,
    delivery_attempts INTEGER NOT NULL DEFAULT 0,
    acked INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_event_queue_pending
    ON event_queue (acked, visible_at);
";

pub trait EventBus: Send + Sync {
    fn publish(&self, event: &ObjectCreatedEvent) -> Result<()>;
    /// Claim up to one ready event, hiding it from other consumers until
    /// `visibility_timeout` elapses. Returns `None` when the queue is empty
    /// or every pending event is currently hidden.
    fn poll(&self, visibility_timeout: std::time::Duration) -> Result<Option<DeliveredEvent>>;
    /// Mark a delivered event permanently handled.
    fn ack(&self, delivery_id: i64) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct DeliveredEvent {
    pub delivery_id: i64,
    pub event: ObjectCreatedEvent,
    pub delivery_attempts: u32,
}

pub struct SqliteEventQueue {
    conn: Mutex<Connection>,
}

impl SqliteEventQueue {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteEventQueue {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteEventQueue {
            conn: Mutex::new(conn),
        })
    }
}

impl EventBus for SqliteEventQueue {
    fn publish(&self, event: &ObjectCreatedEvent) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO event_queue (bucket, key, enqueued_at, visible_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![event.bucket, event.key, now],
        )?;
        Ok(())
    }

    fn poll(&self, visibility_timeout: std::time::Duration) -> Result<Option<DeliveredEvent>> {
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, bucket, key, delivery_attempts FROM event_queue
                 WHERE acked = 0 AND visible_at <= ?1
                 ORDER BY id ASC LIMIT 1",
                params![now.to_rfc3339()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .map(Some)
            .or_else(|e| {
                if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
                    Ok(None)
                } else {
                    Err(VnFormError::from(e))
                }
            })?;

        let Some((id, bucket, key, attempts)) = row else {
            return Ok(None);
        };

        let hidden_until = now + chrono::Duration::from_std(visibility_timeout).unwrap_or_default();
        conn.execute(
            "UPDATE event_queue SET visible_at = ?1, delivery_attempts = delivery_attempts + 1
             WHERE id = ?2",
            params![hidden_until.to_rfc3339(), id],
        )?;

        Ok(Some(DeliveredEvent {
            delivery_id: id,
            event: ObjectCreatedEvent { bucket, key },
            delivery_attempts: (attempts + 1) as u32,
        }))
    }

    fn ack(&self, delivery_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE event_queue SET acked = 1 WHERE id = ?1",
            params![delivery_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample() -> ObjectCreatedEvent {
        ObjectCreatedEvent {
            bucket: "forms".to_string(),
            key: "raw/mau-1.pdf".to_string(),
        }
    }

    #[test]
    fn publish_then_poll_delivers_once_and_hides() {
        let queue = SqliteEventQueue::open_in_memory().unwrap();
        queue.publish(&sample()).unwrap();

        let delivered = queue.poll(Duration::from_secs(30)).unwrap().unwrap();
        assert_eq!(delivered.event.key, "raw/mau-1.pdf");
        assert_eq!(delivered.delivery_attempts, 1);

        // Still hidden: second poll finds nothing ready.
        assert!(queue.poll(Duration::from_secs(30)).unwrap().is_none());
    }

    #[test]
    fn ack_prevents_redelivery() {
        let queue = SqliteEventQueue::open_in_memory().unwrap();
        queue.publish(&sample()).unwrap();
        let delivered = queue.poll(Duration::from_millis(0)).unwrap().unwrap();
        queue.ack(delivered.delivery_id).unwrap();
        assert!(queue.poll(Duration::from_secs(0)).unwrap().is_none());
    }

    #[test]
    fn unacked_event_becomes_redeliverable_after_timeout_elapses() {
        let queue = SqliteEventQueue::open_in_memory().unwrap();
        queue.publish(&sample()).unwrap();
        let first = queue.poll(Duration::from_millis(0)).unwrap().unwrap();
        let second = queue.poll(Duration::from_millis(0)).unwrap().unwrap();
        assert_eq!(first.event, second.event);
        assert_eq!(second.delivery_attempts, 2);
    }
}
