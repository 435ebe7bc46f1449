//! C4: one fully-serialized session blob per turn, TTL-bound with
//! refresh-on-read (§9 Design Notes: "every turn is a full read-modify-write").
//! Grounded on `sg-daemon::throttle`'s TTL bookkeeping and
//! `sg-daemon::server`'s per-client keyed state.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;
use std::time::Duration;
use vnform_core::error::{Result, VnFormError};
use vnform_core::session::FillingSession;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    blob_json TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
";

pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    ttl: Duration,
}

impl SqliteSessionStore {
    pub fn open(path: &str, ttl: Duration) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteSessionStore {
            conn: Mutex::new(conn),
            ttl,
        })
    }

    pub fn open_in_memory(ttl: Duration) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteSessionStore {
            conn: Mutex::new(conn),
            ttl,
        })
    }

    /// Load a session, refreshing its expiry as a side effect of the read
    /// (refresh-on-read). Returns `NotFound` once the TTL has lapsed, and
    /// opportunistically deletes the stale row.
    pub fn load(&self, id: &str) -> Result<FillingSession> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT blob_json, expires_at FROM sessions WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((blob_json, expires_at)) = row else {
            return Err(VnFormError::NotFound(format!("session '{id}'")));
        };

        let expires_at = chrono::DateTime::parse_from_rfc3339(&expires_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        if expires_at <= Utc::now() {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            return Err(VnFormError::NotFound(format!("session '{id}' expired")));
        }

        let new_expiry = Utc::now() + chrono::Duration::from_std(self.ttl).unwrap_or_default();
        conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE id = ?2",
            params![new_expiry.to_rfc3339(), id],
        )?;

        Ok(serde_json::from_str(&blob_json)?)
    }

    /// Full read-modify-write: persist the session blob, resetting its TTL.
    pub fn save(&self, session: &FillingSession) -> Result<()> {
        let blob_json = serde_json::to_string(session)?;
        let expires_at = Utc::now() + chrono::Duration::from_std(self.ttl).unwrap_or_default();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, blob_json, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET blob_json = excluded.blob_json, expires_at = excluded.expires_at",
            params![session.id, blob_json, expires_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Sweep past-TTL rows. Not required for correctness (reads already
    /// enforce expiry) but keeps the table from growing unbounded between
    /// reads of abandoned sessions.
    pub fn sweep_expired(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnform_core::session::{ClientInfo, Stage};

    fn sample_session(id: &str) -> FillingSession {
        FillingSession::new(id.to_string(), "raw/mau-1.pdf".to_string(), ClientInfo::default())
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = SqliteSessionStore::open_in_memory(Duration::from_secs(3600)).unwrap();
        let session = sample_session("s1");
        store.save(&session).unwrap();
        let loaded = store.load("s1").unwrap();
        assert_eq!(loaded.id, "s1");
        assert_eq!(loaded.stage, Stage::Ask);
    }

    #[test]
    fn missing_session_is_not_found() {
        let store = SqliteSessionStore::open_in_memory(Duration::from_secs(3600)).unwrap();
        assert!(matches!(store.load("nope"), Err(VnFormError::NotFound(_))));
    }

    #[test]
    fn expired_session_is_not_found_and_removed() {
        let store = SqliteSessionStore::open_in_memory(Duration::from_millis(0)).unwrap();
        let session = sample_session("s1");
        store.save(&session).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(store.load("s1"), Err(VnFormError::NotFound(_))));
        assert_eq!(store.sweep_expired().unwrap(), 0); // already removed by load
    }

    #[test]
    fn save_overwrites_existing_row() {
        let store = SqliteSessionStore::open_in_memory(Duration::from_secs(3600)).unwrap();
        let mut session = sample_session("s1");
        store.save(&session).unwrap();
        session
            .answers
            .insert("ho_ten".to_string(), vnform_core::session::AnswerValue::Scalar("Nguyen Van A".to_string()));
        store.save(&session).unwrap();
        let loaded = store.load("s1").unwrap();
        assert_eq!(loaded.answers.len(), 1);
    }
}
