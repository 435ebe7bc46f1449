//! C2: durable records for crawled documents and form schemas (§6).
//!
//! Schema-as-const-string plus `rusqlite::Connection`/`params!` mirrors
//! `sg-core::storage`. Unlike that module this store is purely structural —
//! no embeddings, no FTS — because the core's only read pattern over forms
//! is point lookup by `form_id` (§1 Non-goals: no search index).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;
use vnform_core::error::{Result, VnFormError};
use vnform_core::model::{CrawledDocument, DedupRecord, DocumentFormat, FormSchema, FormSummary};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS crawled_forms (
    url TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    blob_key TEXT NOT NULL,
    bucket TEXT NOT NULL,
    byte_size INTEGER NOT NULL,
    format TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_checked_at TEXT NOT NULL,
    PRIMARY KEY (url, content_hash)
);

CREATE INDEX IF NOT EXISTS idx_crawled_forms_checked
    ON crawled_forms (last_checked_at DESC);

CREATE TABLE IF NOT EXISTS forms (
    form_id TEXT PRIMARY KEY,
    schema_json TEXT NOT NULL,
    title TEXT NOT NULL,
    page_count INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
";

/// A SQLite-backed `MetadataStore`. A single connection guarded by a mutex
/// is sufficient: the core's write volume (one crawl cycle, one worker
/// event at a time per process) never contends meaningfully, matching the
/// teacher's single-`Connection` daemon pattern.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteMetadataStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteMetadataStore {
            conn: Mutex::new(conn),
        })
    }

    // -- dedup (C5's exclusive write path) ---------------------------------

    /// Look up the dedup record for (url, content_hash), if any.
    pub fn find_dedup(&self, url: &str, content_hash: &str) -> Result<Option<DedupRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT url, content_hash, first_seen_at, last_checked_at
             FROM crawled_forms WHERE url = ?1 AND content_hash = ?2",
            params![url, content_hash],
            row_to_dedup,
        )
        .optional()
        .map_err(VnFormError::from)
    }

    /// Insert a brand-new crawled document. Relies on the (url,
    /// content_hash) primary key to reject duplicate-insert races (§8
    /// property 2): the loser sees a `rusqlite::Error` with a constraint
    /// violation, which the crawler treats as "already recorded, nothing to
    /// do" rather than a failure.
    pub fn insert_crawled_document(&self, doc: &CrawledDocument) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO crawled_forms
                (url, content_hash, blob_key, bucket, byte_size, format, first_seen_at, last_checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                doc.url,
                doc.content_hash,
                doc.blob_key,
                doc.bucket,
                doc.byte_size as i64,
                format_tag(doc.format),
                doc.first_seen_at.to_rfc3339(),
                doc.last_checked_at.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(e) => Err(VnFormError::from(e)),
        }
    }

    /// Refresh `last_checked_at` for an already-known (url, hash) pair
    /// (§4.1: "On hit: update last_checked_at").
    pub fn touch_crawled_document(&self, url: &str, content_hash: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE crawled_forms SET last_checked_at = ?1 WHERE url = ?2 AND content_hash = ?3",
            params![now.to_rfc3339(), url, content_hash],
        )?;
        Ok(())
    }

    /// All dedup keys, used to seed the crawler's bloom-filter fast path at
    /// process start.
    pub fn all_dedup_keys(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT url, content_hash FROM crawled_forms")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- forms (C6's exclusive write path) ---------------------------------

    /// Upsert a `FormSchema` keyed by `form_id` (§4.3 invariant: one event
    /// ⇒ at most one upsert; retries of the same event are idempotent).
    pub fn upsert_form_schema(&self, schema: &FormSchema) -> Result<()> {
        let json = serde_json::to_string(schema)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO forms (form_id, schema_json, title, page_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(form_id) DO UPDATE SET
                schema_json = excluded.schema_json,
                title = excluded.title,
                page_count = excluded.page_count",
            params![
                schema.form_id,
                json,
                schema.title,
                schema.page_count,
                schema.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_form_schema(&self, form_id: &str) -> Result<FormSchema> {
        let conn = self.conn.lock().unwrap();
        let json: Option<String> = conn
            .query_row(
                "SELECT schema_json FROM forms WHERE form_id = ?1",
                params![form_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(VnFormError::NotFound(format!("form '{form_id}'"))),
        }
    }

    pub fn list_forms(&self) -> Result<Vec<FormSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT form_id, title, page_count FROM forms ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FormSummary {
                    form_id: row.get(0)?,
                    title: row.get(1)?,
                    page_count: row.get::<_, i64>(2)? as u32,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_dedup(row: &rusqlite::Row<'_>) -> rusqlite::Result<DedupRecord> {
    Ok(DedupRecord {
        url: row.get(0)?,
        content_hash: row.get(1)?,
        first_seen_at: parse_rfc3339(row.get::<_, String>(2)?),
        last_checked_at: parse_rfc3339(row.get::<_, String>(3)?),
    })
}

fn parse_rfc3339(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn format_tag(format: DocumentFormat) -> &'static str {
    match format {
        DocumentFormat::Pdf => "pdf",
        DocumentFormat::Doc => "doc",
        DocumentFormat::Docx => "docx",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnform_core::model::BlobRef;
    use std::collections::BTreeSet;

    fn sample_doc(url: &str, hash: &str) -> CrawledDocument {
        let now = Utc::now();
        CrawledDocument {
            url: url.to_string(),
            content_hash: hash.to_string(),
            blob_key: "raw/mau-1.docx".to_string(),
            bucket: "forms".to_string(),
            byte_size: 10,
            first_seen_at: now,
            last_checked_at: now,
            format: DocumentFormat::Docx,
        }
    }

    #[test]
    fn crawler_idempotence_across_two_cycles() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let doc = sample_doc("https://example/mau.docx", "H");
        assert!(store.insert_crawled_document(&doc).unwrap());
        // Second cycle: same hash, only last_checked_at changes.
        let later = Utc::now() + chrono::Duration::seconds(5);
        store
            .touch_crawled_document(&doc.url, &doc.content_hash, later)
            .unwrap();
        let refreshed = store.find_dedup(&doc.url, &doc.content_hash).unwrap().unwrap();
        assert_eq!(refreshed.last_checked_at, later);

        let all = store.all_dedup_keys().unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn duplicate_insert_is_observable_conflict() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let doc = sample_doc("https://example/mau.docx", "H");
        assert!(store.insert_crawled_document(&doc).unwrap());
        assert!(!store.insert_crawled_document(&doc).unwrap());
        assert_eq!(store.all_dedup_keys().unwrap().len(), 1);
    }

    #[test]
    fn form_schema_upsert_is_idempotent() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let schema = FormSchema {
            form_id: "raw/mau-1.pdf".to_string(),
            title: "Mau don".to_string(),
            aliases: BTreeSet::new(),
            page_count: 1,
            source: BlobRef {
                bucket: "forms".to_string(),
                key: "raw/mau-1.pdf".to_string(),
            },
            fields: vec![],
            bbox_detection: Default::default(),
            created_at: Utc::now(),
        };
        store.upsert_form_schema(&schema).unwrap();
        store.upsert_form_schema(&schema).unwrap();
        assert_eq!(store.list_forms().unwrap().len(), 1);
        let fetched = store.get_form_schema(&schema.form_id).unwrap();
        assert_eq!(fetched.title, schema.title);
    }

    #[test]
    fn unknown_form_is_not_found() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        assert!(matches!(
            store.get_form_schema("nope"),
            Err(VnFormError::NotFound(_))
        ));
    }
}
