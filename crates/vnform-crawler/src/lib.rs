//! C5: periodic fetch of configured document sources, content-hash
//! deduplication, upload to C1, registration in C2 (§4.1).
//!
//! Grounded in poll-loop shape on `sg-daemon::watcher`'s debounced scan; the
//! HTTP fetch itself has no teacher precedent and is pulled in from the
//! `reqwest`-based fetchers among the example pack, confirmed against
//! `original_source/src/crawler.py` for the retry-without-verify policy and
//! the `raw/{name}-{ts}.{ext}` keying convention.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};
use vnform_core::error::Result;
use vnform_core::model::{CrawledDocument, SourceDescriptor};
use vnform_eventbus::{EventBus, ObjectCreatedEvent};
use vnform_storage::{raw_key, FastDedupIndex, ObjectStore, SqliteMetadataStore};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrawlCycleReport {
    pub new: u32,
    pub skipped: u32,
    pub failed: u32,
}

pub struct Crawler<S: ObjectStore> {
    sources: Vec<SourceDescriptor>,
    request_timeout: Duration,
    max_retries: u32,
    verified_client: reqwest::Client,
    insecure_client: reqwest::Client,
    object_store: S,
    metadata: SqliteMetadataStore,
    event_bus: Box<dyn EventBus>,
    dedup: Mutex<FastDedupIndex>,
}

impl<S: ObjectStore> Crawler<S> {
    pub fn new(
        sources: Vec<SourceDescriptor>,
        request_timeout: Duration,
        max_retries: u32,
        object_store: S,
        metadata: SqliteMetadataStore,
        event_bus: Box<dyn EventBus>,
    ) -> Result<Self> {
        let verified_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builder should not fail with static config");
        let insecure_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .expect("reqwest client builder should not fail with static config");

        let seed = metadata.all_dedup_keys()?;
        Ok(Crawler {
            sources,
            request_timeout,
            max_retries,
            verified_client,
            insecure_client,
            object_store,
            metadata,
            event_bus,
            dedup: Mutex::new(FastDedupIndex::seed(seed)),
        })
    }

    /// Run one crawl cycle to completion. Each source is its own atomic
    /// unit: upload-then-insert, or neither (§4.1 contract).
    pub async fn run_cycle(&self) -> CrawlCycleReport {
        let span = tracing::info_span!("crawl_cycle", sources = self.sources.len());
        let _enter = span.enter();

        let mut report = CrawlCycleReport::default();
        for source in &self.sources {
            match self.crawl_one(source).await {
                Ok(CycleOutcome::New) => report.new += 1,
                Ok(CycleOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(url = %source.url, error = %e, "crawl source failed");
                    report.failed += 1;
                }
            }
        }
        info!(new = report.new, skipped = report.skipped, failed = report.failed, "crawl cycle complete");
        report
    }

    async fn crawl_one(&self, source: &SourceDescriptor) -> Result<CycleOutcome> {
        let bytes = self.fetch_with_fallback(&source.url).await?;
        let content_hash = hex_sha256(&bytes);

        {
            let dedup = self.dedup.lock().unwrap();
            if dedup.definitely_new(&source.url, &content_hash) {
                drop(dedup);
                return self.record_new(source, &content_hash, bytes).await;
            }
        }

        match self.metadata.find_dedup(&source.url, &content_hash)? {
            Some(_) => {
                self.metadata
                    .touch_crawled_document(&source.url, &content_hash, Utc::now())?;
                Ok(CycleOutcome::Skipped)
            }
            None => self.record_new(source, &content_hash, bytes).await,
        }
    }

    async fn record_new(
        &self,
        source: &SourceDescriptor,
        content_hash: &str,
        bytes: Vec<u8>,
    ) -> Result<CycleOutcome> {
        let now = Utc::now();
        let key = raw_key(&source.name, now.timestamp(), source.format.extension());
        let byte_size = bytes.len() as u64;

        let bucket = self
            .object_store
            .put(&key, &bytes, source.format.mime_type())?;

        self.metadata.insert_crawled_document(&CrawledDocument {
            url: source.url.clone(),
            content_hash: content_hash.to_string(),
            blob_key: key.clone(),
            bucket: bucket.clone(),
            byte_size,
            first_seen_at: now,
            last_checked_at: now,
            format: source.format,
        })?;

        self.dedup.lock().unwrap().record(&source.url, content_hash);

        self.event_bus.publish(&ObjectCreatedEvent {
            bucket,
            key,
        })?;

        Ok(CycleOutcome::New)
    }

    /// HTTPS GET with verify=true; on certificate failure, retry once with
    /// verification disabled (§4.1 — Vietnamese government sites' certs
    /// expire frequently). Logged at warn with the source URL.
    async fn fetch_with_fallback(&self, url: &str) -> Result<Vec<u8>> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.verified_client.get(url).send().await {
                Ok(resp) => return Ok(resp.error_for_status()?.bytes().await?.to_vec()),
                Err(e) if e.is_connect() && looks_like_cert_error(&e) => {
                    warn!(url, "certificate verification failed, retrying without verification");
                    let resp = self.insecure_client.get(url).send().await?;
                    return Ok(resp.error_for_status()?.bytes().await?.to_vec());
                }
                Err(e) if attempts <= self.max_retries => {
                    warn!(url, attempt = attempts, error = %e, "fetch failed, retrying");
                    tokio::time::sleep(Duration::from_millis(200 * attempts as u64)).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

enum CycleOutcome {
    New,
    Skipped,
}

fn looks_like_cert_error(err: &reqwest::Error) -> bool {
    err.to_string().to_lowercase().contains("certificate")
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_sha256_is_stable_and_lowercase_hex() {
        let digest = hex_sha256(b"hello");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
        assert_eq!(
            digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn cert_error_detection_is_substring_based() {
        assert!(!looks_like_cert_error_from_str("connection refused"));
        assert!(looks_like_cert_error_from_str("certificate has expired"));
    }

    fn looks_like_cert_error_from_str(s: &str) -> bool {
        s.to_lowercase().contains("certificate")
    }
}
