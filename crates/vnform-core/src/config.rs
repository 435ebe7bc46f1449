//! Typed, environment-variable-driven configuration (§4.8 / A1).
//!
//! Mirrors the original prototype's `settings.py`: every value has a
//! documented default, a missing variable is never an error, a malformed
//! *set* variable is. Secrets (the LLM API key) are never logged.

use crate::model::{DocumentFormat, SourceDescriptor};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sources: Vec<SourceDescriptor>,
    pub crawl_interval: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,

    pub object_store_root: String,
    pub metadata_db_path: String,
    pub session_ttl: Duration,

    pub llm_endpoint: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_timeout: Duration,

    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is set but not a valid {1}: {2}")]
    Malformed(String, &'static str, String),
}

/// Default Vietnamese form-site crawl targets, matching the original
/// prototype's `CRAWLER_TARGETS` default.
const DEFAULT_TARGETS: &str = "https://thuvienphapluat.vn,https://luatsubaoho.com";

impl AppConfig {
    /// Load from process environment, applying documented defaults for
    /// anything unset. Never reads a `.env` file itself (that's a thin
    /// convenience the CLI binary may layer on via `dotenvy` before calling
    /// this); the library only ever reads `std::env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let sources = parse_sources(&env_or("CRAWLER_TARGETS", DEFAULT_TARGETS))?;

        Ok(AppConfig {
            sources,
            crawl_interval: Duration::from_secs(env_parse("CRAWL_INTERVAL_SECS", 3600)?),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT", 60)?),
            max_retries: env_parse("MAX_RETRIES", 3)?,

            object_store_root: env_or("OBJECT_STORE_ROOT", "./vnform-data/objects"),
            metadata_db_path: env_or("METADATA_DB_PATH", "./vnform-data/metadata.sqlite3"),
            session_ttl: Duration::from_secs(env_parse("SESSION_TTL_SECS", 1800)?),

            llm_endpoint: env::var("LLM_ENDPOINT").ok(),
            llm_api_key: env::var("LLM_API_KEY").ok(),
            llm_timeout: Duration::from_secs(env_parse("LLM_TIMEOUT_SECS", 10)?),

            log_level: env_or("LOG_LEVEL", "info"),
            log_format: match env_or("LOG_FORMAT", "human").as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Human,
            },
        })
    }

    /// Whether an LLM capability can plausibly be constructed (does not
    /// guarantee reachability — §4.6 "never blocks the critical path").
    pub fn llm_configured(&self) -> bool {
        self.llm_endpoint.is_some()
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::Malformed(key.to_string(), std::any::type_name::<T>(), raw)),
    }
}

/// Parse `CRAWLER_TARGETS` (a comma list of URLs) into `SourceDescriptor`s,
/// deriving `name` from the URL's last path segment (stem) and `format`
/// from its extension, defaulting to `Pdf` when absent/unrecognized — the
/// worker's magic-byte classification (§4.3) is authoritative regardless.
fn parse_sources(raw: &str) -> Result<Vec<SourceDescriptor>, ConfigError> {
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|url| {
            let stem = url
                .rsplit('/')
                .next()
                .unwrap_or(url)
                .split('.')
                .next()
                .unwrap_or(url)
                .to_string();
            let format = url
                .rsplit('.')
                .next()
                .and_then(|ext| match ext.to_lowercase().as_str() {
                    "pdf" => Some(DocumentFormat::Pdf),
                    "doc" => Some(DocumentFormat::Doc),
                    "docx" => Some(DocumentFormat::Docx),
                    _ => None,
                })
                .unwrap_or(DocumentFormat::Pdf);
            SourceDescriptor {
                url: url.to_string(),
                name: if stem.is_empty() {
                    "source".to_string()
                } else {
                    stem
                },
                format,
                source_label: url.to_string(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_parse_into_sources() {
        let sources = parse_sources(DEFAULT_TARGETS).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "thuvienphapluat");
    }

    #[test]
    fn env_parse_rejects_malformed_set_value() {
        std::env::set_var("VNFORM_TEST_NUM", "not-a-number");
        let err = env_parse::<u64>("VNFORM_TEST_NUM", 42).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(..)));
        std::env::remove_var("VNFORM_TEST_NUM");
    }

    #[test]
    fn env_parse_defaults_when_unset() {
        std::env::remove_var("VNFORM_TEST_UNSET");
        assert_eq!(env_parse("VNFORM_TEST_UNSET", 7u64).unwrap(), 7);
    }
}
