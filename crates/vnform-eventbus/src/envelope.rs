//! Event payload shapes (§4.2): either a bare `{bucket, key}` envelope or a
//! native object-storage notification, of which only the first `Records[*]`
//! entry is taken.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCreatedEvent {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEnvelope {
    Bare(ObjectCreatedEvent),
    S3Style { #[serde(rename = "Records")] records: Vec<S3Record> },
}

#[derive(Debug, Deserialize)]
struct S3Record {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
}

/// Parse either envelope shape, taking the first record when a
/// `Records[*].s3`-style payload is given.
pub fn parse_envelope(raw: &str) -> Result<ObjectCreatedEvent, serde_json::Error> {
    match serde_json::from_str::<RawEnvelope>(raw)? {
        RawEnvelope::Bare(event) => Ok(event),
        RawEnvelope::S3Style { records } => match records.into_iter().next() {
            Some(record) => Ok(ObjectCreatedEvent {
                bucket: record.s3.bucket.name,
                key: record.s3.object.key,
            }),
            None => Ok(ObjectCreatedEvent {
                bucket: String::new(),
                key: String::new(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_envelope() {
        let event = parse_envelope(r#"{"bucket":"forms","key":"raw/mau-1.pdf"}"#).unwrap();
        assert_eq!(event.bucket, "forms");
        assert_eq!(event.key, "raw/mau-1.pdf");
    }

    #[test]
    fn parses_s3_style_envelope_taking_first_record() {
        let raw = r#"{"Records":[
            {"s3":{"bucket":{"name":"forms"},"object":{"key":"raw/mau-1.pdf"}}},
            {"s3":{"bucket":{"name":"forms"},"object":{"key":"raw/mau-2.pdf"}}}
        ]}"#;
        let event = parse_envelope(raw).unwrap();
        assert_eq!(event.key, "raw/mau-1.pdf");
    }
}
