//! Data model for crawled documents and form schemas (§3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Supported source document formats. A fourth, implicit `Image`/`Unknown`
/// case only arises post-hoc from magic-byte sniffing in C6 and is not part
/// of `SourceDescriptor` (a configured source always declares its format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Doc,
    Docx,
}

impl DocumentFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Docx => "docx",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Doc => "application/msword",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// A configured crawl target (§3). Immutable for the lifetime of a run —
/// built once from `AppConfig` and never mutated by C5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub url: String,
    pub name: String,
    pub format: DocumentFormat,
    pub source_label: String,
}

/// A document C5 has fetched and stored at least once. Identity is
/// (`url`, `content_hash`); `last_checked_at` is the only field mutated
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledDocument {
    pub url: String,
    pub content_hash: String,
    pub blob_key: String,
    pub bucket: String,
    pub byte_size: u64,
    pub first_seen_at: chrono::DateTime<chrono::Utc>,
    pub last_checked_at: chrono::DateTime<chrono::Utc>,
    pub format: DocumentFormat,
}

/// The (url, content_hash) dedup key tracked by C2 on C5's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupRecord {
    pub url: String,
    pub content_hash: String,
    pub first_seen_at: chrono::DateTime<chrono::Utc>,
    pub last_checked_at: chrono::DateTime<chrono::Utc>,
}

/// Axis-aligned rectangle in image-pixel coordinates, top-left origin.
/// Never mixed with PDF-point coordinates (§9 Design Notes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub page: u32,
}

/// How a `FieldPosition` was produced — surfaced so C9 and tests can reason
/// about provenance without re-running the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    Layout,
    Keyword,
}

/// One labeled input slot emitted by C7 (§4.4 Outputs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPosition {
    pub field_id: String,
    pub label: String,
    pub bbox: BBox,
    pub confidence: f32,
    pub detection_type: DetectionType,
}

/// Up to five observed font names plus the chosen primary, per §4.4 "Font
/// metadata".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontInfo {
    pub primary_font: String,
    pub default_size: f32,
    pub observed_fonts: Vec<String>,
}

impl Default for FontInfo {
    fn default() -> Self {
        FontInfo {
            primary_font: "Helvetica".to_string(),
            default_size: 12.0,
            observed_fonts: Vec::new(),
        }
    }
}

/// The geometry side-channel attached to a `FormSchema` (§3 invariant: set
/// iff at least one field has a bbox).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BboxDetection {
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub font_info: FontInfo,
    pub field_positions: Vec<FieldPosition>,
    /// Set when C7 raised an exception (§4.4 Failure semantics); the schema
    /// is still persisted with an empty `field_positions`.
    pub error: Option<String>,
}

/// Scalar field types. `Compound` is special-cased: it carries `subfields`
/// instead of validators/normalizers (see `field::FieldKind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Email,
    Tel,
    Date,
    Number,
    Textarea,
    Address,
    Compound,
}

/// One subfield of a compound field (§3 FieldDescriptor.subfields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubfieldDescriptor {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub prompt: String,
}

/// One field of a `FormSchema`, order significant (§3 FieldDescriptor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub page: u32,
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub subfields: Vec<SubfieldDescriptor>,
}

impl FieldDescriptor {
    pub fn is_compound(&self) -> bool {
        self.field_type == FieldType::Compound
    }

    /// §3 invariant: compound fields have ≥2 subfields with unique ids;
    /// non-compound fields have none.
    pub fn validate_shape(&self) -> Result<(), String> {
        if self.is_compound() {
            if self.subfields.len() < 2 {
                return Err(format!(
                    "compound field '{}' must have >= 2 subfields",
                    self.id
                ));
            }
            let mut seen = BTreeSet::new();
            for sub in &self.subfields {
                if !seen.insert(sub.id.as_str()) {
                    return Err(format!(
                        "compound field '{}' has duplicate subfield id '{}'",
                        self.id, sub.id
                    ));
                }
            }
        } else if !self.subfields.is_empty() {
            return Err(format!(
                "non-compound field '{}' must not declare subfields",
                self.id
            ));
        }
        Ok(())
    }
}

/// The source PDF location backing a `FormSchema` (§3: `source` = {bucket,key}).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRef {
    pub bucket: String,
    pub key: String,
}

/// The typed, ordered field schema for one form document (§3 FormSchema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSchema {
    pub form_id: String,
    pub title: String,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    pub page_count: u32,
    pub source: BlobRef,
    pub fields: Vec<FieldDescriptor>,
    pub bbox_detection: BboxDetection,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl FormSchema {
    /// §3 invariant: if any field has a bbox, image dimensions must be set.
    pub fn validate_invariants(&self) -> Result<(), String> {
        let any_bbox = self.fields.iter().any(|f| f.bbox.is_some());
        if any_bbox
            && (self.bbox_detection.image_width.is_none()
                || self.bbox_detection.image_height.is_none())
        {
            return Err(format!(
                "form '{}' has a field bbox but no image dimensions recorded",
                self.form_id
            ));
        }
        for field in &self.fields {
            field.validate_shape()?;
        }
        Ok(())
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == field_id)
    }
}

/// Summary row returned by the session engine's `list_forms` (§4.5
/// "Listing available forms"). A metadata-store read, not a search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSummary {
    pub form_id: String,
    pub title: String,
    pub page_count: u32,
}

impl From<&FormSchema> for FormSummary {
    fn from(schema: &FormSchema) -> Self {
        FormSummary {
            form_id: schema.form_id.clone(),
            title: schema.title.clone(),
            page_count: schema.page_count,
        }
    }
}
