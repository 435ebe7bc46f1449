//! C6: the form-understanding worker (§4.3). Consumes an `ObjectCreatedEvent`,
//! classifies and (if needed) converts the source document, rasterizes page
//! 1, runs the C7 detector and OCR, extracts a typed field list, and upserts
//! the resulting `FormSchema` into C2.

pub mod classify;
pub mod convert;
pub mod extract;
pub mod ocr_text;
pub mod pipeline;
pub mod rasterize;

pub use classify::{sniff, SniffedFormat};
pub use convert::convert_to_pdf;
pub use extract::{best_bbox_match, detect_compound_fields, fallback_extract_simple_fields, CompoundFieldSpec};
pub use ocr_text::extract_plain_text;
pub use pipeline::FormWorker;
pub use rasterize::{page_media_box, rasterize_first_page};
