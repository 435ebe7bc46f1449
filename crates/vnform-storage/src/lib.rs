//! C1 object store and C2 metadata store adapters, plus the advisory bloom
//! dedup pre-check C5 layers in front of the authoritative lookup.

pub mod dedup;
pub mod metadata_store;
pub mod object_store;

pub use dedup::FastDedupIndex;
pub use metadata_store::SqliteMetadataStore;
pub use object_store::{converted_pdf_key, raw_key, LocalObjectStore, ObjectStore};
