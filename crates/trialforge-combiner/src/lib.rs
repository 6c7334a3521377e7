//! Assembles completed module results into one unified protocol document
//! (spec §4.I): section placement, source-document fingerprinting,
//! extraction metadata, page-offset correction, a cross-section
//! provenance summary, and an optional agent-documentation catalog.

pub mod agent_docs;
pub mod combine;
pub mod error;
pub mod metadata;
pub mod provenance_summary;
pub mod sections;
pub mod source_document;

pub use combine::{combine, CombineInput, SectionEntry, UnifiedDocument};
pub use error::CombinerError;
pub use source_document::read_source_bytes;
