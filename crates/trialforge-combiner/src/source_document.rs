//! Source-document metadata block, ported from
//! `usdm_combiner.py::_build_source_document`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CombinerError;

/// Read the source PDF's bytes from disk, mirroring
/// `usdm_combiner.py::_build_source_document`'s own file open (the Rust
/// orchestrator elsewhere may already hold the bytes in memory and skip
/// this helper entirely).
pub fn read_source_bytes(path: &std::path::Path) -> Result<Vec<u8>, CombinerError> {
    std::fs::read(path).map_err(|source| CombinerError::SourceRead {
        path: path.display().to_string(),
        source,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceDocumentMeta {
    pub document_id: String,
    pub filename: String,
    pub sha256_hash: String,
    pub byte_size: u64,
    pub upload_timestamp: DateTime<Utc>,
    pub page_count: Option<u32>,
}

#[must_use]
pub fn build_source_document(filename: &str, bytes: &[u8], page_count: Option<u32>, now: DateTime<Utc>) -> SourceDocumentMeta {
    let sha256_hash = trialforge_utils::hash::sha256_hex(bytes);
    let document_id = format!("DOC-{}", sha256_hash[..16].to_uppercase());

    SourceDocumentMeta {
        document_id,
        filename: filename.to_string(),
        sha256_hash,
        byte_size: bytes.len() as u64,
        upload_timestamp: now,
        page_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_derives_from_the_content_hash_prefix() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let meta = build_source_document("protocol.pdf", b"hello world", Some(42), now);
        assert!(meta.document_id.starts_with("DOC-"));
        assert_eq!(meta.document_id.len(), "DOC-".len() + 16);
        assert_eq!(meta.byte_size, 11);
        assert_eq!(meta.page_count, Some(42));
    }

    #[test]
    fn reading_a_missing_file_returns_a_descriptive_error() {
        let err = read_source_bytes(std::path::Path::new("/nonexistent/protocol.pdf")).unwrap_err();
        assert!(matches!(err, CombinerError::SourceRead { .. }));
    }
}
