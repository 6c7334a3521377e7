//! Cache key computation, ported from
//! `extraction_cache.py::ExtractionCache._build_cache_key`. The key closes
//! over everything that can change the extraction result: the source
//! document, the module, the model, both prompts, and the schema — so a
//! prompt or schema edit invalidates the cache automatically without any
//! manual cache-busting step.

use trialforge_utils::hash::{combine_hashes, sha256_hex, short_text_hash};

const SOURCE_PREFIX_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub module_id: String,
    pub model_id: String,
    pub source_hash: String,
    pub combined: String,
}

impl CacheKey {
    #[must_use]
    pub fn compute(
        source_bytes: &[u8],
        module_id: &str,
        model_id: &str,
        pass1_prompt: &str,
        pass2_prompt: &str,
        schema_text: &str,
    ) -> Self {
        let prefix = &source_bytes[..source_bytes.len().min(SOURCE_PREFIX_BYTES)];
        let source_hash = hash_source(prefix, source_bytes.len());

        let pass1_hash = short_text_hash(pass1_prompt);
        let pass2_hash = short_text_hash(pass2_prompt);
        let schema_hash = short_text_hash(schema_text);
        let model_hash = short_text_hash(model_id);

        let combined = combine_hashes(&[
            module_id,
            &source_hash,
            &pass1_hash,
            &pass2_hash,
            &schema_hash,
            &model_hash,
        ]);

        Self {
            module_id: module_id.to_string(),
            model_id: model_id.to_string(),
            source_hash,
            combined,
        }
    }

    /// Stable filename-safe identifier for the filesystem fallback.
    #[must_use]
    pub fn file_key(&self) -> String {
        format!("{}_{}_{}", self.module_id, self.source_hash, &self.combined[..16.min(self.combined.len())])
    }
}

fn hash_source(prefix: &[u8], total_len: usize) -> String {
    let mut buf = Vec::with_capacity(prefix.len() + 20);
    buf.extend_from_slice(prefix);
    buf.extend_from_slice(total_len.to_string().as_bytes());
    sha256_hex(&buf)[..16].to_string()
}
