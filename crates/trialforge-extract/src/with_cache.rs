//! Version-aware caching wrapper, ported from
//! `two_phase_extractor.py::extract_with_cache`. The cache key closes over
//! the PDF bytes, both pass prompts, the schema, and the model name, so it
//! invalidates automatically whenever any of those change.

use std::time::Duration;

use serde_json::Value;

use trialforge_cache::{Cache, CacheKey};
use trialforge_config::module::ModuleSpec;
use trialforge_llm::RemoteFileHandle;
use trialforge_quality::evaluate;

use crate::error::ExtractError;
use crate::extractor::{ExtractionMetadata, ExtractionOutcome, TwoPhaseExtractor};

#[allow(clippy::too_many_arguments)]
pub async fn extract_with_cache(
    extractor: &TwoPhaseExtractor<'_>,
    cache: &Cache,
    module: &ModuleSpec,
    protocol_id: &str,
    source_bytes: &[u8],
    remote_file: Option<RemoteFileHandle>,
    use_cache: bool,
) -> Result<(ExtractionOutcome, bool), ExtractError> {
    let pass1_prompt = module.load_pass1_prompt().map_err(|source| ExtractError::PromptIo {
        what: "pass-1 prompt",
        path: module.pass1_prompt_path.display().to_string(),
        source,
    })?;
    let pass2_prompt = module.load_pass2_prompt().map_err(|source| ExtractError::PromptIo {
        what: "pass-2 prompt",
        path: module.pass2_prompt_path.display().to_string(),
        source,
    })?;
    let schema_text = module.load_schema().map_err(|source| ExtractError::PromptIo {
        what: "schema",
        path: module.schema_path.display().to_string(),
        source,
    })?;
    let schema: Value = serde_json::from_str(&schema_text).unwrap_or(Value::Null);

    let key = CacheKey::compute(source_bytes, &module.module_id, &extractor.model, &pass1_prompt, &pass2_prompt, &schema_text);

    if use_cache {
        if let Some(cached) = cache.get(&key)? {
            tracing::info!(module_id = %module.module_id, "using cached extraction result");
            let quality = evaluate(&cached, &schema);
            let outcome = ExtractionOutcome {
                result: cached,
                quality: quality.clone(),
                metadata: ExtractionMetadata {
                    module_id: module.module_id.clone(),
                    instance_type: module.instance_type.clone(),
                    pass1_duration: Duration::from_millis(0),
                    pass2_duration: Duration::from_millis(0),
                    pass2_skipped: quality.provenance >= extractor.thresholds.provenance,
                    pass1_surgical_retries: 0,
                    pass2_surgical_retries: 0,
                },
            };
            return Ok((outcome, true));
        }
    }

    tracing::info!(module_id = %module.module_id, "cache miss, running extraction");
    let outcome = extractor.extract_with_quality_feedback(module, protocol_id, remote_file).await?;

    if use_cache {
        cache.set(&key, &outcome.result)?;
    }

    Ok((outcome, false))
}
