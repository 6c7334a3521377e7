//! Two-phase, quality-directed extraction (spec §4.C), ported from
//! `two_phase_extractor.py::TwoPhaseExtractor`. Re-expressed as the
//! exceptions-free data flow called for in spec §9: every attempt yields
//! an explicit [`AttemptOutcome`] rather than relying on try/catch to tell
//! "parsed" apart from "needs another attempt".

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{info, warn};

use trialforge_config::module::ModuleSpec;
use trialforge_config::thresholds::{QualityThresholds, RetryConfig};
use trialforge_llm::{GenerateRequest, LlmBackend, RemoteFileHandle, ResponseFormat};
use trialforge_quality::{evaluate, evaluate_pass1, generate_pass1_feedback, generate_pass2_feedback, post_process, QualityScore};

use crate::error::ExtractError;
use crate::json_parse::parse_json_response;
use crate::prompt::{carry_forward_pass1_fields, ensure_pass1_mandatory_fields, render_pass1_prompt, render_pass2_prompt};
use crate::surgical::{build_surgical_prompt, deep_merge, extract_failed_paths, failed_top_level_fields, should_use_surgical_retry};

/// The outcome of a single generate-then-parse attempt, carried as data
/// instead of as a thrown exception.
enum AttemptOutcome {
    Parsed(Value),
    ParseFailed,
}

#[derive(Debug, Clone)]
pub struct ExtractionMetadata {
    pub module_id: String,
    pub instance_type: String,
    pub pass1_duration: Duration,
    pub pass2_duration: Duration,
    pub pass2_skipped: bool,
    pub pass1_surgical_retries: u32,
    pub pass2_surgical_retries: u32,
}

#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub result: Value,
    pub quality: QualityScore,
    pub metadata: ExtractionMetadata,
}

pub struct TwoPhaseExtractor<'a> {
    pub backend: &'a dyn LlmBackend,
    pub model: String,
    pub thresholds: QualityThresholds,
    pub retry: RetryConfig,
    pub quality_retry_delay: Duration,
}

impl<'a> TwoPhaseExtractor<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn LlmBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            thresholds: QualityThresholds::default(),
            retry: RetryConfig::default(),
            quality_retry_delay: Duration::from_millis(0),
        }
    }

    async fn generate(&self, prompt: String, remote_file: Option<RemoteFileHandle>) -> Result<AttemptOutcome, ExtractError> {
        let mut request = GenerateRequest::new(prompt, self.model.clone());
        request.response_format = ResponseFormat::Json;
        if let Some(handle) = remote_file {
            request = request.with_remote_file(handle);
        }
        let text = self.backend.generate(&request).await?;
        match parse_json_response(&text) {
            Ok(value) => Ok(AttemptOutcome::Parsed(value)),
            Err(err) => {
                warn!(error = %err, "failed to parse LLM response as JSON");
                Ok(AttemptOutcome::ParseFailed)
            }
        }
    }

    async fn execute_pass1(
        &self,
        module: &ModuleSpec,
        protocol_id: &str,
        remote_file: Option<RemoteFileHandle>,
        extra: &str,
    ) -> Result<Option<Value>, ExtractError> {
        let template = module.load_pass1_prompt().map_err(|source| ExtractError::PromptIo {
            what: "pass-1 prompt",
            path: module.pass1_prompt_path.display().to_string(),
            source,
        })?;
        let mut prompt = render_pass1_prompt(&template, protocol_id);
        prompt.push_str(extra);

        match self.generate(prompt, remote_file).await? {
            AttemptOutcome::Parsed(mut value) => {
                ensure_pass1_mandatory_fields(&mut value, protocol_id, &module.instance_type);
                Ok(Some(value))
            }
            AttemptOutcome::ParseFailed => Ok(None),
        }
    }

    async fn execute_pass2(
        &self,
        module: &ModuleSpec,
        pass1_output: &Value,
        protocol_id: &str,
        remote_file: Option<RemoteFileHandle>,
        extra: &str,
    ) -> Result<Option<Value>, ExtractError> {
        let template = module.load_pass2_prompt().map_err(|source| ExtractError::PromptIo {
            what: "pass-2 prompt",
            path: module.pass2_prompt_path.display().to_string(),
            source,
        })?;
        let mut prompt = render_pass2_prompt(&template, pass1_output);
        prompt.push_str(extra);

        match self.generate(prompt, remote_file).await? {
            AttemptOutcome::Parsed(mut value) => {
                carry_forward_pass1_fields(&mut value, pass1_output, protocol_id, &module.instance_type);
                Ok(Some(value))
            }
            AttemptOutcome::ParseFailed => Ok(None),
        }
    }

    /// Pass 1 loop: surgical/full retry driven by accuracy+completeness
    /// only (provenance/terminology aren't meaningful before Pass 2).
    async fn run_pass1_loop(
        &self,
        module: &ModuleSpec,
        protocol_id: &str,
        remote_file: Option<RemoteFileHandle>,
    ) -> Result<(Value, QualityScore, u32), ExtractError> {
        let schema: Value = serde_json::from_str(&module.load_schema().map_err(|source| ExtractError::PromptIo {
            what: "schema",
            path: module.schema_path.display().to_string(),
            source,
        })?)
        .unwrap_or(Value::Null);

        let mut result: Option<Value> = None;
        let mut quality: Option<QualityScore> = None;
        let mut surgical_retries = 0u32;

        for attempt in 0..self.retry.max_retries {
            let attempted = if attempt == 0 {
                self.execute_pass1(module, protocol_id, remote_file.clone(), "").await?
            } else {
                match (&result, &quality) {
                    (Some(prev), Some(prev_quality)) => {
                        if should_use_surgical_retry(prev_quality, &self.thresholds, &self.retry) {
                            let failed = extract_failed_paths(prev_quality);
                            let surgical_prompt = build_surgical_prompt(&failed, "pass1");
                            surgical_retries += 1;
                            match self.execute_pass1(module, protocol_id, remote_file.clone(), &surgical_prompt).await? {
                                Some(surgical_result) => {
                                    let fields = failed_top_level_fields(&failed);
                                    let mut merged = deep_merge(prev, &surgical_result, &fields);
                                    ensure_pass1_mandatory_fields(&mut merged, protocol_id, &module.instance_type);
                                    Some(merged)
                                }
                                None => {
                                    surgical_retries -= 1;
                                    let feedback = generate_pass1_feedback(prev_quality, prev);
                                    self.execute_pass1(module, protocol_id, remote_file.clone(), &feedback).await?
                                }
                            }
                        } else {
                            let feedback = generate_pass1_feedback(prev_quality, prev);
                            self.execute_pass1(module, protocol_id, remote_file.clone(), &feedback).await?
                        }
                    }
                    _ => self.execute_pass1(module, protocol_id, remote_file.clone(), "").await?,
                }
            };

            let Some(attempted) = attempted else {
                if attempt + 1 == self.retry.max_retries {
                    return Err(ExtractError::RetriesExhausted(self.retry.max_retries));
                }
                continue;
            };

            let this_quality = evaluate_pass1(&attempted, &schema);
            let ok = this_quality.accuracy >= self.thresholds.accuracy && this_quality.completeness >= self.thresholds.completeness;

            result = Some(attempted);
            quality = Some(this_quality);

            if ok {
                info!(module_id = %module.module_id, attempt, "pass 1 quality OK");
                break;
            }

            if attempt + 1 < self.retry.max_retries && !self.quality_retry_delay.is_zero() {
                tokio::time::sleep(self.quality_retry_delay).await;
            }
        }

        let result = result.ok_or(ExtractError::RetriesExhausted(self.retry.max_retries))?;
        let quality = quality.ok_or(ExtractError::RetriesExhausted(self.retry.max_retries))?;
        Ok((result, quality, surgical_retries))
    }

    /// Pass 2 loop: full five-dimension quality, post-processed after
    /// every attempt so the threshold check sees auto-corrected output.
    async fn run_pass2_loop(
        &self,
        module: &ModuleSpec,
        pass1_output: &Value,
        protocol_id: &str,
        remote_file: Option<RemoteFileHandle>,
        schema: &Value,
    ) -> Result<(Value, QualityScore, u32), ExtractError> {
        let mut result: Option<Value> = None;
        let mut quality: Option<QualityScore> = None;
        let mut surgical_retries = 0u32;

        for attempt in 0..self.retry.max_retries {
            let attempted = if attempt == 0 {
                self.execute_pass2(module, pass1_output, protocol_id, remote_file.clone(), "").await?
            } else {
                match (&result, &quality) {
                    (Some(prev), Some(prev_quality)) => {
                        if should_use_surgical_retry(prev_quality, &self.thresholds, &self.retry) {
                            let failed = extract_failed_paths(prev_quality);
                            let surgical_prompt = build_surgical_prompt(&failed, "pass2");
                            surgical_retries += 1;
                            match self
                                .execute_pass2(module, pass1_output, protocol_id, remote_file.clone(), &surgical_prompt)
                                .await?
                            {
                                Some(surgical_result) => {
                                    let fields = failed_top_level_fields(&failed);
                                    let mut merged = deep_merge(prev, &surgical_result, &fields);
                                    carry_forward_pass1_fields(&mut merged, pass1_output, protocol_id, &module.instance_type);
                                    Some(merged)
                                }
                                None => {
                                    surgical_retries -= 1;
                                    let feedback = generate_pass2_feedback(Some(prev_quality));
                                    self.execute_pass2(module, pass1_output, protocol_id, remote_file.clone(), &feedback).await?
                                }
                            }
                        } else {
                            let feedback = generate_pass2_feedback(Some(prev_quality));
                            self.execute_pass2(module, pass1_output, protocol_id, remote_file.clone(), &feedback).await?
                        }
                    }
                    _ => {
                        // Previous attempt's response didn't parse at all — retry from
                        // scratch rather than building feedback around a result we don't have.
                        self.execute_pass2(module, pass1_output, protocol_id, remote_file.clone(), "").await?
                    }
                }
            };

            let Some(attempted) = attempted else {
                if attempt + 1 == self.retry.max_retries {
                    return Err(ExtractError::RetriesExhausted(self.retry.max_retries));
                }
                continue;
            };

            let processed = post_process(&attempted);
            let this_quality = evaluate(&processed, schema);
            let ok = this_quality.passes_thresholds(&self.thresholds);

            result = Some(processed);
            quality = Some(this_quality);

            if ok {
                info!(module_id = %module.module_id, attempt, "pass 2 quality OK");
                break;
            }

            if attempt + 1 < self.retry.max_retries && !self.quality_retry_delay.is_zero() {
                tokio::time::sleep(self.quality_retry_delay).await;
            }
        }

        let result = result.ok_or(ExtractError::RetriesExhausted(self.retry.max_retries))?;
        let quality = quality.ok_or(ExtractError::RetriesExhausted(self.retry.max_retries))?;
        Ok((result, quality, surgical_retries))
    }

    /// Full quality-directed extraction: Pass 1 with retry, a
    /// pass-2-skip check, then Pass 2 with retry when provenance is
    /// insufficient (spec §4.C).
    pub async fn extract_with_quality_feedback(
        &self,
        module: &ModuleSpec,
        protocol_id: &str,
        remote_file: Option<RemoteFileHandle>,
    ) -> Result<ExtractionOutcome, ExtractError> {
        let schema: Value = serde_json::from_str(&module.load_schema().map_err(|source| ExtractError::PromptIo {
            what: "schema",
            path: module.schema_path.display().to_string(),
            source,
        })?)
        .unwrap_or(Value::Null);

        let pass1_start = Instant::now();
        let (pass1_result, _pass1_quality, pass1_surgical_retries) =
            self.run_pass1_loop(module, protocol_id, remote_file.clone()).await?;
        let pass1_duration = pass1_start.elapsed();

        let pass1_full_quality = evaluate(&pass1_result, &schema);

        let (final_result, final_quality, pass2_duration, pass2_skipped, pass2_surgical_retries) =
            if pass1_full_quality.provenance >= self.thresholds.provenance {
                info!(module_id = %module.module_id, "pass 1 provenance meets threshold, skipping pass 2");
                let processed = post_process(&pass1_result);
                let quality = evaluate(&processed, &schema);
                (processed, quality, Duration::from_millis(0), true, 0)
            } else {
                let pass2_start = Instant::now();
                let (result, quality, surgical_retries) = self
                    .run_pass2_loop(module, &pass1_result, protocol_id, remote_file, &schema)
                    .await?;
                (result, quality, pass2_start.elapsed(), false, surgical_retries)
            };

        Ok(ExtractionOutcome {
            result: final_result,
            quality: final_quality,
            metadata: ExtractionMetadata {
                module_id: module.module_id.clone(),
                instance_type: module.instance_type.clone(),
                pass1_duration,
                pass2_duration,
                pass2_skipped,
                pass1_surgical_retries,
                pass2_surgical_retries,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use trialforge_llm::StubBackend;

    fn write_module(dir: &std::path::Path, schema: &str) -> ModuleSpec {
        let pass1 = dir.join("pass1.txt");
        let pass2 = dir.join("pass2.txt");
        let schema_path = dir.join("schema.json");
        std::fs::write(&pass1, "Extract values for {protocol_id}").unwrap();
        std::fs::write(&pass2, "Add provenance to {{ pass1_output }}").unwrap();
        std::fs::write(&schema_path, schema).unwrap();

        ModuleSpec {
            module_id: "study_identification".to_string(),
            name: "Study Identification".to_string(),
            pass1_prompt_path: pass1,
            pass2_prompt_path: pass2,
            schema_path,
            instance_type: "StudyDesign".to_string(),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn extracts_when_pass1_already_has_enough_provenance() {
        let dir = tempdir().unwrap();
        let module = write_module(
            dir.path(),
            r#"{"type":"object","required":["studyTitle"],"properties":{"studyTitle":{"type":"string"}}}"#,
        );

        let response = serde_json::json!({
            "id": "P-1",
            "instanceType": "StudyDesign",
            "studyTitle": "A Study",
            "provenance": {"kind": "explicit", "page_number": 1, "text_snippet": "A Study of Something Great"}
        })
        .to_string();

        let backend = StubBackend::always_returning(response);
        let extractor = TwoPhaseExtractor::new(&backend, "stub-model");

        let outcome = extractor
            .extract_with_quality_feedback(&module, "P-1", None)
            .await
            .unwrap();

        assert!(outcome.metadata.pass2_skipped);
        assert_eq!(outcome.result["studyTitle"], "A Study");
    }

    #[tokio::test]
    async fn retries_are_exhausted_when_backend_never_returns_parseable_json() {
        let dir = tempdir().unwrap();
        let module = write_module(dir.path(), r#"{"type":"object"}"#);

        let backend = StubBackend::always_returning("not json");
        let mut extractor = TwoPhaseExtractor::new(&backend, "stub-model");
        extractor.retry.max_retries = 2;

        let result = extractor.extract_with_quality_feedback(&module, "P-1", None).await;
        assert!(matches!(result, Err(ExtractError::RetriesExhausted(2))));
    }

}
