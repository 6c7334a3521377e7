//! Quality thresholds, retry bounds, and confidence bands — the tunable
//! numbers referenced throughout spec §4.B, §4.C, §4.G.

use serde::{Deserialize, Serialize};

/// Per-dimension floors a `QualityScore` must clear to avoid retry
/// (spec §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub accuracy: f64,
    pub completeness: f64,
    pub usdm_adherence: f64,
    pub provenance: f64,
    pub terminology: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            accuracy: 0.95,
            completeness: 0.90,
            usdm_adherence: 1.0,
            provenance: 0.95,
            terminology: 0.90,
        }
    }
}

/// Bounds on the quality-directed retry loop (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Surgical retry is only attempted when the average score across
    /// dimensions-with-issues is at least this high.
    pub surgical_min_avg_score: f64,
    /// ...and schema adherence is at least this high.
    pub surgical_min_schema_adherence: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            surgical_min_avg_score: 0.70,
            surgical_min_schema_adherence: 0.50,
        }
    }
}

/// Confidence-band thresholds shared by the interpretation pipeline's
/// LLM-decision stages (spec §4.G "Confidence semantics") and the
/// specimen-enrichment stage (spec §4.G stage 5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBands {
    pub auto_apply: f64,
    pub review: f64,
}

impl Default for ConfidenceBands {
    fn default() -> Self {
        Self {
            auto_apply: 0.90,
            review: 0.70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceDecision {
    AutoApply,
    Review,
    Reject,
}

impl ConfidenceBands {
    #[must_use]
    pub fn classify(&self, confidence: f64) -> ConfidenceDecision {
        if confidence >= self.auto_apply {
            ConfidenceDecision::AutoApply
        } else if confidence >= self.review {
            ConfidenceDecision::Review
        } else {
            ConfidenceDecision::Reject
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_0_90_is_auto_apply_and_just_below_is_review() {
        let bands = ConfidenceBands::default();
        assert_eq!(bands.classify(0.90), ConfidenceDecision::AutoApply);
        assert_eq!(bands.classify(0.8999), ConfidenceDecision::Review);
        assert_eq!(bands.classify(0.70), ConfidenceDecision::Review);
        assert_eq!(bands.classify(0.6999), ConfidenceDecision::Reject);
    }
}
