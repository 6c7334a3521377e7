//! `QualityScore`, ported from `quality_checker.py::QualityScore`: five
//! weighted dimensions plus per-dimension issue lists for feedback-driven
//! retry (spec §4.B).

use serde::Serialize;
use trialforge_config::thresholds::QualityThresholds;
use trialforge_provenance::{FormatIssue, MissingField, TerminologyIssue};

const WEIGHT_ACCURACY: f64 = 0.25;
const WEIGHT_COMPLETENESS: f64 = 0.20;
const WEIGHT_USDM_ADHERENCE: f64 = 0.20;
const WEIGHT_PROVENANCE: f64 = 0.20;
const WEIGHT_TERMINOLOGY: f64 = 0.15;

#[derive(Debug, Clone, Serialize)]
pub struct AccuracyIssue {
    pub path: String,
    pub issue: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletenessIssue {
    pub field: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityScore {
    pub accuracy: f64,
    pub completeness: f64,
    pub usdm_adherence: f64,
    pub provenance: f64,
    pub terminology: f64,

    pub accuracy_issues: Vec<AccuracyIssue>,
    pub completeness_issues: Vec<CompletenessIssue>,
    pub usdm_adherence_issues: Vec<SchemaIssue>,
    pub provenance_issues: Vec<MissingField>,
    pub provenance_format_issues: Vec<FormatIssue>,
    pub terminology_issues: Vec<TerminologyIssue>,
}

impl QualityScore {
    #[must_use]
    pub fn overall_score(&self) -> f64 {
        self.accuracy * WEIGHT_ACCURACY
            + self.completeness * WEIGHT_COMPLETENESS
            + self.usdm_adherence * WEIGHT_USDM_ADHERENCE
            + self.provenance * WEIGHT_PROVENANCE
            + self.terminology * WEIGHT_TERMINOLOGY
    }

    #[must_use]
    pub fn passes_thresholds(&self, thresholds: &QualityThresholds) -> bool {
        self.accuracy >= thresholds.accuracy
            && self.completeness >= thresholds.completeness
            && self.usdm_adherence >= thresholds.usdm_adherence
            && self.provenance >= thresholds.provenance
            && self.terminology >= thresholds.terminology
    }

    #[must_use]
    pub fn failed_dimensions(&self, thresholds: &QualityThresholds) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if self.accuracy < thresholds.accuracy {
            failed.push("accuracy");
        }
        if self.completeness < thresholds.completeness {
            failed.push("completeness");
        }
        if self.usdm_adherence < thresholds.usdm_adherence {
            failed.push("usdm_adherence");
        }
        if self.provenance < thresholds.provenance {
            failed.push("provenance");
        }
        if self.terminology < thresholds.terminology {
            failed.push("terminology");
        }
        failed
    }

    /// Average score across only the dimensions that failed thresholds —
    /// used to decide whether a surgical (targeted) retry is viable
    /// (spec §4.C).
    #[must_use]
    pub fn avg_score_on_failed_dimensions(&self, thresholds: &QualityThresholds) -> f64 {
        let failed = self.failed_dimensions(thresholds);
        if failed.is_empty() {
            return 1.0;
        }
        let sum: f64 = failed
            .iter()
            .map(|dim| match *dim {
                "accuracy" => self.accuracy,
                "completeness" => self.completeness,
                "usdm_adherence" => self.usdm_adherence,
                "provenance" => self.provenance,
                "terminology" => self.terminology,
                _ => unreachable!(),
            })
            .sum();
        sum / failed.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfect_score() -> QualityScore {
        QualityScore {
            accuracy: 1.0,
            completeness: 1.0,
            usdm_adherence: 1.0,
            provenance: 1.0,
            terminology: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn overall_score_matches_weighted_formula() {
        let mut score = perfect_score();
        score.accuracy = 0.8;
        score.terminology = 0.5;
        let expected = 0.8 * 0.25 + 1.0 * 0.20 + 1.0 * 0.20 + 1.0 * 0.20 + 0.5 * 0.15;
        assert!((score.overall_score() - expected).abs() < 1e-9);
    }

    #[test]
    fn passes_thresholds_requires_every_dimension_to_clear_its_floor() {
        let thresholds = QualityThresholds::default();
        let mut score = perfect_score();
        assert!(score.passes_thresholds(&thresholds));

        score.provenance = 0.94;
        assert!(!score.passes_thresholds(&thresholds));
        assert_eq!(score.failed_dimensions(&thresholds), vec!["provenance"]);
    }

    #[test]
    fn avg_score_on_failed_dimensions_ignores_passing_ones() {
        let thresholds = QualityThresholds::default();
        let mut score = perfect_score();
        score.accuracy = 0.60;
        score.terminology = 0.80;
        let avg = score.avg_score_on_failed_dimensions(&thresholds);
        assert!((avg - 0.70).abs() < 1e-9);
    }
}
