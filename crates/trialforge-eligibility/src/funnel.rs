//! Criteria classification/narrowing funnel, the `extracting` state of
//! the eligibility job (spec §4.F). Reinterpreted from
//! `eligibility_analyzer/execution/funnel_executor.py`: the original
//! `FunnelExecutor` runs a sequence of stages over a *patient cohort*,
//! each stage an INTERSECT/EXCEPT database query that narrows the active
//! patient-id set — but spec.md's eligibility pipeline has no patient
//! database anywhere in its data model, it only extracts criteria from
//! protocol *text*. What's portable is the funnel's structure, not its
//! query semantics: a sequential series of stages, each narrowing or
//! reordering an active working set and recording how many items it
//! started and ended with. Here the "set" being narrowed is the
//! confirmed criteria list itself, and each stage classifies or orders
//! rather than filters against patient data.

use trialforge_store::{CriterionRecord, CriterionSection, Queryability};

#[derive(Debug, Clone)]
pub struct FunnelStage {
    pub name: &'static str,
    pub input_count: usize,
    pub output_count: usize,
}

#[derive(Debug, Clone)]
pub struct OrderedCriterion {
    pub criterion_id: String,
    pub queryability: Queryability,
    pub rank: i64,
}

#[derive(Debug, Clone)]
pub struct FunnelResult {
    pub stages: Vec<FunnelStage>,
    pub ordered: Vec<OrderedCriterion>,
}

const SCREENING_ONLY_MARKERS: &[&str] = &["willing to", "able to understand", "able to comply", "investigator's opinion", "capable of"];
const QUERYABLE_MARKERS: &[&str] = &[
    "years of age", "years old", "bmi", "mg/dl", "ng/ml", "u/l", ">=", "<=", ">", "<", "mmhg", "ecog",
];
const KILLER_EXCLUSION_MARKERS: &[&str] = &[
    "pregnan", "hypersensitiv", "contraindicat", "life-threatening", "life threatening", "allerg",
];

fn classify_queryability(text: &str) -> Queryability {
    let lower = text.to_lowercase();
    if SCREENING_ONLY_MARKERS.iter().any(|m| lower.contains(m)) {
        return Queryability::ScreeningOnly;
    }
    if QUERYABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Queryability::Queryable;
    }
    Queryability::NotApplicable
}

fn is_killer_exclusion(text: &str) -> bool {
    let lower = text.to_lowercase();
    KILLER_EXCLUSION_MARKERS.iter().any(|m| lower.contains(m))
}

/// Run the three-stage funnel over a job's confirmed criteria:
/// 1. classify queryability,
/// 2. partition by inclusion/exclusion,
/// 3. within exclusions, rank the "killer" (safety/contraindication)
///    criteria first.
///
/// Stable throughout: criteria never reorder relative to each other
/// except where a stage's rule explicitly says so, mirroring the
/// original's "narrow, never shuffle arbitrarily" funnel discipline.
#[must_use]
pub fn run(criteria: &[CriterionRecord]) -> FunnelResult {
    let total = criteria.len();

    let classified: Vec<(&CriterionRecord, Queryability)> = criteria.iter().map(|c| (c, classify_queryability(&c.text))).collect();
    let stage1 = FunnelStage {
        name: "classify_queryability",
        input_count: total,
        output_count: classified.len(),
    };

    let (inclusion, exclusion): (Vec<_>, Vec<_>) = classified.into_iter().partition(|(c, _)| c.section == CriterionSection::Inclusion);
    let stage2 = FunnelStage {
        name: "partition_inclusion_exclusion",
        input_count: stage1.output_count,
        output_count: inclusion.len() + exclusion.len(),
    };

    let (mut killer, mut other): (Vec<_>, Vec<_>) = exclusion.into_iter().partition(|(c, _)| is_killer_exclusion(&c.text));
    let stage3 = FunnelStage {
        name: "order_killer_exclusions_first",
        input_count: killer.len() + other.len(),
        output_count: killer.len() + other.len(),
    };
    killer.extend(other.drain(..));

    let mut ordered = Vec::with_capacity(total);
    let mut rank = 0i64;
    for (criterion, queryability) in killer.into_iter().chain(inclusion.into_iter()) {
        ordered.push(OrderedCriterion {
            criterion_id: criterion.criterion_id.clone(),
            queryability,
            rank,
        });
        rank += 1;
    }

    FunnelResult {
        stages: vec![stage1, stage2, stage3],
        ordered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(id: &str, section: CriterionSection, text: &str) -> CriterionRecord {
        CriterionRecord {
            job_id: "job_1".to_string(),
            criterion_id: id.to_string(),
            section,
            text: text.to_string(),
            status: "confirmed".to_string(),
            queryability: None,
            funnel_rank: None,
        }
    }

    #[test]
    fn killer_exclusions_rank_before_other_exclusions_and_all_inclusions() {
        let criteria = vec![
            criterion("C1", CriterionSection::Inclusion, "Age 18 years of age or older"),
            criterion("C2", CriterionSection::Exclusion, "Participation in another clinical trial"),
            criterion("C3", CriterionSection::Exclusion, "Known hypersensitivity to the study drug"),
        ];
        let result = run(&criteria);
        assert_eq!(result.ordered[0].criterion_id, "C3");
        assert_eq!(result.ordered[1].criterion_id, "C2");
        assert_eq!(result.ordered[2].criterion_id, "C1");
    }

    #[test]
    fn queryability_classification_uses_marker_keywords() {
        let criteria = vec![
            criterion("C1", CriterionSection::Inclusion, "Body mass index (BMI) between 18.5 and 30 kg/m2"),
            criterion("C2", CriterionSection::Inclusion, "Willing to comply with all study procedures"),
            criterion("C3", CriterionSection::Inclusion, "Has a diagnosis consistent with the protocol"),
        ];
        let result = run(&criteria);
        let by_id = |id: &str| result.ordered.iter().find(|c| c.criterion_id == id).unwrap().queryability;
        assert_eq!(by_id("C1"), Queryability::Queryable);
        assert_eq!(by_id("C2"), Queryability::ScreeningOnly);
        assert_eq!(by_id("C3"), Queryability::NotApplicable);
    }

    #[test]
    fn stage_counts_narrow_monotonically() {
        let criteria = vec![
            criterion("C1", CriterionSection::Inclusion, "Age 18 years of age or older"),
            criterion("C2", CriterionSection::Exclusion, "Pregnant or breastfeeding"),
        ];
        let result = run(&criteria);
        assert_eq!(result.stages[0].input_count, 2);
        assert_eq!(result.stages.last().unwrap().output_count, 2);
    }

    #[test]
    fn empty_input_produces_an_empty_funnel() {
        let result = run(&[]);
        assert!(result.ordered.is_empty());
        assert_eq!(result.stages[0].input_count, 0);
    }
}
