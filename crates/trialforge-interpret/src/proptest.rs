//! Property-based tests for cycle expansion (spec §8 quantified
//! invariant: "the expanded encounter count equals the declared
//! maxCycles (or maxOccurrences); referencing-instance count after
//! expansion equals original count × cycles").

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use crate::stage::{Stage, StageContext};
    use crate::stages::CycleExpansionStage;
    use trialforge_config::{ConfidenceBands, InterpretationConfig};

    fn ctx() -> StageContext {
        StageContext {
            confidence_bands: ConfidenceBands::default(),
            interpretation: InterpretationConfig::default(),
            llm: None,
        }
    }

    proptest! {
        /// A single `PER_CYCLE` encounter with `cycles` declared expands
        /// to exactly `cycles` encounters, and each of its `n` referencing
        /// scheduled-activity instances expands to `n * cycles`.
        #[test]
        fn per_cycle_expansion_count_law_holds(cycles in 1u32..20, instance_count in 0u32..6) {
            let instances: Vec<_> = (0..instance_count)
                .map(|i| json!({"id": format!("SAI-{i}"), "encounterId": "ENC-1"}))
                .collect();
            let doc = json!({
                "encounters": [{"id": "ENC-1", "recurrence": {"type": "PER_CYCLE", "maxCycles": cycles}}],
                "scheduledActivityInstances": instances,
            });

            let (doc, result) = tokio_test_block_on(CycleExpansionStage.run(doc, &ctx()));

            prop_assert_eq!(doc["encounters"].as_array().unwrap().len() as u32, cycles);
            prop_assert_eq!(
                doc["scheduledActivityInstances"].as_array().unwrap().len() as u32,
                instance_count * cycles
            );
            prop_assert_eq!(result.metrics["encountersExpanded"], json!(1));
            prop_assert_eq!(result.metrics["instancesDuplicated"], json!(instance_count * cycles));
        }
    }

    /// `proptest!`'s generated test functions are synchronous; this stage
    /// has no suspension points of its own (spec §5: "No suspension
    /// inside the quality checker, the merger, or the deep-merge path" —
    /// cycle expansion is equally pure), so a minimal single-threaded
    /// block-on is enough to drive the `async fn run` signature `Stage`
    /// shares with every other stage.
    fn tokio_test_block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(fut)
    }
}
