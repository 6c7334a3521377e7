//! Stage 7: Timing distribution (spec §4.G stage 7): "expand compound
//! timings (`BI/EOI`, `pre-dose/post-dose`, comma-separated lists) into
//! atomic timings by duplicating the owning instance; preserves footnote
//! markers on every expansion; emits instance ids `<orig>-<timing>`." No
//! Python source was retrieved for this stage; built from spec prose.
//! Deterministic, no LLM involved.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::document;
use crate::error::InterpretError;
use crate::stage::{Stage, StageContext, StageResult};

const STAGE_NUMBER: u8 = 7;
const STAGE_NAME: &str = "Timing Distribution";

pub struct TimingDistributionStage;

fn atomic_timings(timing: &str) -> Vec<String> {
    let tokens: Vec<String> = timing
        .split(|c| c == ',' || c == '/')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tokens
}

#[async_trait]
impl Stage for TimingDistributionStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut document: Value, _ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        let instances = document::scheduled_instances_mut(&mut document);
        let mut expanded = Vec::with_capacity(instances.len());
        let mut distributed_count = 0u32;

        for instance in instances.drain(..) {
            let Some(timing) = instance.get("timing").and_then(Value::as_str).map(str::to_string) else {
                expanded.push(instance);
                continue;
            };
            let tokens = atomic_timings(&timing);
            if tokens.len() <= 1 {
                expanded.push(instance);
                continue;
            }

            let Some(orig_id) = instance.get("id").and_then(Value::as_str).map(str::to_string) else {
                expanded.push(instance);
                continue;
            };

            for token in &tokens {
                let mut clone = instance.clone();
                if let Some(obj) = clone.as_object_mut() {
                    obj.insert("id".to_string(), Value::String(format!("{orig_id}-{token}")));
                    obj.insert("timing".to_string(), Value::String(token.clone()));
                    obj.insert(
                        "_timingExpansion".to_string(),
                        json!({"originalInstanceId": orig_id, "originalTiming": timing}),
                    );
                }
                expanded.push(clone);
            }
            distributed_count += 1;
        }

        *document::scheduled_instances_mut(&mut document) = expanded;

        let metrics = json!({"compoundTimingsDistributed": distributed_count});
        Ok((document, StageResult::from_issues(STAGE_NUMBER, STAGE_NAME, Vec::new(), metrics)))
    }
}
