//! Property-based tests for the provenance coverage walk (spec §8
//! quantified invariant: "provenance coverage is always in `[0, 1]`,
//! regardless of document shape").

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::Value;

    use crate::coverage::calculate_coverage;

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| Value::Number(n.into())),
            "[a-z]{0,12}".prop_map(Value::String),
        ]
    }

    /// Arbitrary, depth-bounded JSON object/array trees, with the
    /// occasional `provenance`/`<field>Provenance` key planted alongside
    /// a scalar so the walk exercises both the "covered" and "missing"
    /// branches.
    fn arb_json() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(|items| Value::Array(items)),
                prop::collection::btree_map("[a-zA-Z][a-zA-Z0-9]{0,8}", inner, 0..6).prop_map(|map| {
                    Value::Object(map.into_iter().collect())
                }),
            ]
        })
    }

    proptest! {
        /// Coverage is a ratio: it must always land in `[0.0, 1.0]`, no
        /// matter how the document is shaped or how provenance is
        /// scattered through it.
        #[test]
        fn coverage_ratio_is_always_in_unit_interval(doc in arb_json()) {
            let (coverage, missing) = calculate_coverage(&doc);
            prop_assert!(coverage >= 0.0 && coverage <= 1.0, "coverage {coverage} out of bounds");
            if coverage == 1.0 {
                prop_assert!(missing.is_empty());
            }
        }

        /// A document with no scalar fields at all (only objects/arrays
        /// nested arbitrarily deep, bottoming out empty) has nothing to
        /// cover, so coverage is trivially `1.0` with no missing fields.
        #[test]
        fn empty_of_scalars_is_fully_covered(depth in 0usize..5) {
            let mut doc = Value::Object(serde_json::Map::new());
            for _ in 0..depth {
                doc = serde_json::json!({ "nested": doc });
            }
            let (coverage, missing) = calculate_coverage(&doc);
            prop_assert_eq!(coverage, 1.0);
            prop_assert!(missing.is_empty());
        }
    }
}
