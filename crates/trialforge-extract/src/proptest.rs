//! Property-based tests for surgical retry (spec §8 quantified invariant:
//! "the surgically-merged result is a superset of the preserved baseline;
//! every top-level field not named in `failed_fields` is byte-identical
//! to the baseline").

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;
    use serde_json::Value;

    use crate::surgical::deep_merge;

    /// A small, flat base object: field names drawn from a fixed pool so
    /// `failed_fields` can be a meaningful subset rather than almost
    /// always disjoint from `base`'s keys.
    fn field_name() -> impl Strategy<Value = String> {
        prop_oneof![Just("a"), Just("b"), Just("c"), Just("d"), Just("e")].prop_map(String::from)
    }

    fn flat_object() -> impl Strategy<Value = Value> {
        prop::collection::btree_map(field_name(), any::<i32>(), 0..5)
            .prop_map(|map| Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()))
    }

    proptest! {
        /// The merge never drops a field `base` had: `result`'s key set
        /// is always a superset of `base`'s key set.
        #[test]
        fn merged_result_keys_are_a_superset_of_base_keys(
            base in flat_object(),
            updates in flat_object(),
            failed in prop::collection::btree_set(field_name(), 0..5),
        ) {
            let merged = deep_merge(&base, &updates, &failed);
            let base_keys: BTreeSet<_> = base.as_object().unwrap().keys().cloned().collect();
            let merged_keys: BTreeSet<_> = merged.as_object().unwrap().keys().cloned().collect();
            prop_assert!(base_keys.is_subset(&merged_keys));
        }

        /// Every field of `base` not named in `failed_fields` survives
        /// the merge completely untouched.
        #[test]
        fn fields_outside_failed_set_are_byte_identical_to_base(
            base in flat_object(),
            updates in flat_object(),
            failed in prop::collection::btree_set(field_name(), 0..5),
        ) {
            let merged = deep_merge(&base, &updates, &failed);
            for (key, value) in base.as_object().unwrap() {
                if !failed.contains(key) {
                    prop_assert_eq!(&merged[key], value);
                }
            }
        }
    }
}
