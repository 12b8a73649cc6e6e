//! Property-based tests for the deep-merge operation.

use proptest::prelude::*;
use serde_yaml::{Mapping, Value};

use crate::merge::deep_merge;

/// Generate small YAML values with bounded nesting.
fn arb_value(depth: u32) -> BoxedStrategy<Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| Value::Number(n.into())),
        "[a-z]{1,6}".prop_map(Value::String),
    ];
    if depth == 0 {
        leaf.boxed()
    } else {
        prop_oneof![
            3 => leaf,
            1 => arb_mapping(depth - 1).prop_map(Value::Mapping),
        ]
        .boxed()
    }
}

fn arb_mapping(depth: u32) -> BoxedStrategy<Mapping> {
    proptest::collection::btree_map("[a-d]", arb_value(depth), 0..4)
        .prop_map(|entries| {
            entries
                .into_iter()
                .map(|(key, value)| (Value::String(key), value))
                .collect()
        })
        .boxed()
}

fn merged(base: &Mapping, overlay: &Mapping) -> Mapping {
    let mut result = base.clone();
    deep_merge(&mut result, overlay);
    result
}

proptest! {
    #[test]
    fn merge_with_empty_overlay_is_identity(base in arb_mapping(2)) {
        prop_assert_eq!(merged(&base, &Mapping::new()), base);
    }

    #[test]
    fn merge_into_empty_base_is_overlay(overlay in arb_mapping(2)) {
        prop_assert_eq!(merged(&Mapping::new(), &overlay), overlay);
    }

    #[test]
    fn merge_is_idempotent(base in arb_mapping(2), overlay in arb_mapping(2)) {
        let once = merged(&base, &overlay);
        let twice = merged(&once, &overlay);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn overlay_scalar_keys_always_win(base in arb_mapping(2), overlay in arb_mapping(2)) {
        let result = merged(&base, &overlay);
        for (key, value) in &overlay {
            if !value.is_mapping() {
                prop_assert_eq!(result.get(key), Some(value));
            }
        }
    }

    #[test]
    fn keys_only_in_base_survive(base in arb_mapping(2), overlay in arb_mapping(2)) {
        let result = merged(&base, &overlay);
        for (key, value) in &base {
            if !overlay.contains_key(key) {
                prop_assert_eq!(result.get(key), Some(value));
            }
        }
    }

    #[test]
    fn result_keys_are_union(base in arb_mapping(2), overlay in arb_mapping(2)) {
        let result = merged(&base, &overlay);
        for key in base.keys().chain(overlay.keys()) {
            prop_assert!(result.contains_key(key));
        }
        prop_assert!(result
            .keys()
            .all(|key| base.contains_key(key) || overlay.contains_key(key)));
    }
}
