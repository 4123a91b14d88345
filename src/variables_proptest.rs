//! Property-based tests for the variable store and tag substitution.
//!
//! These tests use proptest to generate random stores and documents and
//! verify that the overlay and hydration invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::hydrate::{hydrate, interpolate};
    use crate::variables::{Variable, Variables};
    use proptest::collection::{btree_set, vec};
    use proptest::prelude::*;
    use serde_yaml::Value;

    fn store(names: &[String]) -> Variables {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Variable::new(name.clone(), i as i64))
            .collect()
    }

    fn names(store: &Variables) -> Vec<String> {
        store.iter().map(|v| v.name.clone()).collect()
    }

    // ============================================================================
    // overlay property tests
    // ============================================================================

    proptest! {
        /// Property: existing names keep their position, new names are appended
        /// in arrival order
        #[test]
        fn overlay_preserves_order_and_appends(
            base in btree_set("[a-z]{1,6}", 0..8),
            incoming in btree_set("[a-z]{1,6}", 0..8),
        ) {
            let base: Vec<String> = base.into_iter().collect();
            let incoming: Vec<String> = incoming.into_iter().collect();
            let mut merged = store(&base);
            merged.overlay(store(&incoming)).unwrap();

            let mut expected = base.clone();
            expected.extend(incoming.iter().filter(|n| !base.contains(n)).cloned());
            prop_assert_eq!(names(&merged), expected);
        }

        /// Property: after an overlay every incoming name resolves to the
        /// incoming value
        #[test]
        fn overlay_incoming_value_wins(
            base in btree_set("[a-z]{1,6}", 0..8),
            incoming in btree_set("[a-z]{1,6}", 1..8),
        ) {
            let base: Vec<String> = base.into_iter().collect();
            let mut merged = store(&base);
            let incoming: Vec<Variable> = incoming
                .into_iter()
                .map(|name| Variable::new(name.clone(), format!("new-{}", name)))
                .collect();
            merged.overlay(incoming.clone()).unwrap();

            for variable in &incoming {
                prop_assert_eq!(merged.get(&variable.name), Some(&variable.value));
            }
        }

        /// Property: overlaying a store onto itself changes nothing
        #[test]
        fn overlay_with_self_is_identity(base in btree_set("[a-z]{1,6}", 0..8)) {
            let base: Vec<String> = base.into_iter().collect();
            let original = store(&base);
            let mut merged = original.clone();
            merged.overlay(original.clone()).unwrap();
            prop_assert_eq!(merged, original);
        }

        /// Property: a dotted overlay only touches the addressed leaf
        #[test]
        fn dotted_overlay_touches_only_leaf(
            keys in btree_set("[a-z]{1,6}", 2..6),
            value in any::<i64>(),
        ) {
            let keys: Vec<String> = keys.into_iter().collect();
            let mut nested = serde_yaml::Mapping::new();
            for key in &keys {
                nested.insert(Value::String(key.clone()), Value::String(key.clone()));
            }
            let mut merged: Variables = vec![Variable::new("root", Value::Mapping(nested))]
                .into_iter()
                .collect();

            let target = format!("root.{}", keys[0]);
            merged.overlay(vec![Variable::new(target.clone(), value)]).unwrap();

            prop_assert_eq!(merged.get(&target), Some(&Value::from(value)));
            for key in &keys[1..] {
                let path = format!("root.{}", key);
                prop_assert_eq!(merged.get(&path), Some(&Value::String(key.clone())));
            }
        }
    }

    // ============================================================================
    // hydration property tests
    // ============================================================================

    proptest! {
        /// Property: text without tags is returned unchanged
        #[test]
        fn interpolate_without_tags_is_identity(text in "[^<]*") {
            let vars = Value::Mapping(serde_yaml::Mapping::new());
            prop_assert_eq!(interpolate(&text, &vars).unwrap(), text);
        }

        /// Property: a whole-tag integer scalar keeps its integer type
        #[test]
        fn whole_tag_integer_keeps_type(number in any::<i64>()) {
            let vars: Value = serde_yaml::from_str(&format!("n: {}", number)).unwrap();
            let out = hydrate("value: <[n]>\n", &vars).unwrap();
            let parsed: Value = serde_yaml::from_str(&out).unwrap();
            prop_assert_eq!(&parsed["value"], &Value::from(number));
        }

        /// Property: a tag embedded in text always yields a string
        #[test]
        fn embedded_tag_yields_string(word in "[a-z]{1,8}", number in 0u32..100_000) {
            let vars: Value = serde_yaml::from_str(&format!("n: {}", number)).unwrap();
            let out = hydrate(&format!("value: {}-<[n]>\n", word), &vars).unwrap();
            let parsed: Value = serde_yaml::from_str(&out).unwrap();
            prop_assert_eq!(&parsed["value"], &Value::String(format!("{}-{}", word, number)));
        }

        /// Property: every listed value is reachable through its index
        #[test]
        fn list_items_resolve_by_index(items in vec("[a-z]{1,8}", 1..6)) {
            let variables: Variables = vec![Variable::new(
                "items",
                Value::Sequence(items.iter().cloned().map(Value::String).collect()),
            )]
            .into_iter()
            .collect();
            for (i, item) in items.iter().enumerate() {
                let path = format!("items.{}", i);
                prop_assert_eq!(variables.get(&path), Some(&Value::String(item.clone())));
            }
        }
    }
}
