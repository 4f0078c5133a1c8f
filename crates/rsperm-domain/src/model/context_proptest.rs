//! Property-based tests for context set matching.

use proptest::prelude::*;

use crate::model::{ContextSet, ContextSetBuilder};

/// Strategy for context keys.
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,8}"
}

/// Strategy for context values.
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,10}"
}

/// Strategy for arbitrary context sets of up to 4 pairs.
fn context_set_strategy() -> impl Strategy<Value = ContextSet> {
    proptest::collection::vec((key_strategy(), value_strategy()), 0..4).prop_map(|pairs| {
        pairs
            .into_iter()
            .fold(ContextSet::builder(), |b, (k, v)| b.add(k, v))
            .build()
    })
}

proptest! {
    #[test]
    fn empty_filter_matches_any_query(query in context_set_strategy()) {
        prop_assert!(ContextSet::empty().satisfied_by(&query));
    }

    #[test]
    fn filter_satisfied_by_itself(set in context_set_strategy()) {
        prop_assert!(set.satisfied_by(&set));
    }

    #[test]
    fn widening_the_query_never_breaks_a_match(
        filter in context_set_strategy(),
        query in context_set_strategy(),
        extra_key in key_strategy(),
        extra_value in value_strategy(),
    ) {
        // Adding pairs to the query can only add accepted values, never
        // remove them, so a satisfied filter must stay satisfied.
        if filter.satisfied_by(&query) {
            let widened = ContextSetBuilder::default()
                .add_all(&query)
                .add(extra_key, extra_value)
                .build();
            prop_assert!(filter.satisfied_by(&widened));
        }
    }

    #[test]
    fn case_of_insertion_is_irrelevant(
        key in key_strategy(),
        value in value_strategy(),
    ) {
        let lower = ContextSet::of(&key, &value);
        let upper = ContextSet::of(key.to_ascii_uppercase(), value.to_ascii_uppercase());
        prop_assert_eq!(lower, upper);
    }

    #[test]
    fn non_empty_filter_never_satisfied_by_empty_query(set in context_set_strategy()) {
        if !set.is_empty() {
            prop_assert!(!set.satisfied_by(&ContextSet::empty()));
        }
    }
}
