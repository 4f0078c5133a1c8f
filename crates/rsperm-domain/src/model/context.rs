//! Context sets: multi-valued key/value filters describing situational scope.
//!
//! A context set tags a node with the circumstances it applies under
//! (`server=survival`, `world=nether`) and also describes the situation a
//! query is made from. Keys and values are case-normalized on insertion and
//! the backing collections are ordered, so two sets with the same pairs are
//! equal, hash identically and serialize identically, so a context set is
//! usable directly as a cache-key component.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// An immutable multi-map of context key -> accepted values.
///
/// The empty set is the "global" context: it matches every query and is
/// matched by every node filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextSet {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl ContextSet {
    /// Returns the empty (global) context set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts building a context set.
    pub fn builder() -> ContextSetBuilder {
        ContextSetBuilder::default()
    }

    /// Builds a single-pair context set.
    pub fn of(key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        Self::builder().add(key, value).build()
    }

    /// Returns true if this set carries no pairs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of distinct (key, value) pairs.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    /// Returns true if the given key is present (case-insensitive).
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize(key))
    }

    /// Returns the accepted values for a key, if any.
    pub fn values(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(&normalize(key))
    }

    /// Iterates over (key, values) in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns true if this set, used as a node filter, is satisfied by the
    /// given query context.
    ///
    /// Match rule: every key present here must have at least one accepted
    /// value present in the query's value set for that key. A key absent
    /// from this set is a wildcard, so the empty set matches everything.
    pub fn satisfied_by(&self, query: &ContextSet) -> bool {
        self.entries.iter().all(|(key, accepted)| {
            query
                .entries
                .get(key)
                .is_some_and(|offered| !accepted.is_disjoint(offered))
        })
    }
}

impl fmt::Display for ContextSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "global");
        }
        let mut first = true;
        for (key, values) in &self.entries {
            for value in values {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Builder for [`ContextSet`]. The built set is immutable.
#[derive(Debug, Clone, Default)]
pub struct ContextSetBuilder {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl ContextSetBuilder {
    /// Adds a (key, value) pair. Both sides are case-normalized and
    /// trimmed; a key may accumulate multiple values.
    pub fn add(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let key = normalize(key.as_ref());
        let value = normalize(value.as_ref());
        if !key.is_empty() && !value.is_empty() {
            self.entries.entry(key).or_default().insert(value);
        }
        self
    }

    /// Merges every pair of another context set into this builder.
    pub fn add_all(mut self, other: &ContextSet) -> Self {
        for (key, values) in other.iter() {
            for value in values {
                self = self.add(key, value);
            }
        }
        self
    }

    /// Finishes the build.
    pub fn build(self) -> ContextSet {
        ContextSet {
            entries: self.entries,
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_matches_everything() {
        let global = ContextSet::empty();
        let query = ContextSet::builder()
            .add("server", "survival")
            .add("world", "nether")
            .build();

        assert!(global.satisfied_by(&query));
        assert!(global.satisfied_by(&ContextSet::empty()));
    }

    #[test]
    fn test_subset_match_rule() {
        // {server: [survival]} matches a query offering
        // {server: [survival, creative]} but not {server: [creative]}.
        let filter = ContextSet::of("server", "survival");
        let wide_query = ContextSet::builder()
            .add("server", "survival")
            .add("server", "creative")
            .build();
        let narrow_query = ContextSet::of("server", "creative");

        assert!(filter.satisfied_by(&wide_query));
        assert!(!filter.satisfied_by(&narrow_query));
    }

    #[test]
    fn test_absent_key_is_wildcard() {
        let filter = ContextSet::of("world", "nether");
        let query = ContextSet::builder()
            .add("world", "nether")
            .add("server", "survival")
            .build();

        // The filter says nothing about "server", so the extra query key
        // does not prevent a match.
        assert!(filter.satisfied_by(&query));
    }

    #[test]
    fn test_missing_query_key_fails() {
        let filter = ContextSet::of("world", "nether");
        assert!(!filter.satisfied_by(&ContextSet::empty()));
    }

    #[test]
    fn test_keys_and_values_case_normalized() {
        let a = ContextSet::of("Server", "SURVIVAL");
        let b = ContextSet::of("server", "survival");

        assert_eq!(a, b);
        assert!(a.satisfied_by(&b));
        assert!(a.contains_key("SERVER"));
    }

    #[test]
    fn test_multi_valued_key() {
        let filter = ContextSet::builder()
            .add("world", "nether")
            .add("world", "end")
            .build();

        assert_eq!(filter.len(), 2);
        assert!(filter.satisfied_by(&ContextSet::of("world", "end")));
        assert!(filter.satisfied_by(&ContextSet::of("world", "nether")));
        assert!(!filter.satisfied_by(&ContextSet::of("world", "overworld")));
    }

    #[test]
    fn test_blank_pairs_dropped() {
        let set = ContextSet::builder().add("", "x").add("k", "  ").build();
        assert!(set.is_empty());
    }

    #[test]
    fn test_serde_round_trip() {
        let set = ContextSet::builder()
            .add("server", "survival")
            .add("world", "nether")
            .add("world", "end")
            .build();

        let json = serde_json::to_string(&set).unwrap();
        let back: ContextSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }
}
