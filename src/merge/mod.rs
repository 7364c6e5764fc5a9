//! Merge strategies for layered bundle components
//!
//! A resolved bundle is built by folding every layer of its dependency chain,
//! ancestors first. Each artifact kind has its own, explicitly named merge
//! operation:
//!
//! | artifact | strategy |
//! |----------|----------|
//! | patch order | [`concat_ordered`]: order and repetition survive |
//! | pruning paths, domain substitution specs | [`union_sets`]: duplicates collapse |
//! | domain regex rules | [`concat_unique`]: chain order, first occurrence wins |
//! | archive descriptors | [`keyed::override_sections`]: later layer replaces by name |
//! | version metadata, build flags | [`keyed::override_keys`]: later layer wins per key |
//!
//! The strategies operate on per-layer slices in chain order and know nothing
//! about bundles, so each can be tested on its own.

pub mod keyed;

use std::collections::BTreeSet;

/// Concatenate per-layer lists in chain order, keeping repeats.
pub fn concat_ordered<'a, T, I>(layers: I) -> Vec<T>
where
    T: Clone + 'a,
    I: IntoIterator<Item = &'a [T]>,
{
    layers
        .into_iter()
        .flat_map(|layer| layer.iter().cloned())
        .collect()
}

/// Union per-layer sets; each entry appears once.
pub fn union_sets<'a, T, I>(layers: I) -> BTreeSet<T>
where
    T: Clone + Ord + 'a,
    I: IntoIterator<Item = &'a BTreeSet<T>>,
{
    layers
        .into_iter()
        .flat_map(|layer| layer.iter().cloned())
        .collect()
}

/// Concatenate per-layer lists in chain order, dropping later duplicates.
pub fn concat_unique<'a, T, I>(layers: I) -> Vec<T>
where
    T: Clone + PartialEq + 'a,
    I: IntoIterator<Item = &'a [T]>,
{
    let mut merged: Vec<T> = Vec::new();
    for item in layers.into_iter().flat_map(|layer| layer.iter()) {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_concat_ordered_preserves_repeats_and_order() {
        let base = vec!["p1".to_string(), "p2".to_string()];
        let child = vec!["p2".to_string(), "p3".to_string()];
        let merged = concat_ordered([base.as_slice(), child.as_slice()]);
        assert_eq!(merged, vec!["p1", "p2", "p2", "p3"]);
    }

    #[test]
    fn test_concat_ordered_empty_layers() {
        let empty: Vec<String> = Vec::new();
        let merged = concat_ordered([empty.as_slice(), empty.as_slice()]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_union_sets_collapses_duplicates() {
        let base = set(&["x/y"]);
        let child = set(&["x/y", "z"]);
        let merged = union_sets([&base, &child]);
        assert_eq!(merged, set(&["x/y", "z"]));
    }

    #[test]
    fn test_union_sets_is_order_independent() {
        let a = set(&["a", "b"]);
        let b = set(&["c", "a"]);
        assert_eq!(union_sets([&a, &b]), union_sets([&b, &a]));
    }

    #[test]
    fn test_concat_unique_keeps_first_occurrence() {
        let base = vec!["r1", "r2"];
        let child = vec!["r3", "r1"];
        let merged = concat_unique([base.as_slice(), child.as_slice()]);
        assert_eq!(merged, vec!["r1", "r2", "r3"]);
    }
}
