//! Keyed merge strategies
//!
//! Used for components where a descendant bundle overrides what an ancestor
//! declared under the same name: individual keys (version metadata, build
//! flags) or whole sections (archive descriptors).

use std::collections::BTreeMap;

/// Something identified by a section name in a layered file.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Merge per-layer maps; a later layer wins per key.
pub fn override_keys<'a, I>(layers: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a BTreeMap<String, String>>,
{
    let mut merged = BTreeMap::new();
    for layer in layers {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Merge per-layer section lists; a later layer replaces a section of the
/// same name in place, new sections are appended.
pub fn override_sections<'a, T, I>(layers: I) -> Vec<T>
where
    T: Keyed + Clone + 'a,
    I: IntoIterator<Item = &'a [T]>,
{
    let mut merged: Vec<T> = Vec::new();
    for section in layers.into_iter().flat_map(|layer| layer.iter()) {
        match merged.iter_mut().find(|s| s.key() == section.key()) {
            Some(existing) => *existing = section.clone(),
            None => merged.push(section.clone()),
        }
    }
    merged
}
