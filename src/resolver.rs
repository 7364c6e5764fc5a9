//! # Bundle Resolver
//!
//! Computes the dependency order of a base bundle: every ancestor appears
//! before the bundles that declare it as a parent, and each bundle appears
//! exactly once. Layers are later merged in this order, so a descendant can
//! extend or override what its ancestors declared.
//!
//! ## Process
//!
//! 1.  **Depth-First Traversal**: parents are visited in declared order
//!     before the bundle itself is emitted (post-order).
//!
//! 2.  **Cycle Detection**: the bundles currently being resolved form an
//!     explicit stack. Meeting one of them again means the graph has a cycle;
//!     resolution fails naming the bundle and the path that closes the loop.
//!
//! 3.  **Missing Parents**: a declared parent that does not exist fails the
//!     whole resolution. No partial chain is ever returned.
//!
//! Parent declarations come through the [`ParentLookup`] trait so the walk
//! can run against the on-disk [`MetadataStore`] or an in-memory
//! [`BundleGraph`].

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::meta::MetadataStore;

/// Source of parent declarations
pub trait ParentLookup {
    /// Whether a bundle with this name exists.
    fn contains(&self, name: &str) -> bool;

    /// Direct parents of a bundle, in declared order.
    fn parents(&self, name: &str) -> Result<Vec<String>>;
}

impl ParentLookup for MetadataStore {
    fn contains(&self, name: &str) -> bool {
        MetadataStore::contains(self, name)
    }

    fn parents(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.load(name)?.depends)
    }
}

/// In-memory bundle graph mapping a name to its parent names
#[derive(Debug, Clone, Default)]
pub struct BundleGraph {
    parents: HashMap<String, Vec<String>>,
}

impl BundleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a bundle and its direct parents.
    pub fn insert<S: Into<String>>(&mut self, name: S, parents: Vec<String>) {
        self.parents.insert(name.into(), parents);
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl ParentLookup for BundleGraph {
    fn contains(&self, name: &str) -> bool {
        self.parents.contains_key(name)
    }

    fn parents(&self, name: &str) -> Result<Vec<String>> {
        self.parents
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("base bundle \"{}\"", name), name))
    }
}

/// Resolve the dependency order of `name`, ancestors first.
///
/// The returned chain ends with `name` itself.
pub fn dependency_order<L: ParentLookup + ?Sized>(lookup: &L, name: &str) -> Result<Vec<String>> {
    let mut order = Vec::new();
    let mut resolving = Vec::new();
    let mut done = HashSet::new();

    // The root is looked up directly so a missing root reports NotFound
    // rather than a missing dependency.
    let root_parents = lookup.parents(name)?;
    visit(
        lookup,
        name,
        root_parents,
        &mut resolving,
        &mut done,
        &mut order,
    )?;

    Ok(order)
}

fn visit<L: ParentLookup + ?Sized>(
    lookup: &L,
    name: &str,
    parents: Vec<String>,
    resolving: &mut Vec<String>,
    done: &mut HashSet<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    resolving.push(name.to_string());

    for parent in parents {
        if done.contains(&parent) {
            continue;
        }
        if let Some(start) = resolving.iter().position(|n| *n == parent) {
            let mut cycle: Vec<&str> = resolving[start..].iter().map(String::as_str).collect();
            cycle.push(&parent);
            return Err(Error::ResolutionCycle {
                bundle: parent.clone(),
                cycle: cycle.join(" -> "),
            });
        }
        if !lookup.contains(&parent) {
            return Err(Error::MissingDependency {
                bundle: name.to_string(),
                dependency: parent,
            });
        }
        let grandparents = lookup.parents(&parent)?;
        visit(lookup, &parent, grandparents, resolving, done, order)?;
    }

    resolving.pop();
    done.insert(name.to_string());
    order.push(name.to_string());
    Ok(())
}
