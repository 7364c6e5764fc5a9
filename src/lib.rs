//! # bundlekit
//!
//! This library prepares a customized build of a large upstream codebase
//! from layered configuration bundles. It backs the `bundlekit`
//! command-line tool but can be used on its own, for example by packaging
//! generators that only need the resolved bundle.
//!
//! ## Quick Example
//!
//! ```no_run
//! use bundlekit::bundle::ConfigBundle;
//!
//! let bundle = ConfigBundle::from_base_name("resources", "linux_portable")?;
//! for patch in bundle.patches() {
//!     println!("{}", patch);
//! }
//! # Ok::<(), bundlekit::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Bundle metadata (`meta`)**: descriptors of the base bundles under
//!   `<resources>/config_bundles`, naming each bundle's parents.
//! - **Resolution (`resolver`)**: the dependency order of a bundle, with
//!   cycle and missing-parent detection.
//! - **Component files (`config`) and merging (`merge`)**: the per-layer
//!   lists and how layers fold into one bundle.
//! - **Config bundles (`bundle`)**: the resolved, read-only aggregate.
//! - **Retrieval (`retrieval`)**: download, digest verification and
//!   extraction of source archives.
//! - **Pruning (`prune`)** and **domain substitution
//!   (`domain_substitution`)**: in-place tree mutations.
//!
//! ## Execution Flow
//!
//! 1.  **Resolve**: load a base bundle chain or a materialized user bundle.
//! 2.  **Retrieve**: fetch, verify and unpack the archives into a new tree,
//!     pruning as archives are unpacked.
//! 3.  **Prune**: delete binaries from an existing tree.
//! 4.  **Substitute**: rewrite domains in the tree and patches, keeping a
//!     cache to revert the tree.
//!
//! Each step is a separate, restartable command.

pub mod bundle;
pub mod config;
pub mod defaults;
pub mod domain_substitution;
pub mod error;
pub mod merge;
pub mod meta;
pub mod path;
pub mod prune;
pub mod resolver;
pub mod retrieval;

#[cfg(test)]
mod path_proptest;
#[cfg(test)]
mod resolver_proptest;
#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
