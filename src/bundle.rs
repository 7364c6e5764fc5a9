//! # Config Bundles
//!
//! A [`ConfigBundle`] is the resolved, read-only aggregate every processing
//! step consumes. It comes from one of two places:
//!
//! - **Base bundles** ([`ConfigBundle::from_base_name`]): the dependency
//!   chain is resolved and every layer's component files are merged,
//!   ancestors first. Patch files are shared across base bundles and live in
//!   `<resources>/patches`.
//! - **User bundles** ([`ConfigBundle::from_user_dir`]): a directory written
//!   by [`ConfigBundle::write`]. It is already flattened, carries its own
//!   `patches/` copy and is loaded as-is.
//!
//! Once built, a bundle is never mutated; consumers only see the accessors.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;
use log::{debug, info};

use crate::config::{ArchiveDescriptor, BundleComponentLists, DomainRegex};
use crate::defaults::{BUNDLE_META_INI, PATCHES_DIR};
use crate::error::{Error, Result};
use crate::merge::keyed::{override_keys, override_sections};
use crate::merge::{concat_ordered, concat_unique, union_sets};
use crate::meta::{BaseBundleMeta, MetadataStore};
use crate::resolver::dependency_order;

/// A fully resolved configuration bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBundle {
    name: String,
    display_name: String,
    chain: Vec<String>,
    lists: BundleComponentLists,
    patches_dir: PathBuf,
}

impl ConfigBundle {
    /// Resolve and merge the base bundle `name` from a resources directory.
    pub fn from_base_name(resources: impl AsRef<Path>, name: &str) -> Result<Self> {
        let resources = resources.as_ref();
        let store = MetadataStore::new(resources);
        let meta = store.load(name)?;
        let chain = dependency_order(&store, name)?;
        debug!("Dependency order of {}: {}", name, chain.join(", "));

        let mut layers = Vec::with_capacity(chain.len());
        for layer in &chain {
            let dir = store.bundle_dir(layer)?;
            layers.push(BundleComponentLists::load(&dir)?);
        }

        Ok(Self {
            name: meta.name,
            display_name: meta.display_name,
            chain,
            lists: merge_layers(&layers),
            patches_dir: resources.join(PATCHES_DIR),
        })
    }

    /// Load a materialized user bundle directory.
    pub fn from_user_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::not_found("user bundle", path));
        }
        if !path.is_dir() {
            return Err(Error::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("user_bundle")
            .to_string();
        let meta = BaseBundleMeta::from_file(&name, &path.join(BUNDLE_META_INI))?;
        if !meta.depends.is_empty() {
            return Err(Error::BundleMeta {
                bundle: name,
                message: format!(
                    "user bundles are already flattened but this one depends on {}",
                    meta.depends.join(", ")
                ),
            });
        }

        Ok(Self {
            name: meta.name,
            display_name: meta.display_name,
            chain: vec![name],
            lists: BundleComponentLists::load(path)?,
            patches_dir: path.join(PATCHES_DIR),
        })
    }

    /// Materialize this bundle as a user bundle at `path`.
    ///
    /// The target must be absent or an empty directory. Every listed patch is
    /// copied into `<path>/patches`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            if !path.is_dir() {
                return Err(Error::AlreadyExists {
                    path: path.to_path_buf(),
                    reason: Some("not a directory".to_string()),
                });
            }
            if fs::read_dir(path)?.next().is_some() {
                return Err(Error::AlreadyExists {
                    path: path.to_path_buf(),
                    reason: Some("directory is not empty".to_string()),
                });
            }
        }

        // Check patches before creating anything.
        let patches: BTreeSet<&String> = self.lists.patches.iter().collect();
        for patch in &patches {
            let source = self.patches_dir.join(patch);
            if !source.is_file() {
                return Err(Error::not_found(format!("patch \"{}\"", patch), source));
            }
        }

        fs::create_dir_all(path)?;
        let mut meta = Ini::new();
        meta.with_section(Some("bundle"))
            .set("display_name", self.display_name.as_str());
        meta.write_to_file(path.join(BUNDLE_META_INI))?;
        self.lists.write(path)?;

        let patches_out = path.join(PATCHES_DIR);
        fs::create_dir_all(&patches_out)?;
        for patch in patches {
            let target = patches_out.join(patch);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(self.patches_dir.join(patch), &target)?;
        }

        info!("Wrote bundle {} to {}", self.name, path.display());
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Bundles this one was merged from, ancestors first.
    pub fn dependency_order(&self) -> &[String] {
        &self.chain
    }

    /// Patch paths relative to [`patches_dir`](Self::patches_dir), in
    /// application order.
    pub fn patches(&self) -> &[String] {
        &self.lists.patches
    }

    pub fn patches_dir(&self) -> &Path {
        &self.patches_dir
    }

    pub fn pruning(&self) -> &BTreeSet<String> {
        &self.lists.pruning
    }

    pub fn domain_substitution(&self) -> &BTreeSet<String> {
        &self.lists.domain_substitution
    }

    pub fn domain_regex(&self) -> &[DomainRegex] {
        &self.lists.domain_regex
    }

    pub fn downloads(&self) -> &[ArchiveDescriptor] {
        &self.lists.downloads
    }

    pub fn version(&self) -> &BTreeMap<String, String> {
        &self.lists.version
    }

    pub fn upstream_version(&self) -> Option<&str> {
        self.lists.version.get("upstream_version").map(String::as_str)
    }

    pub fn release_revision(&self) -> Option<&str> {
        self.lists.version.get("release_revision").map(String::as_str)
    }

    pub fn build_flags(&self) -> &BTreeMap<String, String> {
        &self.lists.build_flags
    }
}

/// Fold per-layer components in chain order.
fn merge_layers(layers: &[BundleComponentLists]) -> BundleComponentLists {
    BundleComponentLists {
        patches: concat_ordered(layers.iter().map(|l| l.patches.as_slice())),
        pruning: union_sets(layers.iter().map(|l| &l.pruning)),
        domain_substitution: union_sets(layers.iter().map(|l| &l.domain_substitution)),
        domain_regex: concat_unique(layers.iter().map(|l| l.domain_regex.as_slice())),
        downloads: override_sections(layers.iter().map(|l| l.downloads.as_slice())),
        version: override_keys(layers.iter().map(|l| &l.version)),
        build_flags: override_keys(layers.iter().map(|l| &l.build_flags)),
    }
}
