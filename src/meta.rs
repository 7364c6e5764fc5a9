//! # Bundle Metadata Store
//!
//! Base bundles live in `<resources>/config_bundles/<name>/`. Each carries a
//! `bundlemeta.ini` descriptor naming the bundle for humans and listing its
//! direct parents:
//!
//! ```ini
//! [bundle]
//! display_name = Linux (portable)
//! depends = common, linux_rooted
//! ```
//!
//! The store only reads. Descriptors are loaded fresh on every lookup, so a
//! resolution always reflects what is on disk.

use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;
use log::debug;

use crate::config::load_ini;
use crate::defaults::{BUNDLE_META_INI, CONFIG_BUNDLES_DIR};
use crate::error::{Error, Result};

const META_SECTION: &str = "bundle";

/// Descriptor of a base bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseBundleMeta {
    /// Directory name of the bundle
    pub name: String,
    /// Human readable name
    pub display_name: String,
    /// Direct parents, in declared order
    pub depends: Vec<String>,
}

impl BaseBundleMeta {
    /// Read a descriptor file for the bundle called `name`.
    pub fn from_file(name: &str, path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::BundleMeta {
                bundle: name.to_string(),
                message: format!("missing descriptor {}", path.display()),
            });
        }
        let ini = load_ini(path)?;
        Self::from_ini(name, &ini)
    }

    pub(crate) fn from_ini(name: &str, ini: &Ini) -> Result<Self> {
        let section = ini
            .section(Some(META_SECTION))
            .ok_or_else(|| Error::BundleMeta {
                bundle: name.to_string(),
                message: format!("missing [{}] section", META_SECTION),
            })?;

        let display_name = section
            .get("display_name")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::BundleMeta {
                bundle: name.to_string(),
                message: "missing display_name".to_string(),
            })?
            .to_string();

        let mut depends: Vec<String> = Vec::new();
        for parent in section
            .get("depends")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            validate_bundle_name(parent)?;
            if parent == name {
                return Err(Error::ResolutionCycle {
                    bundle: name.to_string(),
                    cycle: format!("{} -> {}", name, name),
                });
            }
            if depends.iter().any(|d| d == parent) {
                return Err(Error::BundleMeta {
                    bundle: name.to_string(),
                    message: format!("parent \"{}\" is listed twice", parent),
                });
            }
            depends.push(parent.to_string());
        }

        Ok(Self {
            name: name.to_string(),
            display_name,
            depends,
        })
    }
}

/// Reject names that would point outside the bundles root.
pub fn validate_bundle_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::BundleMeta {
            bundle: name.to_string(),
            message: "bundle names must be plain directory names".to_string(),
        });
    }
    Ok(())
}

/// Read access to the base bundles under a resources directory
#[derive(Debug, Clone)]
pub struct MetadataStore {
    bundles_root: PathBuf,
}

impl MetadataStore {
    /// Create a store for `<resources>/config_bundles`.
    pub fn new(resources: impl AsRef<Path>) -> Self {
        Self {
            bundles_root: resources.as_ref().join(CONFIG_BUNDLES_DIR),
        }
    }

    pub fn bundles_root(&self) -> &Path {
        &self.bundles_root
    }

    /// Locate the directory of a base bundle.
    ///
    /// Fails with `NotADirectory` if the bundles root itself is missing and
    /// `NotFound` if the named bundle does not exist.
    pub fn bundle_dir(&self, name: &str) -> Result<PathBuf> {
        if !self.bundles_root.is_dir() {
            return Err(Error::NotADirectory {
                path: self.bundles_root.clone(),
            });
        }
        validate_bundle_name(name)?;
        let dir = self.bundles_root.join(name);
        if !dir.is_dir() {
            return Err(Error::not_found(format!("base bundle \"{}\"", name), dir));
        }
        Ok(dir)
    }

    /// Whether a base bundle with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        validate_bundle_name(name).is_ok() && self.bundles_root.join(name).is_dir()
    }

    /// Load the descriptor of a base bundle.
    pub fn load(&self, name: &str) -> Result<BaseBundleMeta> {
        let dir = self.bundle_dir(name)?;
        debug!("Loading bundle descriptor for {}", name);
        BaseBundleMeta::from_file(name, &dir.join(BUNDLE_META_INI))
    }

    /// List all base bundles, sorted by name.
    pub fn list(&self) -> Result<Vec<BaseBundleMeta>> {
        if !self.bundles_root.is_dir() {
            return Err(Error::NotADirectory {
                path: self.bundles_root.clone(),
            });
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.bundles_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        names.iter().map(|name| self.load(name)).collect()
    }
}
