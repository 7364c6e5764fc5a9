//! Default values and well-known file names.
//!
//! This module centralizes the on-disk bundle layout and the default
//! buildspace locations used by the commands, so the library and the CLI
//! agree on them.

use std::path::PathBuf;

/// Environment variable overriding the resources directory.
pub const RESOURCES_ENV: &str = "BUNDLEKIT_RESOURCES";

/// Environment variable overriding the default user bundle path.
pub const USER_BUNDLE_ENV: &str = "BUNDLEKIT_USER_BUNDLE";

/// Directory under the resources root holding the base bundles.
pub const CONFIG_BUNDLES_DIR: &str = "config_bundles";

/// Directory holding patch files (under the resources root for base bundles,
/// under the bundle itself for user bundles).
pub const PATCHES_DIR: &str = "patches";

pub const BUNDLE_META_INI: &str = "bundlemeta.ini";
pub const PATCH_ORDER_LIST: &str = "patch_order.list";
pub const PRUNING_LIST: &str = "pruning.list";
pub const DOMAIN_SUBSTITUTION_LIST: &str = "domain_substitution.list";
pub const DOMAIN_REGEX_LIST: &str = "domain_regex.list";
pub const DOWNLOADS_INI: &str = "downloads.ini";
pub const VERSION_INI: &str = "version.ini";
pub const BUILD_FLAGS_MAP: &str = "build_flags.map";

const BUILDSPACE: &str = "buildspace";

/// Returns the resources directory used when neither `--resources` nor
/// `BUNDLEKIT_RESOURCES` is given.
pub fn default_resources_dir() -> PathBuf {
    PathBuf::from("resources")
}

/// Returns the default user bundle path (`buildspace/user_bundle`).
///
/// `BUNDLEKIT_USER_BUNDLE` takes precedence when set.
pub fn default_user_bundle() -> PathBuf {
    std::env::var_os(USER_BUNDLE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(BUILDSPACE).join("user_bundle"))
}

/// Returns the default workspace tree path (`buildspace/tree`).
pub fn default_tree() -> PathBuf {
    PathBuf::from(BUILDSPACE).join("tree")
}

/// Returns the default downloads directory (`buildspace/downloads`).
pub fn default_downloads() -> PathBuf {
    PathBuf::from(BUILDSPACE).join("downloads")
}

/// Returns the default domain substitution cache path.
pub fn default_domain_cache() -> PathBuf {
    PathBuf::from(BUILDSPACE).join("domsubcache.tar.gz")
}
