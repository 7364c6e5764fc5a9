//! Binary pruning
//!
//! Deletes prebuilt binaries and other unwanted files from the workspace
//! tree. Paths come from the bundle's pruning set and are relative to the
//! tree root. Symlinks are removed themselves, never followed, so dangling
//! links are pruned too.
//!
//! Pruning is not transactional: a failure stops the pass, and whatever was
//! already deleted stays deleted. Re-running is the recovery path.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, info, warn};

use crate::error::{Error, Result};

/// Delete every path of `pruning` under `tree_root`.
///
/// Paths that do not exist are logged and counted; if any were missing the
/// call fails with [`Error::PartialPruneFailure`] after the other deletions
/// have been made.
pub fn prune(tree_root: &Path, pruning: &BTreeSet<String>) -> Result<()> {
    if !tree_root.exists() {
        return Err(Error::not_found("source tree", tree_root));
    }
    let mut pending = pruning.clone();
    let removed = prune_existing(tree_root, &mut pending)?;
    info!("Pruned {} of {} files", removed, pruning.len());
    report_missing(&pending)
}

/// Delete the paths of `pending` that currently exist, taking them out of
/// the set. Returns how many were removed.
///
/// Used between archive extractions, where a path may only show up once a
/// later archive is unpacked.
pub fn prune_existing(tree_root: &Path, pending: &mut BTreeSet<String>) -> Result<usize> {
    let mut removed = Vec::new();
    for relative in pending.iter() {
        let path = tree_root.join(relative);
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if metadata.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        debug!("Pruned {}", relative);
        removed.push(relative.clone());
    }
    for relative in &removed {
        pending.remove(relative);
    }
    Ok(removed.len())
}

/// Warn about every path that was never found and fail if there were any.
pub fn report_missing(missing: &BTreeSet<String>) -> Result<()> {
    if missing.is_empty() {
        return Ok(());
    }
    for path in missing {
        warn!("Path to prune does not exist: {}", path);
    }
    Err(Error::PartialPruneFailure {
        missing: missing.len(),
    })
}
