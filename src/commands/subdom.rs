//! # Subdom Command Implementation
//!
//! This module implements the `subdom` subcommand, which substitutes domain
//! names in the workspace tree and in the bundle's patches. Both are
//! processed unless `--only` narrows it down. `--revert` restores the tree
//! from the substitution cache.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use log::info;

use bundlekit::defaults::{default_domain_cache, default_tree};
use bundlekit::domain_substitution::{process_patches, process_tree, revert_tree};

use crate::cli::BundleArgs;

/// What to apply domain substitution to
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// The workspace tree
    Tree,
    /// The bundle's patches
    Patches,
}

/// Substitute domain names in the source tree or patches
#[derive(Args, Debug)]
pub struct SubdomArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,

    /// Only process this component
    #[arg(short = 'o', long = "only", value_enum, value_name = "TARGET")]
    pub only: Option<Target>,

    /// Workspace tree to process
    #[arg(short, long, value_name = "TREE", default_value_os_t = default_tree())]
    pub tree: PathBuf,

    /// Substitution cache; written on substitution, consumed on revert
    #[arg(short, long, value_name = "CACHE", default_value_os_t = default_domain_cache())]
    pub cache: PathBuf,

    /// Restore the tree from the cache instead of substituting
    #[arg(long)]
    pub revert: bool,
}

/// Execute the `subdom` command.
pub fn execute(args: SubdomArgs, resources: &Path) -> Result<()> {
    if args.revert {
        if args.only == Some(Target::Patches) {
            bail!("--revert only applies to the tree; regenerate the user bundle to restore patches");
        }
        let restored = revert_tree(&args.tree, &args.cache)?;
        info!("Restored {} file(s) in {}", restored, args.tree.display());
        return Ok(());
    }

    let bundle = args.bundle.load(resources)?;
    if args.only != Some(Target::Patches) {
        process_tree(&bundle, &args.tree, &args.cache)?;
    }
    if args.only != Some(Target::Tree) {
        process_patches(&bundle)?;
    }
    Ok(())
}
