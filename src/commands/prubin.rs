//! # Prubin Command Implementation
//!
//! This module implements the `prubin` subcommand, which deletes the
//! bundle's pruning paths from an existing workspace tree. Not needed when
//! the tree was pruned during `getsrc`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use bundlekit::defaults::default_tree;
use bundlekit::prune::prune;

use crate::cli::BundleArgs;

/// Prune binaries from the source tree
#[derive(Args, Debug)]
pub struct PrubinArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,

    /// Workspace tree to prune
    #[arg(short, long, value_name = "TREE", default_value_os_t = default_tree())]
    pub tree: PathBuf,
}

/// Execute the `prubin` command.
pub fn execute(args: PrubinArgs, resources: &Path) -> Result<()> {
    let bundle = args.bundle.load(resources)?;
    prune(&args.tree, bundle.pruning())?;
    Ok(())
}
