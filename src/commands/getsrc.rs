//! # Getsrc Command Implementation
//!
//! This module implements the `getsrc` subcommand, which downloads, verifies
//! and unpacks the bundle's source archives into the workspace tree.
//!
//! ## Functionality
//!
//! - **Download**: only archives missing from the downloads directory are
//!   fetched; the directory must already exist.
//! - **Verification**: every archive is checked against its digest before
//!   anything is unpacked.
//! - **Extraction**: into a tree that must not exist yet, with binary
//!   pruning unless `--disable-binary-pruning` is given.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use log::info;

use bundlekit::defaults::{default_downloads, default_tree};
use bundlekit::retrieval::extract::ExtractorPaths;
use bundlekit::retrieval::{retrieve_and_extract, RetrievalOptions};

use crate::cli::BundleArgs;

/// Download, verify and extract the source archives
#[derive(Args, Debug)]
pub struct GetsrcArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,

    /// Workspace tree to create
    #[arg(short, long, value_name = "TREE", default_value_os_t = default_tree())]
    pub tree: PathBuf,

    /// Directory holding downloaded archives
    #[arg(short, long, value_name = "DIR", default_value_os_t = default_downloads())]
    pub downloads: PathBuf,

    /// Do not prune binaries while extracting
    #[arg(long)]
    pub disable_binary_pruning: bool,

    /// Hide download progress
    #[arg(long)]
    pub hide_progress_bar: bool,

    /// Command or path of the tar binary used for compressions not handled
    /// in-process
    #[arg(long, value_name = "PATH", default_value = "tar")]
    pub tar_path: PathBuf,

    /// Command or path of the 7-Zip binary
    #[arg(long = "7z-path", value_name = "PATH", default_value = "7z")]
    pub sevenzip_path: PathBuf,

    /// Accept any TLS certificate when downloading
    #[arg(long)]
    pub disable_ssl_verification: bool,
}

/// Execute the `getsrc` command.
pub fn execute(args: GetsrcArgs, resources: &Path) -> Result<()> {
    let bundle = args.bundle.load(resources)?;
    let options = RetrievalOptions {
        prune: !args.disable_binary_pruning,
        show_progress: !args.hide_progress_bar,
        extractors: ExtractorPaths {
            tar: args.tar_path,
            sevenzip: args.sevenzip_path,
        },
        ssl_verify: !args.disable_ssl_verification,
    };

    info!(
        "Retrieving {} archive(s) for {}",
        bundle.downloads().len(),
        bundle.display_name()
    );
    retrieve_and_extract(&bundle, &args.downloads, &args.tree, &options)?;
    info!("Source tree ready at {}", args.tree.display());
    Ok(())
}
