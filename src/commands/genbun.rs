//! # Genbun Command Implementation
//!
//! This module implements the `genbun` subcommand, which resolves a base
//! bundle and writes the result as a user bundle: one flattened directory
//! with its own copy of every patch.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use log::info;

use bundlekit::bundle::ConfigBundle;
use bundlekit::defaults::default_user_bundle;

/// Generate a user bundle from a base bundle
#[derive(Args, Debug)]
pub struct GenbunArgs {
    /// Base bundle to resolve
    #[arg(value_name = "NAME")]
    pub base_bundle: String,

    /// Output path for the user bundle; must be absent or empty
    /// [default: buildspace/user_bundle, env: BUNDLEKIT_USER_BUNDLE]
    #[arg(short = 'u', long = "user-bundle", value_name = "PATH")]
    pub user_bundle: Option<PathBuf>,
}

/// Execute the `genbun` command.
pub fn execute(args: GenbunArgs, resources: &Path) -> Result<()> {
    let output = args.user_bundle.unwrap_or_else(default_user_bundle);
    let bundle = ConfigBundle::from_base_name(resources, &args.base_bundle)?;
    info!(
        "Resolved {} from {}",
        bundle.name(),
        bundle.dependency_order().join(" -> ")
    );
    bundle.write(&output)?;
    Ok(())
}
