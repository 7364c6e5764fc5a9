//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use env_logger::Env;

use bundlekit::bundle::ConfigBundle;
use bundlekit::defaults::{default_resources_dir, default_user_bundle, RESOURCES_ENV};

use crate::commands;

/// bundlekit - Prepare upstream sources from layered config bundles
#[derive(Parser, Debug)]
#[command(name = "bundlekit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Directory holding config_bundles/ and patches/
    #[arg(long, global = true, value_name = "DIR", env = RESOURCES_ENV, default_value_os_t = default_resources_dir())]
    resources: PathBuf,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show information about base bundles
    Bunnfo(commands::bunnfo::BunnfoArgs),

    /// Generate a user bundle from a base bundle
    Genbun(commands::genbun::GenbunArgs),

    /// Download, verify and extract the source archives
    Getsrc(commands::getsrc::GetsrcArgs),

    /// Prune binaries from the source tree
    Prubin(commands::prubin::PrubinArgs),

    /// Substitute domain names in the source tree or patches
    Subdom(commands::subdom::SubdomArgs),
}

/// Bundle selection shared by the processing commands
#[derive(Args, Debug, Clone, Default)]
pub struct BundleArgs {
    /// Base bundle to use
    #[arg(short = 'b', long = "base-bundle", value_name = "NAME", conflicts_with = "user_bundle")]
    pub base_bundle: Option<String>,

    /// User bundle directory to use [default: buildspace/user_bundle,
    /// env: BUNDLEKIT_USER_BUNDLE]
    #[arg(short = 'u', long = "user-bundle", value_name = "PATH")]
    pub user_bundle: Option<PathBuf>,
}

impl BundleArgs {
    /// Load the selected bundle; the default user bundle if none is named.
    pub fn load(&self, resources: &std::path::Path) -> bundlekit::Result<ConfigBundle> {
        match (&self.base_bundle, &self.user_bundle) {
            (Some(name), _) => ConfigBundle::from_base_name(resources, name),
            (None, Some(path)) => ConfigBundle::from_user_dir(path),
            (None, None) => ConfigBundle::from_user_dir(default_user_bundle()),
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(Env::default().default_filter_or(&self.log_level))
            .format_timestamp(None)
            .init();

        let resources = self.resources;
        match self.command {
            Commands::Bunnfo(args) => commands::bunnfo::execute(args, &resources),
            Commands::Genbun(args) => commands::genbun::execute(args, &resources),
            Commands::Getsrc(args) => commands::getsrc::execute(args, &resources),
            Commands::Prubin(args) => commands::prubin::execute(args, &resources),
            Commands::Subdom(args) => commands::subdom::execute(args, &resources),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_base_and_user_bundle_conflict() {
        let result = Cli::try_parse_from([
            "bundlekit", "prubin", "-b", "linux", "-u", "buildspace/user_bundle",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_resources_after_subcommand() {
        let cli = Cli::try_parse_from(["bundlekit", "bunnfo", "--list", "--resources", "res"]).unwrap();
        assert_eq!(cli.resources, PathBuf::from("res"));
    }
}
