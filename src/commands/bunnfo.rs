//! # Bunnfo Command Implementation
//!
//! This module implements the `bunnfo` subcommand, which prints information
//! about the base bundles under the resources directory.
//!
//! ## Functionality
//!
//! - **Listing**: every base bundle with its display name (`--list`)
//! - **Dependency Order**: the resolved chain of a bundle, one per line
//!   (`--dependencies`)
//! - **Tree View**: a bundle's parent hierarchy (`--tree`)
//!
//! This command is a safe, read-only operation that does not modify any files.

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use ptree::{print_tree, Style, TreeItem};

use bundlekit::meta::MetadataStore;
use bundlekit::resolver::dependency_order;

/// Show information about base bundles
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("mode").required(true).args(["list", "dependencies", "tree"])))]
pub struct BunnfoArgs {
    /// List all base bundles and their display names
    #[arg(short, long)]
    pub list: bool,

    /// Print the dependency order of a base bundle, ancestors first
    #[arg(short, long, value_name = "NAME")]
    pub dependencies: Option<String>,

    /// Print the parent hierarchy of a base bundle
    #[arg(long, value_name = "NAME")]
    pub tree: Option<String>,
}

/// Execute the `bunnfo` command.
pub fn execute(args: BunnfoArgs, resources: &Path) -> Result<()> {
    let store = MetadataStore::new(resources);

    if args.list {
        for meta in store.list()? {
            println!("{} - {}", meta.name, meta.display_name);
        }
    } else if let Some(name) = &args.dependencies {
        for bundle in dependency_order(&store, name)? {
            println!("{}", bundle);
        }
    } else if let Some(name) = &args.tree {
        // Resolve first so cycles and missing parents are reported as errors
        // instead of an endless tree.
        dependency_order(&store, name)?;
        let root = build_tree_node(&store, name)?;
        print_tree(&root).context("Failed to display tree")?;
    }
    Ok(())
}

/// Build the node of a bundle and, recursively, of its parents.
fn build_tree_node(store: &MetadataStore, name: &str) -> Result<TreeNode> {
    let meta = store.load(name)?;
    let children = meta
        .depends
        .iter()
        .map(|parent| build_tree_node(store, parent))
        .collect::<Result<Vec<_>>>()?;
    Ok(TreeNode {
        label: format!("{} ({})", meta.name, meta.display_name),
        children,
    })
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: Write>(&self, f: &mut W, _style: &Style) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}
