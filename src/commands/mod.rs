//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `bundlekit` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the resources
//!   directory and calls into the `bundlekit` library.
//!
//! Commands that operate on a bundle flatten the shared
//! [`BundleArgs`](crate::cli::BundleArgs) selection.

pub mod bunnfo;
pub mod genbun;
pub mod getsrc;
pub mod prubin;
pub mod subdom;
