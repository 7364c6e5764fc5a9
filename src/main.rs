//! # bundlekit CLI
//!
//! This is the binary entry point for the `bundlekit` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Logging any failure and turning it into exit status 1.
//!
//! The core logic lives in the `bundlekit` library crate; the binary is a
//! thin wrapper around it.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.downcast_ref::<bundlekit::Error>().is_some() {
                log::error!("{:#}", err);
            } else {
                log::error!("Unexpected error: {:?}", err);
            }
            ExitCode::FAILURE
        }
    }
}
