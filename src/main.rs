//! # depforge CLI
//!
//! This is the binary entry point for the `depforge` command-line tool.
//!
//! Its primary responsibilities are:
//! - Splitting the command line into global options and library groups.
//! - Parsing them using `clap` and running the installer.
//! - Translating the run summary into the process exit code.
//!
//! The core logic lives in the `depforge` library crate; the binary is a
//! thin wrapper around it.

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;

fn main() -> Result<ExitCode> {
    let args = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    cli::run(args)
}
