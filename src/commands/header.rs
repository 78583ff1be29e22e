//! # `add-header-lib`
//!
//! Adds a header-only library. Matching headers are copied into the shared
//! header directory (`--header-subdir` under the install root).

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use depforge::library::{HeaderSpec, LibrarySpec};

pub const NAME: &str = "add-header-lib";

/// Install a header-only library
#[derive(Parser, Debug)]
#[command(name = NAME)]
pub struct HeaderLibArgs {
    /// Source subfolder (relative to --sources-dir)
    #[arg(long, value_name = "DIR")]
    pub src: PathBuf,

    /// Install subfolder (relative to --header-subdir)
    #[arg(long, value_name = "DIR", default_value = "")]
    pub install_subdir: String,

    /// Glob pattern for headers. Can be used multiple times.
    #[arg(long = "glob", value_name = "PATTERN", required = true)]
    pub globs: Vec<String>,
}

/// Parse an `add-header-lib` group.
pub fn parse(group: &[String]) -> Result<LibrarySpec> {
    let args = HeaderLibArgs::try_parse_from(group)?;
    Ok(HeaderSpec {
        src: args.src,
        install_subdir: PathBuf::from(args.install_subdir),
        globs: args.globs,
    }
    .into())
}
