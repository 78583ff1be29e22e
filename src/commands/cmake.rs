//! # `add-cmake-lib`
//!
//! Adds a library that is configured, built and installed with CMake.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use depforge::library::{CmakeArgs, CmakeSpec, LibrarySpec};

pub const NAME: &str = "add-cmake-lib";

/// Add a CMake-based library to build and install
#[derive(Parser, Debug)]
#[command(name = NAME)]
pub struct CmakeLibArgs {
    /// Source subfolder (relative to --sources-dir)
    #[arg(long, value_name = "DIR")]
    pub src: PathBuf,

    /// Install subfolder (relative to --install-dir). Defaults to --src.
    #[arg(long, value_name = "DIR", default_value = "")]
    pub install: String,

    /// CMake build subfolder (relative to --src)
    #[arg(long, value_name = "DIR", default_value = "build")]
    pub build_dir: PathBuf,

    /// Extra CMake configure arguments, as a single quoted string
    #[arg(long, value_name = "ARGS", default_value = "", allow_hyphen_values = true)]
    pub args: String,

    /// Also build the Debug configuration after Release
    #[arg(long)]
    pub build_debug: bool,
}

impl From<CmakeLibArgs> for CmakeSpec {
    fn from(args: CmakeLibArgs) -> Self {
        CmakeSpec {
            src: args.src,
            install: Some(PathBuf::from(args.install)),
            build_dir: args.build_dir,
            args: CmakeArgs::Line(args.args),
            build_debug: args.build_debug,
        }
    }
}

/// Parse an `add-cmake-lib` group.
pub fn parse(group: &[String]) -> Result<LibrarySpec> {
    let args = CmakeLibArgs::try_parse_from(group)?;
    Ok(CmakeSpec::from(args).into())
}
