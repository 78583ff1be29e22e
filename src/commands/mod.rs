//! # Library Commands
//!
//! The command line is a list of global options followed by any number of
//! library groups. Each group starts with a command name and describes one
//! library. This module holds one file per command.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the group's options, derived using `clap`.
//! - A `NAME` constant with the token that starts the group.
//! - A `parse` function that turns the group's tokens into a
//!   [`LibrarySpec`].

pub mod cmake;
pub mod header;
pub mod manual;

use anyhow::{bail, Result};

use depforge::library::LibrarySpec;

/// Tokens that start a library group
pub const COMMAND_NAMES: [&str; 3] = [cmake::NAME, header::NAME, manual::NAME];

/// Parse one group; `group[0]` is the command name.
///
/// `clap` usage errors are returned as `clap::Error` inside the `anyhow`
/// error so the caller can let clap print and exit.
pub fn parse_group(group: &[String]) -> Result<LibrarySpec> {
    match group.first().map(String::as_str) {
        Some(cmake::NAME) => cmake::parse(group),
        Some(header::NAME) => header::parse(group),
        Some(manual::NAME) => manual::parse(group),
        Some(other) => bail!("Unknown command '{}'", other),
        None => bail!("Empty command group"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_group_dispatches_by_name() {
        let spec = parse_group(&strings(&["add-header-lib", "--src", "stb", "--glob", "stb_image.h"]))
            .unwrap();
        assert!(matches!(spec, LibrarySpec::Header { .. }));

        let spec = parse_group(&strings(&["add-cmake-lib", "--src", "SDL"])).unwrap();
        assert!(matches!(spec, LibrarySpec::Cmake { .. }));
    }

    #[test]
    fn test_parse_group_usage_error_is_clap_error() {
        let err = parse_group(&strings(&["add-cmake-lib", "--install", "SDL3"])).unwrap_err();
        assert!(err.downcast_ref::<clap::Error>().is_some());
    }
}
