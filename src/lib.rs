//! # depforge
//!
//! This library vendors third-party source libraries into a local install
//! tree, rebuilding only what changed since the last run. It is used by the
//! `depforge` command-line tool but can also be driven directly.
//!
//! ## Quick Example
//!
//! ```
//! use depforge::config::{parse_manifest, RunConfig};
//! use depforge::library::resolve_all;
//!
//! let specs = parse_manifest(r#"
//! - header:
//!     src: tinyobjloader
//!     globs: [tiny_obj_loader.h]
//! "#).unwrap();
//!
//! let config = RunConfig::new("third_party/src", "third_party/bin/Linux");
//! let libraries = resolve_all(&specs, &config).unwrap();
//! assert_eq!(libraries[0].name, "tinyobjloader");
//! assert!(libraries[0].install_dir.ends_with("header-only"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Libraries (`library`)**: CMake-built, manually copied and header-only
//!   libraries, resolved from user specs into absolute paths.
//! - **Freshness (`freshness`, `git`)**: A record of the source revision and
//!   configure arguments of the last successful install. A library whose
//!   record matches is skipped.
//! - **Copy Rules (`rules`)**: Glob-based copying that keeps the directory
//!   structure below each pattern's fixed prefix.
//! - **CMake Builds (`cmake`, `lock`)**: Configure, build and install in a
//!   locked build directory, falling back to `build-1`, `build-2`, ... when
//!   another process holds the lock.
//! - **Installer (`installer`)**: Processes all libraries in order, isolating
//!   failures so one broken library does not stop the rest.
//!
//! ## Execution Flow
//!
//! 1.  **Resolve**: Turn specs into [`library::Library`] values. Invalid
//!     specs abort the run.
//! 2.  **Check**: Skip libraries with a missing source or a current record.
//! 3.  **Install**: Build or copy into the install directory.
//! 4.  **Commit**: Write the freshness record, only after success.

pub mod cmake;
pub mod config;
pub mod error;
pub mod events;
pub mod freshness;
pub mod git;
pub mod installer;
pub mod library;
pub mod lock;
pub mod output;
pub mod rules;

#[cfg(test)]
mod rules_proptest;
