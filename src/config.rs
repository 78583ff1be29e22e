//! # Run Configuration and Manifest Parsing
//!
//! This module holds the run-wide settings shared by every library in a run
//! and the optional YAML manifest that lists libraries declaratively.
//!
//! ## Key Components
//!
//! - **`RunConfig`**: Roots, tool paths and global CMake arguments. It is an
//!   explicit value handed to every component; nothing is read from globals.
//!
//! - **`split_args`**: Splits a single quoted string such as
//!   `-G "Ninja Multi-Config" -DFOO=ON` into individual arguments.
//!
//! - **`parse_manifest`**: Parses a manifest into [`LibrarySpec`] values.
//!
//! ## Manifest Format
//!
//! ```yaml
//! - cmake:
//!     src: SDL
//!     install: SDL3
//!     args: "-DSDL_TEST_LIBRARY=OFF"
//! - header:
//!     src: tinyobjloader
//!     globs: [tiny_obj_loader.h]
//! - manual:
//!     src: SteamworksSDK
//!     install: SteamworksSDK
//!     rules:
//!       - { src: "redistributable_bin/**/*.dll", dst: bin }
//!       - { src: "public/steam/*.h", dst: include/steam }
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::library::LibrarySpec;

/// Default number of candidate build directories tried before giving up.
pub const DEFAULT_MAX_BUILD_DIRS: usize = 64;

/// Settings shared by every library in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Root directory containing library sources
    pub sources_root: PathBuf,
    /// Root directory for installed libraries (platform segment included)
    pub install_root: PathBuf,
    /// Directory for freshness records; defaults to each install directory
    pub cache_root: Option<PathBuf>,
    /// Subdirectory under `install_root` for header-only libraries
    pub header_subdir: PathBuf,
    /// CMake executable
    pub cmake: PathBuf,
    /// Git executable
    pub git: PathBuf,
    /// Configure arguments applied to every CMake library
    pub cmake_args: Vec<String>,
    /// Parallel job count passed to `cmake --build`
    pub jobs: Option<usize>,
    /// Upper bound on `build`, `build-1`, ... candidates
    pub max_build_dirs: usize,
}

impl RunConfig {
    /// Create a configuration with default tool paths.
    ///
    /// Relative roots are resolved against the current directory so that
    /// subprocesses running in build directories see the same paths.
    pub fn new(sources_root: impl AsRef<Path>, install_root: impl AsRef<Path>) -> Self {
        Self {
            sources_root: absolutize(sources_root.as_ref()),
            install_root: absolutize(install_root.as_ref()),
            cache_root: None,
            header_subdir: PathBuf::from("header-only"),
            cmake: PathBuf::from("cmake"),
            git: PathBuf::from("git"),
            cmake_args: Vec::new(),
            jobs: None,
            max_build_dirs: DEFAULT_MAX_BUILD_DIRS,
        }
    }

    pub fn with_cache_root(mut self, cache_root: impl AsRef<Path>) -> Self {
        self.cache_root = Some(absolutize(cache_root.as_ref()));
        self
    }

    pub fn with_header_subdir(mut self, header_subdir: impl Into<PathBuf>) -> Self {
        self.header_subdir = header_subdir.into();
        self
    }

    pub fn with_cmake(mut self, cmake: impl Into<PathBuf>) -> Self {
        self.cmake = cmake.into();
        self
    }

    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    pub fn with_cmake_args(mut self, args: Vec<String>) -> Self {
        self.cmake_args = args;
        self
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_max_build_dirs(mut self, max_build_dirs: usize) -> Self {
        self.max_build_dirs = max_build_dirs.max(1);
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new("src", default_install_root())
    }
}

/// Host platform name used in the default install root.
pub fn platform_name() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows",
        "linux" => "Linux",
        "macos" => "Darwin",
        other => other,
    }
}

/// `bin/<platform>`
pub fn default_install_root() -> PathBuf {
    Path::new("bin").join(platform_name())
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Split a command-line fragment into arguments using POSIX shell quoting.
///
/// Quoting follows the `shlex` crate: single quotes are literal, double
/// quotes honour backslash escapes, and a backslash outside quotes escapes the
/// next character. Unbalanced quotes and a trailing backslash are errors.
pub fn split_args(line: &str) -> Result<Vec<String>> {
    shlex::split(line).ok_or_else(|| Error::ConfigParse {
        message: format!("Unbalanced quotes or trailing backslash in '{}'", line),
        hint: Some("Quote the whole argument list once, e.g. --args='-DA=1 -DB=\"x y\"'".to_string()),
    })
}

/// Parse a manifest YAML string into library specs.
pub fn parse_manifest(yaml_content: &str) -> Result<Vec<LibrarySpec>> {
    if yaml_content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let specs: Option<Vec<LibrarySpec>> = serde_yaml::from_str(yaml_content).map_err(|e| {
        Error::ConfigParse {
            message: format!("Invalid manifest: {}", e),
            hint: Some("Each entry must be one of 'cmake:', 'header:' or 'manual:'".to_string()),
        }
    })?;
    Ok(specs.unwrap_or_default())
}

/// Parse a manifest file.
pub fn manifest_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<LibrarySpec>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        message: format!("Cannot read manifest {}: {}", path.display(), e),
        hint: None,
    })?;
    parse_manifest(&content)
}
