//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a fixture with a sources root and an install root,
//! helpers for creating git repositories, and (on Unix) a fake `cmake`
//! script that records its invocations.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new();
//!     if !fixture.git_repo("tinyobjloader", &[("tiny_obj_loader.h", "// v1")]) {
//!         return;
//!     }
//!     fixture.command().arg("add-header-lib") /* ... */;
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::git_available;
    pub use super::TestFixture;
}

/// Environment variables that would leak host settings into a test run.
const DEPFORGE_ENV: [&str; 5] = [
    "DEPFORGE_SOURCES_DIR",
    "DEPFORGE_INSTALL_DIR",
    "DEPFORGE_CACHE_DIR",
    "DEPFORGE_CMAKE",
    "DEPFORGE_CMAKE_ARGS",
];

/// Whether a usable `git` is on the PATH.
///
/// Tests that need real repositories return early when it is not.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` with a fixed identity, returning whether it succeeded.
pub fn git(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=depforge tests",
            "-c",
            "user.email=tests@depforge.invalid",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A temporary workspace with `src/` and `bin/` roots.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Root of library sources.
    pub fn sources(&self) -> PathBuf {
        self.path().join("src")
    }

    /// Root of installed libraries.
    pub fn install(&self) -> PathBuf {
        self.path().join("bin")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Add a file under the sources root.
    pub fn with_source_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child("src")
            .child(path)
            .write_str(content)
            .expect("Failed to write source file");
        self
    }

    /// Create `src/<name>` as a git repository holding `files`, committed.
    ///
    /// Returns `false` if git is unavailable, so callers can skip the test.
    pub fn git_repo(&self, name: &str, files: &[(&str, &str)]) -> bool {
        if !git_available() {
            eprintln!("git is not available, skipping");
            return false;
        }
        let repo = self.sources().join(name);
        std::fs::create_dir_all(&repo).expect("Failed to create repository dir");
        assert!(git(&repo, &["init", "-q"]), "git init failed");
        self.commit_files(name, files);
        true
    }

    /// Write `files` into `src/<name>` and commit them.
    pub fn commit_files(&self, name: &str, files: &[(&str, &str)]) {
        let repo = self.sources().join(name);
        for (path, content) in files {
            let file = repo.join(path);
            std::fs::create_dir_all(file.parent().expect("file has a parent"))
                .expect("Failed to create parent dir");
            std::fs::write(&file, content).expect("Failed to write file");
        }
        assert!(git(&repo, &["add", "-A"]), "git add failed");
        assert!(
            git(&repo, &["commit", "-q", "--allow-empty", "-m", "update"]),
            "git commit failed"
        );
    }

    /// Create a command running in the fixture with `--sources-dir` and
    /// `--install-dir` set.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("depforge");
        cmd.current_dir(self.path());
        for var in DEPFORGE_ENV {
            cmd.env_remove(var);
        }
        cmd.env("NO_COLOR", "1")
            .arg("--sources-dir")
            .arg(self.sources())
            .arg("--install-dir")
            .arg(self.install());
        cmd
    }

    /// Write a fake `cmake` executable and return its path.
    ///
    /// Each invocation appends `<cwd> <args>` to `cmake.log`. Configure
    /// writes a `CMakeCache.txt` naming `generator`; install writes
    /// `lib/libfake.a` under the install prefix. Setting
    /// `FAKE_CMAKE_FAIL_BUILD` makes the build step fail.
    #[cfg(unix)]
    pub fn fake_cmake(&self, generator: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let log = self.path().join("cmake.log");
        let script = format!(
            r#"#!/bin/sh
echo "$PWD $*" >> "{log}"
case "$1" in
  --build)
    [ -n "$FAKE_CMAKE_FAIL_BUILD" ] && exit 1
    echo built > built.marker
    ;;
  --install)
    prefix=$(sed -n 's/^CMAKE_INSTALL_PREFIX:PATH=//p' CMakeCache.txt)
    mkdir -p "$prefix/lib"
    echo lib > "$prefix/lib/libfake.a"
    ;;
  *)
    for arg in "$@"; do
      case "$arg" in
        -DCMAKE_INSTALL_PREFIX=*)
          printf 'CMAKE_GENERATOR:INTERNAL=%s\nCMAKE_INSTALL_PREFIX:PATH=%s\n' \
            "{generator}" "${{arg#-DCMAKE_INSTALL_PREFIX=}}" > CMakeCache.txt
          ;;
      esac
    done
    ;;
esac
"#,
            log = log.display(),
            generator = generator
        );

        let path = self.path().join("fake-cmake");
        std::fs::write(&path, script).expect("Failed to write fake cmake");
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("Failed to make fake cmake executable");
        path
    }

    /// Lines logged by the fake `cmake`, one per invocation.
    #[allow(dead_code)]
    pub fn cmake_log(&self) -> Vec<String> {
        std::fs::read_to_string(self.path().join("cmake.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_source_file() {
        let fixture = TestFixture::new().with_source_file("lib/a.h", "// a");
        assert!(fixture.sources().join("lib/a.h").exists());
    }
}
