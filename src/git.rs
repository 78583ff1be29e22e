//! Source revision lookup
//!
//! The content identity of a library is the commit checked out in its source
//! directory. Failing to read it is an error for that library: a source tree
//! whose revision is unknown can be treated neither as fresh nor as stale.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Trait for resolving a source revision - allows mocking in tests
pub trait RevisionSource {
    /// Identifier of the exact revision checked out in `source_dir`.
    fn revision(&self, source_dir: &Path) -> Result<String>;
}

/// Reads the revision with `git rev-parse HEAD`.
///
/// This uses the system git command, so safe.directory settings and other
/// git configuration apply as usual.
#[derive(Debug, Clone)]
pub struct GitRevision {
    git: PathBuf,
}

impl GitRevision {
    pub fn new(git: impl Into<PathBuf>) -> Self {
        Self { git: git.into() }
    }
}

impl Default for GitRevision {
    fn default() -> Self {
        Self::new("git")
    }
}

impl RevisionSource for GitRevision {
    fn revision(&self, source_dir: &Path) -> Result<String> {
        rev_parse_head(&self.git, source_dir)
    }
}

/// Run `git -C <dir> rev-parse HEAD` and return the trimmed hash.
pub fn rev_parse_head(git: &Path, source_dir: &Path) -> Result<String> {
    log::debug!("Resolving HEAD of {}", source_dir.display());

    let output = Command::new(git)
        .arg("-C")
        .arg(source_dir)
        .args(["rev-parse", "HEAD"])
        .output()
        .map_err(|e| Error::Revision {
            dir: source_dir.to_path_buf(),
            message: format!("failed to run {}: {}", git.display(), e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Revision {
            dir: source_dir.to_path_buf(),
            message: format!("git rev-parse HEAD failed ({}): {}", output.status, stderr.trim()),
        });
    }

    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if hash.is_empty() {
        return Err(Error::Revision {
            dir: source_dir.to_path_buf(),
            message: "git rev-parse HEAD printed nothing".to_string(),
        });
    }

    Ok(hash)
}
