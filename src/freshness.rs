//! Freshness records: deciding whether a library needs to be reinstalled
//!
//! A freshness record is a small text file written next to an installed
//! library (or under a separate cache root). Line 1 holds the content
//! identity, the source revision that was installed. Line 2 holds the build
//! identity, a digest of the configure arguments, and is only present for
//! libraries that are built.
//!
//! The record is written only after an install has fully succeeded, so an
//! interrupted run always leaves a record that forces a retry.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Identity of one install: what was built, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Source revision
    pub content: String,
    /// Digest of the configure arguments, for built libraries only
    pub build: Option<String>,
}

impl Fingerprint {
    pub fn content_only(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            build: None,
        }
    }

    pub fn with_build(content: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            build: Some(build.into()),
        }
    }
}

/// Stable, order-sensitive digest of a configure argument list.
pub fn build_identity<S: AsRef<str>>(args: &[S]) -> String {
    let mut hasher = Sha256::new();
    for arg in args {
        hasher.update(arg.as_ref().as_bytes());
        // NUL cannot occur inside a process argument, so the encoding is unambiguous.
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Path of the record for library `name` inside `record_dir`.
pub fn record_path(record_dir: &Path, name: &str) -> PathBuf {
    record_dir.join(format!("hash_{}.txt", name))
}

/// Read line `n` (1-indexed) without its line terminator.
///
/// Returns `Ok(None)` if the file does not exist or has fewer than `n` lines.
pub fn read_line_at(path: &Path, n: usize) -> io::Result<Option<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if n == 0 {
        return Ok(None);
    }
    Ok(content
        .lines()
        .nth(n - 1)
        .map(|line| line.trim_end_matches('\r').to_string()))
}

/// Replace line `n` (1-indexed) with `text`, padding with blank lines if the
/// file is shorter. Parent directories are created on demand.
pub fn write_line_at(path: &Path, n: usize, text: &str) -> io::Result<()> {
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "line numbers start at 1",
        ));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut lines: Vec<String> = match fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };
    if lines.len() < n {
        lines.resize(n, String::new());
    }
    lines[n - 1] = text.trim_end_matches('\n').to_string();

    let mut out = lines.join("\n");
    out.push('\n');
    fs::write(path, out)
}

/// The persisted fingerprint of a library's last successful install.
#[derive(Debug, Clone)]
pub struct FreshnessRecord {
    path: PathBuf,
}

impl FreshnessRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the record matches `fingerprint` exactly.
    ///
    /// Read failures of any kind count as stale.
    pub fn is_up_to_date(&self, fingerprint: &Fingerprint) -> bool {
        match self.matches(fingerprint) {
            Ok(matches) => matches,
            Err(e) => {
                log::debug!(
                    "Treating unreadable record {} as stale: {}",
                    self.path.display(),
                    e
                );
                false
            }
        }
    }

    fn matches(&self, fingerprint: &Fingerprint) -> io::Result<bool> {
        if read_line_at(&self.path, 1)?.as_deref() != Some(fingerprint.content.as_str()) {
            return Ok(false);
        }
        match &fingerprint.build {
            Some(build) => Ok(read_line_at(&self.path, 2)?.as_deref() == Some(build.as_str())),
            None => Ok(true),
        }
    }

    /// Persist `fingerprint`. Call only after the install has succeeded.
    pub fn commit(&self, fingerprint: &Fingerprint) -> Result<()> {
        let to_cache_error = |e: io::Error| Error::Cache {
            message: format!(
                "Failed to write freshness record {}: {}",
                self.path.display(),
                e
            ),
        };
        write_line_at(&self.path, 1, &fingerprint.content).map_err(to_cache_error)?;
        if let Some(build) = &fingerprint.build {
            write_line_at(&self.path, 2, build).map_err(to_cache_error)?;
        }
        Ok(())
    }
}
