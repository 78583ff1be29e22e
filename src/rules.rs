//! Copy rules for manually installed and header-only libraries
//!
//! A rule copies whatever its source pattern matches inside a library's source
//! directory into a destination subdirectory of the install tree.
//!
//! ## Pattern splitting
//!
//! Every pattern is split into a *fixed prefix*, the leading path components
//! that contain no wildcard, and a *wildcard suffix*. Matches are placed under
//! the destination relative to the fixed prefix, so for the rule
//! `redistributable_bin/**/*.dll -> bin` the file
//! `redistributable_bin/win64/steam_api64.dll` lands in
//! `bin/win64/steam_api64.dll`.
//!
//! A pattern without wildcards names one file or directory, which is copied
//! under the destination by its own name.
//!
//! ## Exclusion
//!
//! The exclude pattern of a rule is resolved as its own glob under the same
//! fixed prefix, and the resolved paths are removed from the rule's matches.
//! It never affects other rules.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::events::Reporter;

/// Characters that start a wildcard in a pattern component
pub const WILDCARD_CHARS: [char; 3] = ['*', '?', '['];

/// One copy rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Source glob, relative to the library's source directory
    #[serde(rename = "src")]
    pub source: String,
    /// Destination subdirectory, relative to the library's install directory
    #[serde(rename = "dst", default)]
    pub dest: PathBuf,
    /// Glob of paths to leave out, relative to the source's fixed prefix
    #[serde(rename = "ex", default)]
    pub exclude: Option<String>,
}

impl Rule {
    pub fn new(source: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            exclude: None,
        }
    }

    pub fn excluding(mut self, exclude: impl Into<String>) -> Self {
        let exclude = exclude.into();
        self.exclude = if exclude.is_empty() { None } else { Some(exclude) };
        self
    }

    fn exclude_pattern(&self) -> Option<&str> {
        self.exclude.as_deref().filter(|e| !e.is_empty())
    }
}

/// Counters collected while applying rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Files written to the install tree
    pub files_copied: usize,
    /// Rules skipped because their fixed prefix does not exist
    pub rules_skipped: usize,
}

/// Whether `s` contains a wildcard character.
pub fn has_wildcard(s: &str) -> bool {
    s.contains(WILDCARD_CHARS)
}

/// Split a pattern into its fixed prefix and wildcard suffix.
///
/// The suffix is joined with `/` and is empty when the pattern has no
/// wildcard at all.
pub fn split_pattern(pattern: &str) -> (PathBuf, String) {
    let components: Vec<Component<'_>> = Path::new(pattern).components().collect();

    for (i, component) in components.iter().enumerate() {
        if has_wildcard(&component.as_os_str().to_string_lossy()) {
            let fixed: PathBuf = components[..i].iter().collect();
            let suffix = components[i..]
                .iter()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            return (fixed, suffix);
        }
    }

    (components.iter().collect(), String::new())
}

/// Resolve `pattern` under `base`, returning every matching path.
///
/// `*` and `?` do not cross directory separators and do not match a leading
/// dot; `**` matches any number of directories.
pub fn glob_under(base: &Path, pattern: &str) -> Result<BTreeSet<PathBuf>> {
    let root = PathBuf::from(Pattern::escape(&base.to_string_lossy()));
    let full = root.join(pattern);
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut matches = BTreeSet::new();
    for entry in glob::glob_with(&full.to_string_lossy(), options)? {
        let path = entry.map_err(|e| Error::Filesystem {
            message: format!("Cannot read {}: {}", e.path().display(), e.error()),
        })?;
        matches.insert(path);
    }
    log::trace!("{} matched {} path(s)", full.display(), matches.len());
    Ok(matches)
}

/// Apply `rules` from `source_dir` into `dest_root`.
pub fn apply_rules(
    source_dir: &Path,
    dest_root: &Path,
    rules: &[Rule],
    reporter: &dyn Reporter,
) -> Result<CopyStats> {
    let mut stats = CopyStats::default();
    for rule in rules {
        apply_rule(source_dir, dest_root, rule, reporter, &mut stats)?;
    }
    Ok(stats)
}

fn apply_rule(
    source_dir: &Path,
    dest_root: &Path,
    rule: &Rule,
    reporter: &dyn Reporter,
    stats: &mut CopyStats,
) -> Result<()> {
    let (fixed, suffix) = split_pattern(&rule.source);
    let base = source_dir.join(&fixed);

    if !base.exists() {
        reporter.warning(&format!("Pattern base path not found: {}", base.display()));
        stats.rules_skipped += 1;
        return Ok(());
    }

    let dest = dest_root.join(&rule.dest);

    if suffix.is_empty() {
        if let Some(exclude) = rule.exclude_pattern() {
            reporter.warning(&format!(
                "There is no need in exclude glob '{}' if you copy path.\n\
                 Exclude glob excludes files only from glob.",
                exclude
            ));
        }
        let target = match base.file_name() {
            Some(name) => dest.join(name),
            None => dest,
        };
        return copy_path(&base, &target, &BTreeSet::new(), stats);
    }

    let matches = glob_under(&base, &suffix)?;
    let excluded = match rule.exclude_pattern() {
        Some(exclude) => glob_under(&base, exclude)?,
        None => BTreeSet::new(),
    };

    for path in matches.difference(&excluded) {
        let relative = match path.strip_prefix(&base) {
            Ok(relative) => relative,
            Err(_) => {
                reporter.warning(&format!(
                    "Failed to compute relative path for {}",
                    path.display()
                ));
                continue;
            }
        };
        copy_path(path, &dest.join(relative), &excluded, stats)?;
    }

    Ok(())
}

/// Copy a file, or a directory recursively, skipping `excluded` paths.
fn copy_path(
    source: &Path,
    target: &Path,
    excluded: &BTreeSet<PathBuf>,
    stats: &mut CopyStats,
) -> Result<()> {
    if source.is_dir() {
        copy_dir(source, target, excluded, stats)
    } else {
        copy_file(source, target)?;
        stats.files_copied += 1;
        Ok(())
    }
}

/// Merge `source` into `target`, overwriting files that already exist.
fn copy_dir(
    source: &Path,
    target: &Path,
    excluded: &BTreeSet<PathBuf>,
    stats: &mut CopyStats,
) -> Result<()> {
    let walker = WalkDir::new(source)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !excluded.contains(entry.path()));

    for entry in walker {
        let entry = entry.map_err(|e| Error::Filesystem {
            message: format!("Failed to walk {}: {}", source.display(), e),
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::Filesystem {
                message: format!("Failed to relativize {}: {}", entry.path().display(), e),
            })?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|e| Error::Filesystem {
                message: format!(
                    "Failed to create directory '{}': {}",
                    destination.display(),
                    e
                ),
            })?;
        } else {
            copy_file(entry.path(), &destination)?;
            stats.files_copied += 1;
        }
    }

    Ok(())
}

/// Copy one file with its permissions and modification time.
pub fn copy_file(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
            message: format!("Failed to create directory '{}': {}", parent.display(), e),
        })?;
    }

    fs::copy(source, target).map_err(|e| Error::Filesystem {
        message: format!(
            "Failed to copy '{}' to '{}': {}",
            source.display(),
            target.display(),
            e
        ),
    })?;

    // Timestamps are best-effort; read-only targets cannot be reopened for writing.
    if let Err(e) = preserve_mtime(source, target) {
        log::debug!("Kept current mtime for {}: {}", target.display(), e);
    }

    log::trace!("Copied {} -> {}", source.display(), target.display());
    Ok(())
}

fn preserve_mtime(source: &Path, target: &Path) -> std::io::Result<()> {
    let modified = fs::metadata(source)?.modified()?;
    let file = fs::OpenOptions::new().write(true).open(target)?;
    file.set_modified(modified)
}
