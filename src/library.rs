//! # Libraries and the Install Lifecycle
//!
//! A [`LibrarySpec`] is what a user writes, on the command line or in a
//! manifest. Resolving it against a [`RunConfig`] produces a [`Library`] with
//! absolute paths and validated arguments, ready for one install.
//!
//! ## Kinds
//!
//! - **CMake**: configured, built and installed by [`crate::cmake`].
//! - **Manual**: copied by a list of [`Rule`]s.
//! - **Header-only**: a manual copy whose install directory is the shared
//!   header directory, with one rule per glob.
//!
//! Manual and header-only libraries both resolve to [`LibraryKind::Copy`], so
//! there are only two install paths.
//!
//! ## Lifecycle
//!
//! [`Library::install`] computes the library's fingerprint, returns early if
//! the freshness record matches it, otherwise installs and then commits the
//! record.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cmake::{CmakeBuild, CmakeOptions, CommandRunner};
use crate::config::{split_args, RunConfig};
use crate::error::{Error, Result};
use crate::events::Reporter;
use crate::freshness::{build_identity, record_path, Fingerprint, FreshnessRecord};
use crate::git::RevisionSource;
use crate::lock::{self, LockProvider};
use crate::rules::{apply_rules, Rule};

/// Configure arguments, either as one quoted string or as a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CmakeArgs {
    Line(String),
    List(Vec<String>),
}

impl Default for CmakeArgs {
    fn default() -> Self {
        CmakeArgs::Line(String::new())
    }
}

impl CmakeArgs {
    /// The individual arguments, splitting a quoted line if needed.
    pub fn resolve(&self) -> Result<Vec<String>> {
        match self {
            CmakeArgs::Line(line) => split_args(line),
            CmakeArgs::List(list) => Ok(list.clone()),
        }
    }
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

/// A library built with CMake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CmakeSpec {
    /// Source path, relative to the sources root
    pub src: PathBuf,
    /// Install path, relative to the install root; defaults to `src`
    #[serde(default)]
    pub install: Option<PathBuf>,
    /// Build directory, relative to the source directory
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
    #[serde(default)]
    pub args: CmakeArgs,
    #[serde(default)]
    pub build_debug: bool,
}

impl CmakeSpec {
    pub fn new(src: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            install: None,
            build_dir: default_build_dir(),
            args: CmakeArgs::default(),
            build_debug: false,
        }
    }
}

/// A header-only library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderSpec {
    /// Source path, relative to the sources root
    pub src: PathBuf,
    /// Subdirectory of the shared header directory
    #[serde(default)]
    pub install_subdir: PathBuf,
    /// Patterns of the headers to copy
    pub globs: Vec<String>,
}

/// A library installed by copy rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualSpec {
    /// Source path, relative to the sources root
    pub src: PathBuf,
    /// Install path, relative to the install root; defaults to `src`
    #[serde(default)]
    pub install: Option<PathBuf>,
    pub rules: Vec<Rule>,
}

/// A library as written by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LibrarySpec {
    Cmake { cmake: CmakeSpec },
    Header { header: HeaderSpec },
    Manual { manual: ManualSpec },
}

impl From<CmakeSpec> for LibrarySpec {
    fn from(cmake: CmakeSpec) -> Self {
        LibrarySpec::Cmake { cmake }
    }
}

impl From<HeaderSpec> for LibrarySpec {
    fn from(header: HeaderSpec) -> Self {
        LibrarySpec::Header { header }
    }
}

impl From<ManualSpec> for LibrarySpec {
    fn from(manual: ManualSpec) -> Self {
        LibrarySpec::Manual { manual }
    }
}

/// How a library gets into its install directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryKind {
    Cmake(CmakeOptions),
    Copy { rules: Vec<Rule> },
}

/// Result of one successful [`Library::install`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    UpToDate,
    Installed,
}

/// Collaborators of an install
pub struct InstallContext<'a> {
    pub config: &'a RunConfig,
    pub revisions: &'a dyn RevisionSource,
    pub runner: &'a dyn CommandRunner,
    pub locks: &'a dyn LockProvider,
    pub reporter: &'a dyn Reporter,
}

/// A fully resolved library, used for one install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub name: String,
    pub source_dir: PathBuf,
    pub install_dir: PathBuf,
    /// Directory holding this library's freshness record
    pub record_dir: PathBuf,
    pub kind: LibraryKind,
}

/// The install subpath: empty or missing means the same as the source subpath.
fn install_or_src(install: Option<&Path>, src: &Path) -> PathBuf {
    match install {
        Some(install) if !install.as_os_str().is_empty() => install.to_path_buf(),
        _ => src.to_path_buf(),
    }
}

fn library_name(src: &Path) -> String {
    src.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| src.display().to_string())
}

impl Library {
    /// Resolve `spec` against the run configuration.
    pub fn from_spec(spec: &LibrarySpec, config: &RunConfig) -> Result<Library> {
        match spec {
            LibrarySpec::Cmake { cmake } => {
                require_src(&cmake.src, "cmake")?;
                if !lock::is_valid_build_dir(&cmake.build_dir) {
                    return Err(Error::ConfigParse {
                        message: format!(
                            "Invalid build directory '{}' for {}",
                            cmake.build_dir.display(),
                            cmake.src.display()
                        ),
                        hint: Some(
                            "Use a relative path inside the source directory, e.g. --build-dir=build"
                                .to_string(),
                        ),
                    });
                }
                let install = install_or_src(cmake.install.as_deref(), &cmake.src);
                let args = cmake.args.resolve().map_err(|e| match e {
                    Error::ConfigParse { message, hint } => Error::ConfigParse {
                        message: format!("{} (arguments of {})", message, cmake.src.display()),
                        hint,
                    },
                    other => other,
                })?;
                Ok(Self::resolve(
                    config,
                    &cmake.src,
                    &install,
                    LibraryKind::Cmake(CmakeOptions {
                        build_dir: cmake.build_dir.clone(),
                        args,
                        build_debug: cmake.build_debug,
                    }),
                ))
            }
            LibrarySpec::Header { header } => {
                require_src(&header.src, "header")?;
                if header.globs.is_empty() {
                    return Err(Error::ConfigParse {
                        message: format!(
                            "Header library {} has no globs",
                            header.src.display()
                        ),
                        hint: Some("Pass at least one --glob".to_string()),
                    });
                }
                let rules = header
                    .globs
                    .iter()
                    .map(|glob| Rule::new(glob.clone(), header.install_subdir.clone()))
                    .collect();
                Ok(Self::resolve(
                    config,
                    &header.src,
                    &config.header_subdir,
                    LibraryKind::Copy { rules },
                ))
            }
            LibrarySpec::Manual { manual } => {
                require_src(&manual.src, "manual")?;
                if manual.rules.is_empty() {
                    return Err(Error::ConfigParse {
                        message: format!(
                            "Manual library {} has no rules",
                            manual.src.display()
                        ),
                        hint: Some(
                            "Follow add-manual-lib with one or more 'rule --src P --dst D'"
                                .to_string(),
                        ),
                    });
                }
                if let Some(rule) = manual.rules.iter().find(|r| r.source.is_empty()) {
                    return Err(Error::config(format!(
                        "Manual library {} has a rule with an empty source pattern (dst: {})",
                        manual.src.display(),
                        rule.dest.display()
                    )));
                }
                let install = install_or_src(manual.install.as_deref(), &manual.src);
                Ok(Self::resolve(
                    config,
                    &manual.src,
                    &install,
                    LibraryKind::Copy {
                        rules: manual.rules.clone(),
                    },
                ))
            }
        }
    }

    fn resolve(config: &RunConfig, src: &Path, install: &Path, kind: LibraryKind) -> Library {
        let install_dir = config.install_root.join(install);
        let record_dir = match &config.cache_root {
            Some(cache_root) => cache_root.join(install),
            None => install_dir.clone(),
        };
        Library {
            name: library_name(src),
            source_dir: config.sources_root.join(src),
            install_dir,
            record_dir,
            kind,
        }
    }

    /// Path of this library's freshness record.
    pub fn record_path(&self) -> PathBuf {
        record_path(&self.record_dir, &self.name)
    }

    /// Build identity: every argument that affects configure, in order.
    ///
    /// The global CMake arguments are included, so changing them rebuilds every CMake library.
    pub fn build_identity(&self, config: &RunConfig) -> Option<String> {
        match &self.kind {
            LibraryKind::Cmake(options) => {
                let mut args: Vec<&str> = options.args.iter().map(String::as_str).collect();
                args.extend(config.cmake_args.iter().map(String::as_str));
                if options.build_debug {
                    args.push("<build-debug>");
                }
                Some(build_identity(&args))
            }
            LibraryKind::Copy { .. } => None,
        }
    }

    /// Current fingerprint of the library.
    pub fn fingerprint(
        &self,
        config: &RunConfig,
        revisions: &dyn RevisionSource,
    ) -> Result<Fingerprint> {
        let content = revisions.revision(&self.source_dir)?;
        Ok(Fingerprint {
            content,
            build: self.build_identity(config),
        })
    }

    /// Install the library unless its freshness record is current.
    ///
    /// The source directory must exist; callers skip libraries whose source
    /// is missing.
    pub fn install(&self, ctx: &InstallContext<'_>) -> Result<InstallOutcome> {
        let fingerprint = self.fingerprint(ctx.config, ctx.revisions)?;
        let record = FreshnessRecord::new(self.record_path());

        if record.is_up_to_date(&fingerprint) {
            ctx.reporter
                .info(&format!("[{}] is up to date.", self.name));
            return Ok(InstallOutcome::UpToDate);
        }

        fs::create_dir_all(&self.install_dir).map_err(|e| Error::Filesystem {
            message: format!(
                "Failed to create install directory {}: {}",
                self.install_dir.display(),
                e
            ),
        })?;

        ctx.reporter
            .info(&format!("Installing [{}]...", self.name));

        match &self.kind {
            LibraryKind::Cmake(options) => {
                CmakeBuild::new(ctx.config, ctx.runner, ctx.locks, ctx.reporter).build_and_install(
                    &self.name,
                    &self.source_dir,
                    &self.install_dir,
                    options,
                )?;
            }
            LibraryKind::Copy { rules } => {
                let stats = apply_rules(&self.source_dir, &self.install_dir, rules, ctx.reporter)?;
                log::debug!(
                    "[{}] copied {} file(s), skipped {} rule(s)",
                    self.name,
                    stats.files_copied,
                    stats.rules_skipped
                );
            }
        }

        record.commit(&fingerprint)?;
        ctx.reporter
            .success(&format!("[{}] installed.", self.name));
        Ok(InstallOutcome::Installed)
    }
}

fn require_src(src: &Path, kind: &str) -> Result<()> {
    if src.as_os_str().is_empty() {
        return Err(Error::config(format!("A {} library needs a source path", kind)));
    }
    Ok(())
}

/// Resolve every spec, stopping at the first invalid one.
pub fn resolve_all(specs: &[LibrarySpec], config: &RunConfig) -> Result<Vec<Library>> {
    specs
        .iter()
        .map(|spec| Library::from_spec(spec, config))
        .collect()
}
