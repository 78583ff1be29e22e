//! # Error Handling
//!
//! This module defines the centralized error type for `depforge`. It uses the
//! `thiserror` library to describe every anticipated failure mode with enough
//! context to tell the user which library and which step went wrong.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum covering all failures raised by the library.
//! - **`Stage`**: The named step of a CMake build that a subprocess failure is
//!   attributed to.
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Configuration errors abort the whole run. Every other variant is scoped to
//! the library being processed: the installer reports it and moves on to the
//! next library.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A named step of the configure/build/install cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AcquireLock,
    Configure,
    Reconfigure,
    Build,
    CleanupInstall,
    Install,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AcquireLock => "acquire lock file",
            Stage::Configure => "configure",
            Stage::Reconfigure => "reconfigure",
            Stage::Build => "build",
            Stage::CleanupInstall => "cleanup install folder",
            Stage::Install => "install",
        };
        f.write_str(name)
    }
}

/// Main error type for depforge operations
#[derive(Error, Debug)]
pub enum Error {
    /// The run configuration, a manifest or a library definition is invalid.
    ///
    /// This error aborts the whole run.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The source revision of a library could not be determined.
    #[error("Failed to resolve source revision in {}: {message}", dir.display())]
    Revision { dir: PathBuf, message: String },

    /// A step of the CMake build failed.
    #[error("[{library}] failed to {stage}: {message}")]
    Stage {
        library: String,
        stage: Stage,
        message: String,
    },

    /// A build directory lock could not be handled.
    #[error("Lock error for {}: {message}", path.display())]
    Lock { path: PathBuf, message: String },

    /// The freshness record could not be written.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// A copy or directory operation failed.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl Error {
    /// Shorthand for a configuration error without a hint.
    pub fn config(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            hint: None,
        }
    }

    /// Whether this error should abort the entire run.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::ConfigParse { .. })
    }

    /// The stage a build failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
