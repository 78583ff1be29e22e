//! # Installer
//!
//! Runs the install lifecycle over every library of a run, in order.
//!
//! One library's failure never stops the others: the error is reported and
//! counted, and the run moves on. A library whose source directory is missing
//! is skipped with a warning and does not count as a failure.

use crate::cmake::{CommandRunner, ProcessRunner};
use crate::config::RunConfig;
use crate::events::Reporter;
use crate::git::{GitRevision, RevisionSource};
use crate::library::{InstallContext, InstallOutcome, Library};
use crate::lock::{FileLockProvider, LockProvider};

/// What happened to one library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryOutcome {
    Installed,
    UpToDate,
    /// The source directory does not exist
    Skipped,
    /// The install failed with this message
    Failed(String),
}

/// Per-library outcomes of a run, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<(String, LibraryOutcome)>,
}

impl RunSummary {
    fn count(&self, predicate: impl Fn(&LibraryOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| predicate(o)).count()
    }

    pub fn installed(&self) -> usize {
        self.count(|o| *o == LibraryOutcome::Installed)
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|o| *o == LibraryOutcome::UpToDate)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == LibraryOutcome::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, LibraryOutcome::Failed(_)))
    }

    /// Whether no library failed. Skips and warnings do not count.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Drives the install of a list of libraries
pub struct Installer {
    config: RunConfig,
    revisions: Box<dyn RevisionSource>,
    runner: Box<dyn CommandRunner>,
    locks: Box<dyn LockProvider>,
    reporter: Box<dyn Reporter>,
}

impl Installer {
    /// Create an installer using git, real subprocesses and file locks.
    pub fn new(config: RunConfig, reporter: Box<dyn Reporter>) -> Self {
        let revisions = Box::new(GitRevision::new(config.git.clone()));
        Self {
            config,
            revisions,
            runner: Box::new(ProcessRunner),
            locks: Box::new(FileLockProvider),
            reporter,
        }
    }

    /// Create an installer with custom operations (for testing)
    pub fn with_operations(
        config: RunConfig,
        revisions: Box<dyn RevisionSource>,
        runner: Box<dyn CommandRunner>,
        locks: Box<dyn LockProvider>,
        reporter: Box<dyn Reporter>,
    ) -> Self {
        Self {
            config,
            revisions,
            runner,
            locks,
            reporter,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Install every library in order and summarize the run.
    pub fn run(&self, libraries: &[Library]) -> RunSummary {
        let mut summary = RunSummary::default();
        let reporter = self.reporter.as_ref();

        if libraries.is_empty() {
            reporter.info("Nothing to do.");
            return summary;
        }

        let ctx = InstallContext {
            config: &self.config,
            revisions: self.revisions.as_ref(),
            runner: self.runner.as_ref(),
            locks: self.locks.as_ref(),
            reporter,
        };

        for library in libraries {
            let outcome = if !library.source_dir.is_dir() {
                reporter.warning(&format!(
                    "Source folder not found: {}",
                    library.source_dir.display()
                ));
                LibraryOutcome::Skipped
            } else {
                match library.install(&ctx) {
                    Ok(InstallOutcome::Installed) => LibraryOutcome::Installed,
                    Ok(InstallOutcome::UpToDate) => LibraryOutcome::UpToDate,
                    Err(e) => {
                        reporter.error(&format!(
                            "Failed to process {}!\nError: {}",
                            library.name, e
                        ));
                        LibraryOutcome::Failed(e.to_string())
                    }
                }
            };
            summary.outcomes.push((library.name.clone(), outcome));
        }

        log::debug!(
            "Run finished: {} installed, {} up to date, {} skipped, {} failed",
            summary.installed(),
            summary.up_to_date(),
            summary.skipped(),
            summary.failed()
        );

        if summary.is_success() {
            reporter.success("All libraries installed successfully");
        } else {
            reporter.error(&format!(
                "{} of {} libraries failed",
                summary.failed(),
                libraries.len()
            ));
        }
        summary
    }
}
