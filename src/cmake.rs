//! # CMake Build Orchestration
//!
//! This module configures, builds and installs a CMake project into its
//! install directory.
//!
//! ## Process
//!
//! 1.  **Lock**: Claim a private build directory (see [`crate::lock`]) and
//!     purge anything an interrupted run left in it.
//! 2.  **Configure**: Run CMake with the install prefix, the shared prefix
//!     path, the library's arguments and then the global arguments.
//! 3.  **Build & Install**: Build `Release` and, if requested, `Debug`.
//!     Multi-config generators build each configuration from the one
//!     configure step; single-config generators are reconfigured with
//!     `CMAKE_BUILD_TYPE` first. The install directory is wiped once, right
//!     after the first successful build.
//! 4.  **Cleanup**: Release the lock and delete the build directory, whether
//!     or not the build succeeded.
//!
//! Every subprocess failure is reported as an [`Error::Stage`] naming the
//! step that failed.

use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::RunConfig;
use crate::error::{Error, Result, Stage};
use crate::events::Reporter;
use crate::lock::{self, BuildDirLock, LockProvider};

/// Generators that produce several configurations from one configure step
pub const MULTI_CONFIG_GENERATORS: [&str; 3] = ["Ninja Multi-Config", "FASTBuild", "Xcode"];

/// Configurations built for every library, in order
pub const RELEASE: &str = "Release";
pub const DEBUG: &str = "Debug";

/// Options of one CMake-built library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmakeOptions {
    /// Build directory, relative to the source directory
    pub build_dir: PathBuf,
    /// Library-specific configure arguments
    pub args: Vec<String>,
    /// Also build and install the Debug configuration
    pub build_debug: bool,
}

impl Default for CmakeOptions {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            args: Vec::new(),
            build_debug: false,
        }
    }
}

impl CmakeOptions {
    /// Configurations to build, Release first.
    pub fn configurations(&self) -> Vec<&'static str> {
        if self.build_debug {
            vec![RELEASE, DEBUG]
        } else {
            vec![RELEASE]
        }
    }
}

/// One subprocess call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: &Path, args: Vec<String>, cwd: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            args,
            cwd: cwd.to_path_buf(),
        }
    }

    /// Whether the invocation is a `--build` step
    pub fn is_build(&self) -> bool {
        self.args.first().is_some_and(|a| a == "--build")
    }

    /// Whether the invocation is an `--install` step
    pub fn is_install(&self) -> bool {
        self.args.first().is_some_and(|a| a == "--install")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Trait for running subprocesses - allows mocking in tests
pub trait CommandRunner {
    /// Run to completion; `Err` carries a description of the failure.
    fn run(&self, invocation: &Invocation) -> std::result::Result<(), String>;
}

/// Runs commands with inherited stdio so build output streams to the console.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> std::result::Result<(), String> {
        log::debug!("Running `{}` in {}", invocation, invocation.cwd.display());
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .status()
            .map_err(|e| format!("failed to start `{}`: {}", invocation, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("`{}` exited with {}", invocation, status))
        }
    }
}

/// Read the generator name from a `CMakeCache.txt`.
pub fn generator_from_cache(cache: &Path) -> Option<String> {
    let file = fs::File::open(cache).ok()?;
    let mut generator = None;
    for line in BufReader::new(file).lines() {
        let line = line.ok()?;
        if line.starts_with("CMAKE_GENERATOR:") {
            generator = line
                .split_once('=')
                .map(|(_, value)| value.trim().to_string());
        }
    }
    generator
}

/// Whether `generator` builds several configurations per configure step.
pub fn is_multi_config_generator(generator: &str) -> bool {
    generator.starts_with("Visual Studio") || MULTI_CONFIG_GENERATORS.contains(&generator)
}

/// Arguments of the initial configure step.
pub fn configure_args(
    config: &RunConfig,
    source_dir: &Path,
    install_dir: &Path,
    options: &CmakeOptions,
) -> Vec<String> {
    let mut args = vec![
        source_dir.display().to_string(),
        format!("-DCMAKE_INSTALL_PREFIX={}", install_dir.display()),
        format!("-DCMAKE_PREFIX_PATH={}", config.install_root.display()),
    ];
    args.extend(options.args.iter().cloned());
    args.extend(config.cmake_args.iter().cloned());
    if options.build_debug {
        args.push("-DCMAKE_DEBUG_POSTFIX=d".to_string());
    }
    args
}

/// Arguments of a reconfigure step for a single-config generator.
pub fn reconfigure_args(source_dir: &Path, configuration: &str) -> Vec<String> {
    vec![
        format!("-DCMAKE_BUILD_TYPE={}", configuration),
        source_dir.display().to_string(),
    ]
}

/// Arguments of a build step.
pub fn build_args(configuration: &str, multi_config: bool, jobs: Option<usize>) -> Vec<String> {
    let mut args = vec!["--build".to_string(), ".".to_string()];
    if multi_config {
        args.push("--config".to_string());
        args.push(configuration.to_string());
    }
    args.push("--parallel".to_string());
    if let Some(jobs) = jobs {
        args.push(jobs.to_string());
    }
    args
}

/// Arguments of an install step.
pub fn install_args(configuration: &str, multi_config: bool) -> Vec<String> {
    let mut args = vec!["--install".to_string(), ".".to_string()];
    if multi_config {
        args.push("--config".to_string());
        args.push(configuration.to_string());
    }
    args
}

/// Builds and installs CMake libraries.
pub struct CmakeBuild<'a> {
    config: &'a RunConfig,
    runner: &'a dyn CommandRunner,
    locks: &'a dyn LockProvider,
    reporter: &'a dyn Reporter,
}

impl<'a> CmakeBuild<'a> {
    pub fn new(
        config: &'a RunConfig,
        runner: &'a dyn CommandRunner,
        locks: &'a dyn LockProvider,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            config,
            runner,
            locks,
            reporter,
        }
    }

    /// Configure, build and install `name` from `source_dir` into `install_dir`.
    pub fn build_and_install(
        &self,
        name: &str,
        source_dir: &Path,
        install_dir: &Path,
        options: &CmakeOptions,
    ) -> Result<()> {
        self.reporter.info(&format!("Compiling [{}]...", name));

        let stage_error = |stage: Stage, message: String| Error::Stage {
            library: name.to_string(),
            stage,
            message,
        };

        let candidates = lock::candidates(source_dir, &options.build_dir, self.config.max_build_dirs)
            .map_err(|e| stage_error(Stage::AcquireLock, e.to_string()))?;
        let lock = lock::try_acquire(self.locks, candidates)
            .map_err(|e| stage_error(Stage::AcquireLock, e.to_string()))?
            .ok_or_else(|| {
                stage_error(
                    Stage::AcquireLock,
                    format!(
                        "all {} candidate build directories are locked",
                        self.config.max_build_dirs
                    ),
                )
            })?;
        log::debug!("[{}] building in {}", name, lock.dir().display());

        let result = lock::purge_except_lock(lock.dir())
            .map_err(|e| stage_error(Stage::AcquireLock, e.to_string()))
            .and_then(|()| self.run_stages(name, source_dir, install_dir, options, &lock));

        self.cleanup(name, source_dir, options, lock);
        result
    }

    fn run_stages(
        &self,
        name: &str,
        source_dir: &Path,
        install_dir: &Path,
        options: &CmakeOptions,
        lock: &BuildDirLock,
    ) -> Result<()> {
        let build_dir = lock.dir();
        let cmake = self.config.cmake.as_path();
        let run = |stage: Stage, args: Vec<String>| -> Result<()> {
            self.runner
                .run(&Invocation::new(cmake, args, build_dir))
                .map_err(|message| Error::Stage {
                    library: name.to_string(),
                    stage,
                    message,
                })
        };

        run(
            Stage::Configure,
            configure_args(self.config, source_dir, install_dir, options),
        )?;

        let multi_config = generator_from_cache(&build_dir.join("CMakeCache.txt"))
            .is_some_and(|generator| is_multi_config_generator(&generator));
        log::debug!("[{}] multi-config generator: {}", name, multi_config);

        let configurations = options.configurations();
        let mut install_dir_cleaned = false;

        for configuration in &configurations {
            if !multi_config {
                run(Stage::Reconfigure, reconfigure_args(source_dir, configuration))?;
            }

            run(
                Stage::Build,
                build_args(configuration, multi_config, self.config.jobs),
            )?;

            if configurations.len() > 1 {
                self.reporter.success(&format!(
                    "[{}] successfully built in {} configuration.",
                    name, configuration
                ));
            } else {
                self.reporter
                    .success(&format!("[{}] successfully built.", name));
            }

            if !install_dir_cleaned {
                recreate_dir(install_dir).map_err(|e| Error::Stage {
                    library: name.to_string(),
                    stage: Stage::CleanupInstall,
                    message: e.to_string(),
                })?;
                install_dir_cleaned = true;
            }

            run(Stage::Install, install_args(configuration, multi_config))?;
        }

        Ok(())
    }

    fn cleanup(&self, name: &str, source_dir: &Path, options: &CmakeOptions, lock: BuildDirLock) {
        let dir = lock.dir().to_path_buf();
        if let Err(e) = lock.remove() {
            self.reporter.warning(&format!(
                "[{}] failed to remove build directory {}: {}",
                name,
                dir.display(),
                e
            ));
        }

        let swept = lock::sweep_stale(
            self.locks,
            source_dir,
            &options.build_dir,
            self.config.max_build_dirs,
            &dir,
        );
        if swept > 0 {
            log::debug!("[{}] removed {} stale build directories", name, swept);
        }
    }
}

fn recreate_dir(dir: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(dir)
}
