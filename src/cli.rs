//! CLI argument parsing and run dispatch
//!
//! The command line is split into a leading group of global options and one
//! group per library, each starting with a command name from
//! [`commands::COMMAND_NAMES`]. Global options are parsed with [`GlobalArgs`];
//! library groups are parsed by their command modules.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use depforge::config::{
    default_install_root, manifest_from_file, split_args, RunConfig, DEFAULT_MAX_BUILD_DIRS,
};
use depforge::events::Reporter;
use depforge::installer::Installer;
use depforge::library::{resolve_all, LibrarySpec};
use depforge::output::{ConsoleReporter, OutputConfig};

use crate::commands;

const AFTER_HELP: &str = "\
Libraries are added with command groups after the global options:

  add-cmake-lib  --src DIR [--install DIR] [--build-dir DIR] [--args ARGS] [--build-debug]
  add-header-lib --src DIR [--install-subdir DIR] --glob PATTERN [--glob PATTERN ...]
  add-manual-lib --src DIR --install DIR rule --src PATTERN --dst DIR [--ex PATTERN] [rule ...]

Run `depforge <global options> <command> --help` for details on a command.";

/// depforge - Build and install third-party libraries from source
#[derive(Parser, Debug)]
#[command(name = "depforge")]
#[command(version, about, long_about = None, after_help = AFTER_HELP)]
pub struct GlobalArgs {
    /// Root directory containing library sources
    #[arg(long, value_name = "DIR", env = "DEPFORGE_SOURCES_DIR", default_value = "src")]
    pub sources_dir: PathBuf,

    /// Root directory for installed libraries [default: bin/<platform>]
    #[arg(long, value_name = "DIR", env = "DEPFORGE_INSTALL_DIR")]
    pub install_dir: Option<PathBuf>,

    /// Directory for freshness records [default: each library's install folder]
    #[arg(long, value_name = "DIR", env = "DEPFORGE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Subdirectory of the install root for header-only libraries
    #[arg(long, value_name = "DIR", default_value = "header-only")]
    pub header_subdir: PathBuf,

    /// CMake executable
    #[arg(long, value_name = "PATH", env = "DEPFORGE_CMAKE", default_value = "cmake")]
    pub cmake: PathBuf,

    /// Git executable
    #[arg(long, value_name = "PATH", default_value = "git")]
    pub git: PathBuf,

    /// CMake arguments applied to every library, as a single quoted string
    #[arg(
        long,
        value_name = "ARGS",
        env = "DEPFORGE_CMAKE_ARGS",
        default_value = "",
        allow_hyphen_values = true
    )]
    pub cmake_args: String,

    /// Parallel build jobs passed to `cmake --build --parallel`
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Number of build directories to try before giving up on a locked one
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_BUILD_DIRS)]
    pub max_build_dirs: usize,

    /// YAML manifest of libraries, processed before command-line libraries
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Log debug details (commands run, lock fallbacks)
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl GlobalArgs {
    /// Build the run configuration from the global options.
    pub fn run_config(&self) -> depforge::error::Result<RunConfig> {
        let cmake_args = split_args(&self.cmake_args).map_err(|e| match e {
            depforge::error::Error::ConfigParse { message, hint } => {
                depforge::error::Error::ConfigParse {
                    message: format!("Failed to parse global --cmake-args: {}", message),
                    hint,
                }
            }
            other => other,
        })?;

        let install_root = self
            .install_dir
            .clone()
            .unwrap_or_else(default_install_root);
        let mut config = RunConfig::new(&self.sources_dir, install_root)
            .with_header_subdir(self.header_subdir.clone())
            .with_cmake(self.cmake.clone())
            .with_git(self.git.clone())
            .with_cmake_args(cmake_args)
            .with_jobs(self.jobs)
            .with_max_build_dirs(self.max_build_dirs);
        if let Some(cache_dir) = &self.cache_dir {
            config = config.with_cache_root(cache_dir);
        }
        Ok(config)
    }

    fn log_filter(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

/// Split `args` (without the program name) into the global group and one
/// group per library command. Each library group starts with its command name.
pub fn group_args(args: &[String]) -> (Vec<String>, Vec<Vec<String>>) {
    let mut global = Vec::new();
    let mut groups: Vec<Vec<String>> = Vec::new();

    for arg in args {
        if commands::COMMAND_NAMES.contains(&arg.as_str()) {
            groups.push(vec![arg.clone()]);
        } else if let Some(group) = groups.last_mut() {
            group.push(arg.clone());
        } else {
            global.push(arg.clone());
        }
    }

    (global, groups)
}

fn init_logging(filter: &str) {
    let env = env_logger::Env::default().default_filter_or(filter);
    // A logger may already be installed when running under a test harness.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

/// Collect manifest libraries followed by command-line libraries.
fn collect_specs(globals: &GlobalArgs, groups: &[Vec<String>]) -> Result<Vec<LibrarySpec>> {
    let mut specs = match &globals.manifest {
        Some(path) => manifest_from_file(path)?,
        None => Vec::new(),
    };

    for group in groups {
        match commands::parse_group(group) {
            Ok(spec) => specs.push(spec),
            Err(e) => match e.downcast::<clap::Error>() {
                Ok(clap_error) => clap_error.exit(),
                Err(e) => {
                    return Err(e.context(format!("Failed to process command: {}", group.join(" "))))
                }
            },
        }
    }

    Ok(specs)
}

/// Run the tool with `args` (without the program name).
pub fn run(args: Vec<String>) -> Result<ExitCode> {
    let (global, groups) = group_args(&args);
    let globals = GlobalArgs::parse_from(std::iter::once("depforge".to_string()).chain(global));

    init_logging(globals.log_filter());

    let output = OutputConfig::from_env_and_flag(&globals.color);
    let reporter = ConsoleReporter::new(output).quiet(globals.quiet);

    let prepared = globals.run_config().map_err(anyhow::Error::from).and_then(|config| {
        let specs = collect_specs(&globals, &groups)?;
        let libraries = resolve_all(&specs, &config)?;
        Ok((config, libraries))
    });

    let (config, libraries) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            reporter.error(&format!("{:#}", e));
            return Ok(ExitCode::from(1));
        }
    };
    log::debug!("Run configuration: {:?}", config);

    let summary = Installer::new(config, Box::new(reporter)).run(&libraries);
    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
