//! # Output Configuration
//!
//! This module decides whether console output is coloured and provides the
//! [`ConsoleReporter`], which prints status events the way a build log is
//! usually read: blue for progress, green for success, yellow for warnings
//! and red for errors.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals

use std::env;
use std::io::Write;

use console::{style, StyledObject};

use crate::events::{EventKind, Reporter};

/// Output configuration for controlling colors.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of NO_COLOR (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Prints status events to stdout.
#[derive(Debug, Clone)]
pub struct ConsoleReporter {
    config: OutputConfig,
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            quiet: false,
        }
    }

    /// Suppress info and success events; warnings and errors are always shown.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Render one event as a printable line.
    pub fn render(&self, kind: EventKind, message: &str) -> String {
        if !self.config.use_color {
            return message.to_string();
        }
        let styled: StyledObject<&str> = match kind {
            EventKind::Info => style(message).blue(),
            EventKind::Success => style(message).green(),
            EventKind::Warning => style(message).yellow(),
            EventKind::Error => style(message).red(),
        };
        styled.force_styling(true).to_string()
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, kind: EventKind, message: &str) {
        if self.quiet && kind < EventKind::Warning {
            return;
        }
        let line = self.render(kind, message);
        let mut stdout = std::io::stdout().lock();
        // Flush per line so events interleave correctly with build tool output.
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }
}
