//! # `add-manual-lib`
//!
//! Adds a library installed by copy rules. The group's own options are
//! followed by one or more `rule` sub-groups:
//!
//! ```text
//! add-manual-lib --src SteamworksSDK --install SteamworksSDK \
//!     rule --src 'redistributable_bin/**/*.dll' --dst bin \
//!     rule --src 'public/steam/*.h' --dst include/steam --ex 'isteam*.h'
//! ```
//!
//! When a pattern contains wildcards, its constant prefix is dropped from the
//! destination: `redistributable_bin/**/*.dll` with `--dst bin` copies
//! `redistributable_bin/win64/steam_api64.dll` to `bin/win64/steam_api64.dll`.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Parser;

use depforge::library::{LibrarySpec, ManualSpec};
use depforge::rules::Rule;

pub const NAME: &str = "add-manual-lib";
pub const RULE: &str = "rule";

/// Define manual copy rules for a library
#[derive(Parser, Debug)]
#[command(name = NAME)]
pub struct ManualLibArgs {
    /// Source subfolder (relative to --sources-dir)
    #[arg(long, value_name = "DIR")]
    pub src: PathBuf,

    /// Install subfolder (relative to --install-dir)
    #[arg(long, value_name = "DIR")]
    pub install: PathBuf,

    /// One or more 'rule' sub-groups (see `rule --help`)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "RULES")]
    pub rules: Vec<String>,
}

/// Defines a single copy rule for 'add-manual-lib'
#[derive(Parser, Debug)]
#[command(name = RULE)]
pub struct RuleArgs {
    /// Source glob pattern (relative to the library's --src)
    #[arg(long, value_name = "PATTERN")]
    pub src: String,

    /// Destination subfolder (relative to the library's --install)
    #[arg(long, value_name = "DIR")]
    pub dst: PathBuf,

    /// Glob of files or directories to leave out (relative to the pattern's
    /// constant prefix)
    #[arg(long, value_name = "PATTERN")]
    pub ex: Option<String>,
}

impl From<RuleArgs> for Rule {
    fn from(args: RuleArgs) -> Self {
        let rule = Rule::new(args.src, args.dst);
        match args.ex {
            Some(ex) => rule.excluding(ex),
            None => rule,
        }
    }
}

/// Split rule tokens into `rule ...` sub-groups and parse each one.
pub fn parse_rules(library: &str, tokens: &[String]) -> Result<Vec<Rule>> {
    if tokens.first().map(String::as_str) != Some(RULE) {
        bail!(
            "Invalid {} syntax for {}: expected 'rule' sub-groups after --src/--install",
            NAME,
            library
        );
    }

    let mut rules = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let end = tokens[start + 1..]
            .iter()
            .position(|t| t == RULE)
            .map_or(tokens.len(), |i| start + 1 + i);
        let rule_args = &tokens[start..end];
        let parsed = RuleArgs::try_parse_from(rule_args).map_err(|e| {
            if e.kind() == clap::error::ErrorKind::DisplayHelp {
                anyhow!(e)
            } else {
                anyhow!(e).context(format!(
                    "Failed to parse 'rule' args: {}",
                    rule_args[1..].join(" ")
                ))
            }
        })?;
        rules.push(parsed.into());
        start = end;
    }
    Ok(rules)
}

/// Parse an `add-manual-lib` group.
pub fn parse(group: &[String]) -> Result<LibrarySpec> {
    let args = ManualLibArgs::try_parse_from(group)?;
    let rules = parse_rules(&args.src.display().to_string(), &args.rules)?;
    Ok(ManualSpec {
        src: args.src,
        install: Some(args.install),
        rules,
    }
    .into())
}
