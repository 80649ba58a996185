//! Command-line parsing.
//!
//! Global flags are handled by clap; the positional grammar
//! `<pattern>... -r <cmd> [<pattern>... -r <cmd>]...` is captured as a
//! trailing token list and split into groups by [`parse_groups`].

use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

use crate::watcher::WatchError;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser, Debug)]
#[command(
    name = "argus",
    version,
    styles = clap_cargo_style(),
    about = "Watch path patterns and run batched commands when matching files change",
    after_help = "\
Examples:
  $ argus 'src/**' -r build                     # npm run build on changes under src/
  $ argus 'src/**' '!**/*.tmp' -r build         # same, ignoring .tmp files
  $ argus -t 2000 'src/**' -r build 'docs/**' -r docs
  $ argus -n -b cargo 'src/**/*.rs' -r check    # dry-run: report `cargo check`

Every set of patterns must be followed by -r <cmd> (or --run <cmd>), which
names the command suffix appended to the base command."
)]
pub struct Cli {
    /// Report the commands that would run without executing them
    #[arg(short = 'n', long = "dry-run", alias = "dryrun")]
    pub dry_run: bool,

    /// Quiet period in milliseconds before running (0 disables)
    #[arg(short = 'd', long = "debounce", value_name = "MS")]
    pub debounce: Option<u64>,

    /// Run at most once per this many milliseconds
    #[arg(short = 't', long = "throttle", value_name = "MS")]
    pub throttle: Option<u64>,

    /// Base command token (repeat to build the full prefix; default: npm run)
    #[arg(short = 'b', long = "basecmd", value_name = "TOKEN")]
    pub basecmd: Vec<String>,

    /// Kill a running command after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path patterns and `-r <cmd>` group separators
    #[arg(
        value_name = "PATTERN|-r CMD",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub groups: Vec<String>,
}

/// One raw pattern set bound to a command suffix, before `!` normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub patterns: Vec<String>,
    pub command_suffix: String,
}

/// Split the trailing token list into pattern groups.
///
/// Walks the tokens in order, collecting patterns until a `-r`/`--run`
/// separator closes the group with its command suffix. Patterns left over
/// at the end are a configuration error, not a silent drop.
pub fn parse_groups(tokens: &[String]) -> Result<Vec<GroupSpec>, WatchError> {
    let mut groups = Vec::new();
    let mut patterns: Vec<String> = Vec::new();
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        if token == "-r" || token == "--run" {
            let suffix = iter.next().ok_or_else(|| WatchError::MissingCommand {
                flag: token.clone(),
            })?;
            groups.push(GroupSpec {
                patterns: std::mem::take(&mut patterns),
                command_suffix: suffix.clone(),
            });
        } else {
            patterns.push(token.clone());
        }
    }

    if !patterns.is_empty() {
        return Err(WatchError::DanglingPatterns {
            patterns: patterns.join(" "),
        });
    }

    Ok(groups)
}
