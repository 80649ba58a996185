//! Layered runtime configuration.
//!
//! Settings are assembled from, in increasing precedence:
//! - built-in defaults
//! - an optional `argus.toml` in the working directory
//! - `ARGUS_`-prefixed environment variables (double underscore nests:
//!   `ARGUS_LOGGING__DEFAULT=debug` sets `logging.default`)
//! - command-line flags
//!
//! Watch groups are never configured here; they come from the positional
//! command-line grammar (see `cli`).

use std::collections::HashMap;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::watcher::TimingPolicy;

/// Config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "argus.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Fixed leading tokens prefixed to every group's command suffix.
    #[serde(default = "default_base_command")]
    pub base_command: Vec<String>,

    /// Quiet period before a flush, in milliseconds. Zero disables.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Minimum spacing between flushes, in milliseconds. Unset disables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_ms: Option<u64>,

    /// Report commands instead of running them.
    #[serde(default = "default_false")]
    pub dry_run: bool,

    /// Wall-clock limit for one command run, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level filter (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `watch = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_command: default_base_command(),
            debounce_ms: default_debounce_ms(),
            throttle_ms: None,
            dry_run: false,
            command_timeout_secs: default_command_timeout_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Load defaults, config file, and environment, in that order.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("ARGUS_").split("__"))
            .extract()
    }

    /// Apply command-line overrides on top of loaded settings.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if !cli.basecmd.is_empty() {
            self.base_command = cli.basecmd.clone();
        }
        if let Some(debounce) = cli.debounce {
            self.debounce_ms = debounce;
        }
        if let Some(throttle) = cli.throttle {
            self.throttle_ms = Some(throttle);
        }
        if let Some(timeout) = cli.timeout {
            self.command_timeout_secs = timeout;
        }
        if cli.dry_run {
            self.dry_run = true;
        }
    }

    pub fn timing_policy(&self) -> TimingPolicy {
        TimingPolicy::from_millis(self.debounce_ms, self.throttle_ms)
    }
}

fn default_base_command() -> Vec<String> {
    vec!["npm".to_string(), "run".to_string()]
}

fn default_debounce_ms() -> u64 {
    1500
}

fn default_command_timeout_secs() -> u64 {
    60
}

fn default_false() -> bool {
    false
}

fn default_log_level() -> String {
    "warn".to_string()
}
