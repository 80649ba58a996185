//! Error types for the watch pipeline.

use thiserror::Error;

/// Errors from configuration, subscription, and command execution.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error(
        "no command given for patterns: {patterns}\nfollow every set of patterns with -r <cmd> or --run <cmd>"
    )]
    DanglingPatterns { patterns: String },

    #[error("expected a command after {flag}")]
    MissingCommand { flag: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("cannot execute an empty command")]
    EmptyCommand,

    #[error("failed to spawn '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("command '{command}' exited with {status}")]
    CommandFailed { command: String, status: String },

    #[error("command '{command}' timed out after {seconds}s and was killed")]
    CommandTimeout { command: String, seconds: u64 },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
