//! Batch dispatch and command execution.

use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::accumulator::EventAccumulator;
use super::error::WatchError;
use super::source::WatchEvent;
use super::status::StatusBroadcaster;

/// Default wall-clock limit for one command run.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// The fixed base tokens plus the per-group suffix.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub base_tokens: Vec<String>,
    pub suffix: String,
}

impl CommandSpec {
    pub fn new(base_tokens: Vec<String>, suffix: impl Into<String>) -> Self {
        Self {
            base_tokens,
            suffix: suffix.into(),
        }
    }

    /// Full token list sent to execution: base tokens plus the suffix.
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens = self.base_tokens.clone();
        tokens.push(self.suffix.clone());
        tokens
    }
}

/// Quote tokens containing spaces when rendering a command line.
pub fn render_command(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| {
            if t.contains(' ') {
                format!("\"{t}\"")
            } else {
                t.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Executes a token list against a batch of events.
///
/// Implementations must not panic and must not propagate failures as
/// anything other than the returned error.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, tokens: &[String], batch: &[WatchEvent]) -> Result<(), WatchError>;
}

/// Runs the command as a child process with inherited stdio.
///
/// The child is polled until it exits or the wall-clock timeout elapses,
/// at which point it is killed.
pub struct ProcessExecutor {
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandExecutor for ProcessExecutor {
    fn execute(&self, tokens: &[String], _batch: &[WatchEvent]) -> Result<(), WatchError> {
        let (program, args) = tokens.split_first().ok_or(WatchError::EmptyCommand)?;
        let rendered = render_command(tokens);

        crate::log_event!("exec", "running", "{rendered}");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| WatchError::SpawnFailed {
                command: rendered.clone(),
                reason: e.to_string(),
            })?;

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if status.success() {
                        return Ok(());
                    }
                    return Err(WatchError::CommandFailed {
                        command: rendered,
                        status: status.to_string(),
                    });
                }
                Ok(None) => {
                    if started.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(WatchError::CommandTimeout {
                            command: rendered,
                            seconds: self.timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
                Err(e) => {
                    return Err(WatchError::SpawnFailed {
                        command: rendered,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Reports the command line instead of running it.
///
/// Batching and timing are identical to run mode; only the final step is
/// replaced by a status message.
pub struct DryRunExecutor {
    status: StatusBroadcaster,
}

impl DryRunExecutor {
    pub fn new(status: StatusBroadcaster) -> Self {
        Self { status }
    }
}

impl CommandExecutor for DryRunExecutor {
    fn execute(&self, tokens: &[String], _batch: &[WatchEvent]) -> Result<(), WatchError> {
        self.status
            .publish(&format!("not running: {}", render_command(tokens)));
        Ok(())
    }
}

/// Flushes a group's accumulator and hands the batch to the executor.
///
/// Flush-and-clear and dispatch are one logical step: an event is either in
/// this batch or the next, never both, never neither. Execution runs on the
/// blocking pool so a slow command never stalls other groups' timers; the
/// owning group awaits the result, keeping at most one run in flight per
/// group.
pub struct Dispatcher {
    spec: CommandSpec,
    accumulator: Arc<EventAccumulator>,
    executor: Arc<dyn CommandExecutor>,
    status: StatusBroadcaster,
}

impl Dispatcher {
    pub fn new(
        spec: CommandSpec,
        accumulator: Arc<EventAccumulator>,
        executor: Arc<dyn CommandExecutor>,
        status: StatusBroadcaster,
    ) -> Self {
        Self {
            spec,
            accumulator,
            executor,
            status,
        }
    }

    /// Flush the pending batch and execute the command against it.
    ///
    /// Execution failures are reported through the status channel and never
    /// propagated; the group stays eligible for the next event.
    pub async fn dispatch(&self) {
        let batch = self.accumulator.flush_and_clear();
        let tokens = self.spec.tokens();
        let executor = self.executor.clone();

        crate::debug_event!("dispatch", self.spec.suffix, "{} events", batch.len());

        let result =
            tokio::task::spawn_blocking(move || executor.execute(&tokens, &batch)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.status.publish(&e.to_string()),
            Err(e) => self
                .status
                .publish(&format!("command task failed: {e}")),
        }
    }
}
