//! Group lifecycle: wiring sources, accumulators, and timers together.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::accumulator::EventAccumulator;
use super::dispatch::{CommandExecutor, CommandSpec, Dispatcher};
use super::source::{FileWatchSource, SourceMessage, Subscription};
use super::status::StatusBroadcaster;
use super::timing::{TimingCoordinator, TimingPolicy};

/// A pattern set bound to one command suffix.
///
/// Built once at startup; immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct WatchGroup {
    /// Command suffix, also the group's identity.
    pub id: String,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Raw pattern list as given, for status messages.
    label: String,
}

impl WatchGroup {
    /// Split raw patterns into include/exclude sets.
    ///
    /// Patterns prefixed with `!` are moved to the exclude set, with the
    /// prefix stripped.
    pub fn new(id: impl Into<String>, patterns: Vec<String>) -> Self {
        let label = patterns.join(";");
        let (exclude, include): (Vec<String>, Vec<String>) =
            patterns.into_iter().partition(|p| p.starts_with('!'));
        Self {
            id: id.into(),
            include_patterns: include,
            exclude_patterns: exclude.into_iter().map(|p| p[1..].to_string()).collect(),
            label,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Current time from tokio's clock.
///
/// Keeps the coordinator consistent with `sleep_until` under a paused
/// test clock as well as the real runtime.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Per-group lifecycle state, tracked for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupState {
    Idle,
    Accumulating,
    Flushing,
}

/// Owns one accumulator, coordinator, and source subscription per group.
pub struct WatchGroupManager {
    groups: Vec<WatchGroup>,
    policy: TimingPolicy,
    base_tokens: Vec<String>,
    executor: Arc<dyn CommandExecutor>,
    status: StatusBroadcaster,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl WatchGroupManager {
    pub fn new(
        groups: Vec<WatchGroup>,
        policy: TimingPolicy,
        base_tokens: Vec<String>,
        executor: Arc<dyn CommandExecutor>,
        status: StatusBroadcaster,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            groups,
            policy,
            base_tokens,
            executor,
            status,
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Subscribe every group and start routing events.
    ///
    /// A group whose subscription fails is reported and skipped; the other
    /// groups keep watching.
    pub fn start(&mut self, source: &dyn FileWatchSource) {
        for group in &self.groups {
            let subscription =
                match source.subscribe(&group.include_patterns, &group.exclude_patterns) {
                    Ok(sub) => sub,
                    Err(e) => {
                        self.status
                            .publish(&format!("watcher ({}): {e}", group.label()));
                        continue;
                    }
                };

            let accumulator = Arc::new(EventAccumulator::new());
            let dispatcher = Dispatcher::new(
                CommandSpec::new(self.base_tokens.clone(), group.id.clone()),
                accumulator.clone(),
                self.executor.clone(),
                self.status.clone(),
            );
            let pipeline = GroupPipeline {
                label: group.label().to_string(),
                subscription,
                accumulator,
                coordinator: TimingCoordinator::new(self.policy),
                dispatcher,
                status: self.status.clone(),
                shutdown: self.shutdown.subscribe(),
            };

            crate::debug_event!("manager", "starting group", "{}", group.id);
            self.tasks.push(tokio::spawn(pipeline.run()));
        }
    }

    /// Unsubscribe every group and cancel armed flush timers.
    ///
    /// No dispatch fires after this returns.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        crate::debug_event!("manager", "stopped");
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// One group's event loop: source messages in, dispatches out.
struct GroupPipeline {
    label: String,
    subscription: Subscription,
    accumulator: Arc<EventAccumulator>,
    coordinator: TimingCoordinator,
    dispatcher: Dispatcher,
    status: StatusBroadcaster,
    shutdown: watch::Receiver<bool>,
}

impl GroupPipeline {
    async fn run(mut self) {
        let mut state = GroupState::Idle;

        loop {
            let deadline = self.coordinator.next_deadline();
            let timer = async {
                match deadline {
                    Some(at) => {
                        tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = self.shutdown.changed() => {
                    self.coordinator.cancel();
                    self.subscription.close();
                    break;
                }

                message = self.subscription.recv() => match message {
                    Some(SourceMessage::Ready) => {
                        self.status
                            .publish(&format!("watcher ({}): ready", self.label));
                    }
                    Some(SourceMessage::Error(e)) => {
                        self.status
                            .publish(&format!("watcher ({}): error: {e}", self.label));
                    }
                    Some(SourceMessage::Event(event)) => {
                        crate::debug_event!(
                            "watch",
                            event.kind,
                            "{}",
                            event.path.display()
                        );
                        self.accumulator.append(event);
                        self.transition(&mut state, GroupState::Accumulating);
                        if self.coordinator.on_event(now()) {
                            self.flush(&mut state).await;
                        }
                    }
                    None => break,
                },

                _ = timer => {
                    if self.coordinator.poll(now()) {
                        self.flush(&mut state).await;
                    }
                }
            }
        }

        crate::debug_event!("watch", "group loop ended", "{}", self.label);
    }

    async fn flush(&mut self, state: &mut GroupState) {
        self.transition(state, GroupState::Flushing);
        self.dispatcher.dispatch().await;

        // Events that arrived during the dispatch keep the group accumulating.
        let next = if self.accumulator.is_empty() {
            GroupState::Idle
        } else {
            GroupState::Accumulating
        };
        self.transition(state, next);
    }

    fn transition(&self, state: &mut GroupState, next: GroupState) {
        if *state != next {
            crate::debug_event!("watch", "state", "{}: {:?} -> {next:?}", self.label, state);
            *state = next;
        }
    }
}
