//! Batched file-watch pipeline.
//!
//! Turns an unbounded stream of raw filesystem events into a rate-limited,
//! batched stream of command dispatches, one pipeline per watch group.
//!
//! # Architecture
//!
//! ```text
//! WatchGroupManager
//!   - one pipeline task per WatchGroup
//!         |
//! FileWatchSource -> EventAccumulator -> TimingCoordinator
//!                                             |  (on fire)
//!                                        Dispatcher -> CommandExecutor
//!
//! status messages from any component -> StatusBroadcaster -> observers
//! ```

mod accumulator;
mod dispatch;
mod error;
mod manager;
mod source;
mod status;
mod timing;

pub use accumulator::EventAccumulator;
pub use dispatch::{
    CommandExecutor, CommandSpec, DEFAULT_COMMAND_TIMEOUT, Dispatcher, DryRunExecutor,
    ProcessExecutor, render_command,
};
pub use error::WatchError;
pub use manager::{WatchGroup, WatchGroupManager};
pub use source::{
    FileWatchSource, NotifySource, SourceMessage, Subscription, WatchEvent, WatchEventKind,
};
pub use status::{StatusBroadcaster, StatusObserver};
pub use timing::{TimingCoordinator, TimingPolicy};
