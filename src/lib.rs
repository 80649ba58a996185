pub mod cli;
pub mod config;
pub mod logging;
pub mod watcher;

pub use cli::{Cli, GroupSpec, parse_groups};
pub use config::Settings;
pub use watcher::{
    CommandExecutor, DryRunExecutor, NotifySource, ProcessExecutor, StatusBroadcaster,
    WatchError, WatchEvent, WatchGroup, WatchGroupManager,
};
