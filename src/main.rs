use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use argus::cli::{Cli, parse_groups};
use argus::config::Settings;
use argus::watcher::{
    CommandExecutor, DryRunExecutor, NotifySource, ProcessExecutor, StatusBroadcaster,
    WatchGroup, WatchGroupManager,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().context("failed to load configuration")?;
    settings.apply_cli(&cli);
    argus::logging::init_with_config(&settings.logging);

    // Configuration errors are fatal before any watching starts.
    let specs = parse_groups(&cli.groups)?;
    if specs.is_empty() {
        Cli::command().print_help()?;
        return Ok(());
    }

    let groups: Vec<WatchGroup> = specs
        .into_iter()
        .map(|spec| WatchGroup::new(spec.command_suffix, spec.patterns))
        .collect();

    let status = StatusBroadcaster::new();
    status.subscribe(|message: &str| println!("{message}"));

    let executor: Arc<dyn CommandExecutor> = if settings.dry_run {
        Arc::new(DryRunExecutor::new(status.clone()))
    } else {
        Arc::new(ProcessExecutor::new(Duration::from_secs(
            settings.command_timeout_secs,
        )))
    };

    let all_patterns: Vec<&str> = groups.iter().map(|g| g.label()).collect();
    status.publish(&format!("watching {}", all_patterns.join(" ")));

    let root = std::env::current_dir().context("cannot determine working directory")?;
    let source = NotifySource::new(root);

    let mut manager = WatchGroupManager::new(
        groups,
        settings.timing_policy(),
        settings.base_command.clone(),
        executor,
        status,
    );
    manager.start(&source);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    argus::log_event!("main", "shutting down");
    manager.stop().await;

    Ok(())
}
