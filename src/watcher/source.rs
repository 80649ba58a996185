//! File watch sources: where raw change events come from.
//!
//! `FileWatchSource` is the seam between the pipeline and the underlying
//! filesystem notification mechanism. The production implementation
//! (`NotifySource`) is built on `notify`; tests drive the pipeline through
//! `Subscription::channel` with scripted events instead.

use std::any::Any;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::overrides::{Override, OverrideBuilder};
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::error::WatchError;

/// A single observed filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: WatchEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Change kinds, matching the event vocabulary of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Add,
    AddDir,
    Unlink,
    UnlinkDir,
    Change,
}

impl WatchEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchEventKind::Add => "add",
            WatchEventKind::AddDir => "addDir",
            WatchEventKind::Unlink => "unlink",
            WatchEventKind::UnlinkDir => "unlinkDir",
            WatchEventKind::Change => "change",
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, WatchEventKind::AddDir | WatchEventKind::UnlinkDir)
    }
}

impl std::fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages emitted by a subscription.
///
/// `Error` is informational: the stream stays alive after reporting one.
#[derive(Debug, Clone)]
pub enum SourceMessage {
    /// Initial watch registration completed.
    Ready,
    /// A matching filesystem change.
    Event(WatchEvent),
    /// A non-fatal source error (bad path, permissions, overflow).
    Error(String),
}

/// A live event stream for one watch group.
///
/// Dropping (or closing) the subscription releases the underlying watches.
pub struct Subscription {
    rx: mpsc::Receiver<SourceMessage>,
    guard: Option<Box<dyn Any + Send>>,
}

impl Subscription {
    /// Create a subscription backed by a plain channel.
    ///
    /// Used by scripted sources in tests and by custom integrations.
    pub fn channel(capacity: usize) -> (mpsc::Sender<SourceMessage>, Subscription) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Subscription { rx, guard: None })
    }

    /// Receive the next message; `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<SourceMessage> {
        self.rx.recv().await
    }

    /// Stop the stream and release the underlying watches.
    pub fn close(&mut self) {
        self.guard = None;
        self.rx.close();
    }
}

/// Source of raw change events for a pattern set.
pub trait FileWatchSource {
    /// Subscribe to changes matching `include` and not matching `exclude`.
    ///
    /// The returned stream signals `Ready` once initial registration is
    /// complete and reports later problems as `Error` messages without
    /// terminating.
    fn subscribe(
        &self,
        include: &[String],
        exclude: &[String],
    ) -> Result<Subscription, WatchError>;
}

/// Production source backed by `notify`.
///
/// Each subscription gets its own recursive watcher rooted at the non-glob
/// prefix of every include pattern, with events filtered through an
/// `ignore` override matcher so exclude patterns never reach the pipeline.
pub struct NotifySource {
    root: PathBuf,
}

impl NotifySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileWatchSource for NotifySource {
    fn subscribe(
        &self,
        include: &[String],
        exclude: &[String],
    ) -> Result<Subscription, WatchError> {
        let matcher = build_matcher(&self.root, include, exclude)?;
        let (tx, rx) = mpsc::channel(256);

        let root = self.root.clone();
        let event_tx = tx.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for watch_event in translate(&event, &root, &matcher) {
                        if event_tx.blocking_send(SourceMessage::Event(watch_event)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = event_tx.blocking_send(SourceMessage::Error(e.to_string()));
                }
            })?;

        for watch_root in watch_roots(include) {
            let path = self.root.join(&watch_root);
            if let Err(e) = watcher.watch(&path, RecursiveMode::Recursive) {
                // Report and keep going: one bad root must not kill the group.
                let _ = tx.try_send(SourceMessage::Error(format!(
                    "{}: {e}",
                    watch_root.display()
                )));
            }
        }
        let _ = tx.try_send(SourceMessage::Ready);

        Ok(Subscription {
            rx,
            guard: Some(Box::new(watcher)),
        })
    }
}

/// Build the include/exclude matcher for one group.
///
/// Include patterns are whitelist globs; excludes are re-prefixed with `!`,
/// which is exactly the override semantics of the `ignore` crate.
fn build_matcher(
    root: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<Override, WatchError> {
    let mut builder = OverrideBuilder::new(root);
    for pattern in include {
        builder.add(pattern).map_err(|e| WatchError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
    }
    for pattern in exclude {
        builder
            .add(&format!("!{pattern}"))
            .map_err(|e| WatchError::InvalidPattern {
                pattern: format!("!{pattern}"),
                reason: e.to_string(),
            })?;
    }
    builder.build().map_err(|e| WatchError::InvalidPattern {
        pattern: String::new(),
        reason: e.to_string(),
    })
}

/// Translate a raw notify event into matching watch events.
fn translate(event: &Event, root: &Path, matcher: &Override) -> Vec<WatchEvent> {
    let Some(kind) = translate_kind(&event.kind) else {
        return Vec::new();
    };

    event
        .paths
        .iter()
        .filter_map(|path| {
            let relative = path.strip_prefix(root).unwrap_or(path);
            if relative.as_os_str().is_empty() {
                return None;
            }
            if !matcher.matched(relative, kind.is_dir()).is_whitelist() {
                return None;
            }
            Some(WatchEvent::new(relative, kind))
        })
        .collect()
}

fn translate_kind(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(CreateKind::Folder) => Some(WatchEventKind::AddDir),
        EventKind::Create(_) => Some(WatchEventKind::Add),
        EventKind::Remove(RemoveKind::Folder) => Some(WatchEventKind::UnlinkDir),
        EventKind::Remove(_) => Some(WatchEventKind::Unlink),
        // Metadata churn (chmod, mtime-only touches) is not a content change.
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(WatchEventKind::Change),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Longest literal prefix of a glob pattern, used as the directory to watch.
fn watch_root(pattern: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for component in Path::new(pattern).components() {
        let text = component.as_os_str().to_string_lossy();
        if text.contains(['*', '?', '[', '{']) {
            break;
        }
        root.push(component);
    }
    if root.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        root
    }
}

/// Minimal set of recursive watch roots covering all include patterns.
fn watch_roots(include: &[String]) -> Vec<PathBuf> {
    let unique: HashSet<PathBuf> = include.iter().map(|p| watch_root(p)).collect();
    if unique.contains(Path::new(".")) {
        return vec![PathBuf::from(".")];
    }

    let mut roots: Vec<PathBuf> = unique.into_iter().collect();
    roots.sort();

    let mut kept: Vec<PathBuf> = Vec::new();
    for root in roots {
        if !kept.iter().any(|ancestor| root.starts_with(ancestor)) {
            kept.push(root);
        }
    }
    kept
}
