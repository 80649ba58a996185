//! Status broadcasting to registered observers.
//!
//! Components never write to a global sink; they publish through a
//! broadcaster injected at construction time. The binary subscribes a
//! console observer, tests subscribe recording ones.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;

/// Receives status and error messages from the pipeline.
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, message: &str);
}

impl<F> StatusObserver for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_status(&self, message: &str) {
        self(message)
    }
}

/// Fans every published message out to all observers in subscription order.
///
/// Cloning is cheap; all clones share the observer list.
#[derive(Clone, Default)]
pub struct StatusBroadcaster {
    observers: Arc<RwLock<Vec<Box<dyn StatusObserver>>>>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Delivery order follows subscription order.
    pub fn subscribe(&self, observer: impl StatusObserver + 'static) {
        self.observers.write().push(Box::new(observer));
    }

    /// Deliver `message` to every observer.
    ///
    /// A panicking observer is logged and skipped; the rest still receive
    /// the message.
    pub fn publish(&self, message: &str) {
        let observers = self.observers.read();
        for (i, observer) in observers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| observer.on_status(message))).is_err() {
                tracing::warn!("[status] observer {i} panicked while handling a message");
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}
