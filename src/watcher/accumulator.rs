//! Per-group buffer of events awaiting dispatch.

use parking_lot::Mutex;

use super::source::WatchEvent;

/// Accumulates events in arrival order between two flushes.
///
/// Appends racing a flush land either fully in the returned batch or fully
/// in the next one; nothing is lost or duplicated.
#[derive(Debug, Default)]
pub struct EventAccumulator {
    batch: Mutex<Vec<WatchEvent>>,
}

impl EventAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event to the end of the pending batch.
    pub fn append(&self, event: WatchEvent) {
        self.batch.lock().push(event);
    }

    /// Atomically take the pending batch, leaving it empty.
    pub fn flush_and_clear(&self) -> Vec<WatchEvent> {
        std::mem::take(&mut *self.batch.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.batch.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.batch.lock().len()
    }
}
