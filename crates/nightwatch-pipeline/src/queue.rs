//! Bounded FIFO event queue. On overflow the oldest entry is dropped (never
//! the incoming one) and an overflow counter is bumped, so ingestion never
//! blocks on a full queue.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::warn;

use nightwatch_core::model::ProcessingEvent;

/// How long a worker waits for an item before re-checking shutdown.
pub const POP_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of [`EventQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    AcceptedAfterDroppingOldest,
}

pub struct EventQueue {
    capacity: usize,
    items: Mutex<VecDeque<ProcessingEvent>>,
    notify: Notify,
}

impl EventQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes `event`, dropping the oldest queued event first if the queue
    /// is already at capacity.
    pub fn push(&self, event: ProcessingEvent) -> PushOutcome {
        let mut items = self.items.lock();
        let outcome = if items.len() >= self.capacity {
            let dropped = items.pop_front();
            if let Some(dropped) = dropped {
                warn!(
                    camera_id = %dropped.camera_id,
                    incoming_camera_id = %event.camera_id,
                    capacity = self.capacity,
                    "event queue full, dropping oldest event"
                );
            }
            PushOutcome::AcceptedAfterDroppingOldest
        } else {
            PushOutcome::Accepted
        };
        items.push_back(event);
        drop(items);
        self.notify.notify_one();
        outcome
    }

    /// Waits up to [`POP_TIMEOUT`] for an event, returning `None` on
    /// timeout so the caller can re-check its shutdown flag.
    pub async fn pop(&self) -> Option<ProcessingEvent> {
        loop {
            if let Some(event) = self.items.lock().pop_front() {
                return Some(event);
            }
            if timeout(POP_TIMEOUT, self.notify.notified()).await.is_err() {
                return None;
            }
        }
    }
}
