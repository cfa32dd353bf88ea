//! Event queues bridging producers to the single consumer.
//!
//! [`EventQueue`] is the plain FIFO used by backends whose producers run on the consumer
//! thread (OS run-loop callbacks, synchronous polling). [`SharedEventQueue`] wraps the same
//! queue in a mutex for backends that push from reader threads.
//!
//! Draining is a batch operation: [`EventQueue::take`] moves every queued event out and
//! leaves the queue empty, so anything pushed while the batch is being dispatched lands in
//! the next batch. The shared variant holds its lock only for the move, never during dispatch.

use crate::device::DeviceId;
use crate::event::{EventKind, QueuedEvent};
use parking_lot::Mutex;
use std::sync::Arc;

/// Growable FIFO of [`QueuedEvent`]s.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<QueuedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event (amortized O(1)).
    pub fn push(&mut self, event: QueuedEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove and return every queued event in FIFO order.
    pub fn take(&mut self) -> Vec<QueuedEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drop every queued event that references `device`. Returns how many were dropped.
    pub fn purge_device(&mut self, device: DeviceId) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.device != device);
        before - self.events.len()
    }

    /// Remove and return the waiting `DeviceAttached` events of devices that have input in
    /// `batch`, so they can be dispatched ahead of it. Everything else stays queued.
    pub fn take_attaches_for(&mut self, batch: &[QueuedEvent]) -> Vec<QueuedEvent> {
        let (attaches, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.events).into_iter().partition(|e| {
                e.kind == EventKind::DeviceAttached && batch.iter().any(|b| b.device == e.device)
            });
        self.events = rest;
        attaches
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Mutex-guarded [`EventQueue`] that can be cloned into producer threads.
#[derive(Clone, Debug, Default)]
pub struct SharedEventQueue {
    inner: Arc<Mutex<EventQueue>>,
}

impl SharedEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: QueuedEvent) {
        self.inner.lock().push(event);
    }

    /// Move the current batch out under the lock.
    pub fn take(&self) -> Vec<QueuedEvent> {
        self.inner.lock().take()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
