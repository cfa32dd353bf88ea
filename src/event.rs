//! Queued device events.
//!
//! Backends describe every change as a [`QueuedEvent`]: which device it came from,
//! when it happened, and what changed ([`EventKind`]). Events sit in an
//! [`EventQueue`](crate::queue::EventQueue) until the consumer drains it during
//! `detect()`/`process()`.
//!
//! ## Value conventions
//! - **Axes** carry normalized values in `[-1.0, 1.0]` together with the value the producer
//!   saw before the change.
//! - **Buttons** are edges: one `ButtonDown` per press, one `ButtonUp` per release.
//! - **Hats** never appear as their own kind; a hat is two consecutive axes whose values
//!   are always `-1.0`, `0.0` or `1.0`.
//!
//! ## Timestamps
//! Timestamps are seconds on a process-wide monotonic clock (see [`timestamp`]). They order
//! events within a run and are not related to wall-clock time.

use crate::device::DeviceId;
use std::sync::OnceLock;
use std::time::Instant;

/// What changed on a device.
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    /// The device joined the live list. Dispatched once, before any input from it.
    DeviceAttached,

    /// The device left the live list. It is released right after this is dispatched.
    DeviceRemoved,

    /// A button transitioned to pressed.
    ButtonDown { button: u32 },

    /// A button transitioned to released.
    ButtonUp { button: u32 },

    /// A normalized axis changed.
    AxisMoved {
        axis: u32,
        value: f32,
        last_value: f32,
    },
}

/// One event waiting for dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedEvent {
    /// Originating device.
    pub device: DeviceId,
    /// Seconds on the [`timestamp`] clock.
    pub timestamp: f64,
    pub kind: EventKind,
}

impl QueuedEvent {
    pub fn new(device: DeviceId, kind: EventKind) -> Self {
        Self {
            device,
            timestamp: timestamp(),
            kind,
        }
    }

    pub fn button(device: DeviceId, button: u32, down: bool) -> Self {
        let kind = if down {
            EventKind::ButtonDown { button }
        } else {
            EventKind::ButtonUp { button }
        };
        Self::new(device, kind)
    }

    pub fn axis(device: DeviceId, axis: u32, value: f32, last_value: f32) -> Self {
        Self::new(
            device,
            EventKind::AxisMoved {
                axis,
                value,
                last_value,
            },
        )
    }
}

/// Seconds elapsed since the first call in this process.
pub fn timestamp() -> f64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_monotonic() {
        let a = QueuedEvent::button(1, 0, true);
        let b = QueuedEvent::button(1, 0, false);
        assert!(b.timestamp >= a.timestamp);
        assert_eq!(b.kind, EventKind::ButtonUp { button: 0 });
    }
}
