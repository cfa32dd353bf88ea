//! In-process controllers driven by the host.
//!
//! [`VirtualBackend`] behaves like a native backend, except that the host scripts the devices:
//! it attaches a [`VirtualPad`], then feeds raw samples and button edges into it. Samples go
//! through the same normalization as real hardware and queue the same events.
//!
//! Two removal paths mirror the native backends:
//! - [`VirtualBackend::detach`] behaves like a reader thread hitting end-of-stream: input already
//!   queued for the device is dispatched by the next `process()`, followed by its removal.
//! - [`VirtualBackend::unplug`] behaves like an OS removal notification: the device leaves the
//!   live list at once, its queued input is purged, and the removal goes out on the next `detect()`.
//!
//! Attaches go out on `detect()`. A `process()` that has input for a device whose attach is still
//! waiting dispatches that attach first.

use crate::backends::Backend;
use crate::config::Config;
use crate::device::{Device, DeviceId};
use crate::error::Result;
use crate::event::{EventKind, QueuedEvent};
use crate::listener::GamepadListener;
use crate::metadata::DeviceMeta;
use crate::normalize::{AxisLayout, AxisRange};
use crate::queue::EventQueue;
use crate::registry::DeviceRegistry;

/// Layout of a virtual controller.
#[derive(Clone, Debug)]
pub struct VirtualPad {
    name: String,
    vendor_id: u16,
    product_id: u16,
    layout: AxisLayout,
    buttons: usize,
}

impl VirtualPad {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vendor_id: 0,
            product_id: 0,
            layout: AxisLayout::new(),
            buttons: 0,
        }
    }

    pub fn ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    /// Add an axis with a fixed logical range.
    pub fn axis(mut self, min: i64, max: i64) -> Self {
        let cookie = self.layout.len() as u32;
        self.layout.push_linear(cookie, AxisRange::declared(min, max));
        self
    }

    /// Add an axis whose range is learned from the samples it receives.
    pub fn calibrating_axis(mut self, min: i64, max: i64) -> Self {
        let cookie = self.layout.len() as u32;
        self.layout
            .push_linear(cookie, AxisRange::calibrating(min, max));
        self
    }

    /// Add a hat with positions `min..=max`; takes two axis slots.
    pub fn hat(mut self, min: i64, max: i64) -> Self {
        let cookie = self.layout.len() as u32;
        self.layout.push_hat(cookie, min, max);
        self
    }

    pub fn buttons(mut self, count: usize) -> Self {
        self.buttons = count;
        self
    }
}

/// Producer-side state of one attached virtual pad.
#[derive(Debug)]
struct PadState {
    layout: AxisLayout,
    buttons: Vec<bool>,
    /// Set by `detach()`; the pad accepts no more input.
    ended: bool,
}

#[derive(Debug, Default)]
pub struct VirtualBackend {
    registry: DeviceRegistry<PadState>,
    device_events: EventQueue,
    input_events: EventQueue,
    initialized: bool,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug in `pad`. Its attach event is dispatched by the next `detect()`.
    pub fn attach(&mut self, pad: VirtualPad) -> DeviceId {
        let device = Device::new(
            pad.name,
            pad.vendor_id,
            pad.product_id,
            pad.layout.len(),
            pad.buttons,
            DeviceMeta::with_path("virtual", format!("virtual:{}", self.registry.len())),
        );
        let state = PadState {
            layout: pad.layout,
            buttons: vec![false; pad.buttons],
            ended: false,
        };
        let id = self.registry.insert(device, state);
        self.device_events
            .push(QueuedEvent::new(id, EventKind::DeviceAttached));
        id
    }

    /// Press `button`. Returns `false` if nothing was queued.
    pub fn press_button(&mut self, id: DeviceId, button: u32) -> bool {
        self.set_button(id, button, true)
    }

    pub fn release_button(&mut self, id: DeviceId, button: u32) -> bool {
        self.set_button(id, button, false)
    }

    /// Feed a raw sample into axis slot `axis` (the first slot of a hat for hats).
    /// Returns how many axis events were queued.
    pub fn move_axis(&mut self, id: DeviceId, axis: usize, raw: i64) -> usize {
        let Some(entry) = self.registry.get_mut(id) else {
            return 0;
        };
        if entry.private.ended {
            return 0;
        }
        let changes = entry.private.layout.feed(axis, raw);
        let n = changes.len();
        for (axis, value, last) in changes {
            self.input_events
                .push(QueuedEvent::axis(id, axis, value, last));
        }
        n
    }

    /// Set axis slot `axis` to an already-normalized value.
    pub fn set_axis(&mut self, id: DeviceId, axis: usize, value: f32) -> bool {
        let Some(entry) = self.registry.get_mut(id) else {
            return false;
        };
        if entry.private.ended {
            return false;
        }
        match entry.private.layout.set_normalized(axis, value) {
            Some((axis, value, last)) => {
                self.input_events
                    .push(QueuedEvent::axis(id, axis, value, last));
                true
            }
            None => false,
        }
    }

    /// End the device's input stream. Already queued input is still delivered, then the removal.
    pub fn detach(&mut self, id: DeviceId) -> bool {
        match self.registry.get_mut(id) {
            Some(entry) if !entry.private.ended => {
                entry.private.ended = true;
                self.input_events
                    .push(QueuedEvent::new(id, EventKind::DeviceRemoved));
                true
            }
            _ => false,
        }
    }

    /// Remove the device immediately, dropping its queued input.
    pub fn unplug(&mut self, id: DeviceId) -> bool {
        self.registry
            .unplug(id, &mut self.device_events, &mut self.input_events)
    }

    /// Events waiting for `detect()` plus those waiting for `process()`.
    pub fn pending(&self) -> usize {
        self.device_events.len() + self.input_events.len()
    }

    fn set_button(&mut self, id: DeviceId, button: u32, down: bool) -> bool {
        let Some(entry) = self.registry.get_mut(id) else {
            return false;
        };
        if entry.private.ended {
            return false;
        }
        let Some(state) = entry.private.buttons.get_mut(button as usize) else {
            return false;
        };
        if *state == down {
            return false;
        }
        *state = down;
        self.input_events
            .push(QueuedEvent::button(id, button, down));
        true
    }

    fn drain(&mut self, events: Vec<QueuedEvent>, listener: &mut dyn GamepadListener) {
        for event in events {
            if let Some(entry) = self.registry.dispatch(event, listener) {
                tracing::info!(id = entry.device.id, "[VIRTUAL/REMOVE] {}", entry.device);
            }
        }
    }
}

impl Backend for VirtualBackend {
    fn with_config(_config: &Config) -> Self {
        Self::new()
    }

    fn init(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.registry.drain();
        self.device_events.clear();
        self.input_events.clear();
        self.initialized = false;
    }

    fn device_count(&self) -> usize {
        self.registry.len()
    }

    fn device_at(&self, index: usize) -> Option<&Device> {
        self.registry.device_at(index)
    }

    fn detect(&mut self, listener: &mut dyn GamepadListener) {
        let batch = self.device_events.take();
        self.drain(batch, listener);
    }

    fn process(&mut self, listener: &mut dyn GamepadListener) {
        let batch = self.input_events.take();
        let attaches = self.device_events.take_attaches_for(&batch);
        self.drain(attaches, listener);
        self.drain(batch, listener);
    }
}
