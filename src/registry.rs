//! Device Registry.
//!
//! Owns the live device list of one backend instance together with each device's
//! backend-private data, and hands out session ids. A device that has been unplugged but
//! whose removal has not been dispatched yet moves to a separate retired list: it no longer
//! counts as live, but events still queued for it can be resolved until its
//! `DeviceRemoved` event releases it.

use crate::device::{Device, DeviceId};
use crate::event::{EventKind, QueuedEvent};
use crate::listener::GamepadListener;
use crate::queue::EventQueue;

/// A device plus whatever the backend needs to keep talking to it.
#[derive(Debug)]
pub struct Entry<P> {
    pub device: Device,
    pub private: P,
}

#[derive(Debug)]
pub struct DeviceRegistry<P> {
    live: Vec<Entry<P>>,
    retired: Vec<Entry<P>>,
    next_id: DeviceId,
}

impl<P> Default for DeviceRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> DeviceRegistry<P> {
    pub fn new() -> Self {
        Self {
            live: Vec::new(),
            retired: Vec::new(),
            next_id: 0,
        }
    }

    /// Assign the next id to `device` and add it to the live list.
    pub fn insert(&mut self, mut device: Device, private: P) -> DeviceId {
        let id = self.next_id;
        self.next_id += 1;
        device.id = id;
        self.live.push(Entry { device, private });
        id
    }

    /// Number of live devices.
    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live device at `index`, `None` when out of range.
    pub fn device_at(&self, index: usize) -> Option<&Device> {
        self.live.get(index).map(|e| &e.device)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry<P>> {
        self.live.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entry<P>> {
        self.live.iter_mut()
    }

    /// Live entry with `id`.
    pub fn get(&self, id: DeviceId) -> Option<&Entry<P>> {
        self.live.iter().find(|e| e.device.id == id)
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut Entry<P>> {
        self.live.iter_mut().find(|e| e.device.id == id)
    }

    /// Live or retired entry with `id`.
    fn lookup_mut(&mut self, id: DeviceId) -> Option<&mut Entry<P>> {
        let pos = self.live.iter().position(|e| e.device.id == id);
        match pos {
            Some(i) => self.live.get_mut(i),
            None => self.retired.iter_mut().find(|e| e.device.id == id),
        }
    }

    /// Move a live device to the retired list. Returns `false` if it was not live.
    pub fn retire(&mut self, id: DeviceId) -> bool {
        match self.live.iter().position(|e| e.device.id == id) {
            Some(i) => {
                let entry = self.live.remove(i);
                self.retired.push(entry);
                true
            }
            None => false,
        }
    }

    /// Take a device out of the registry, live or retired.
    pub fn release(&mut self, id: DeviceId) -> Option<Entry<P>> {
        if let Some(i) = self.live.iter().position(|e| e.device.id == id) {
            return Some(self.live.remove(i));
        }
        let i = self.retired.iter().position(|e| e.device.id == id)?;
        Some(self.retired.remove(i))
    }

    /// Remove every device, live and retired. Ids keep counting up.
    pub fn drain(&mut self) -> Vec<Entry<P>> {
        let mut out: Vec<Entry<P>> = self.live.drain(..).collect();
        out.append(&mut self.retired);
        out
    }

    /// Handle an OS removal notification for a backend whose producers share the consumer thread.
    ///
    /// The device leaves the live list and its queued input is purged. If its attach has not been
    /// dispatched yet the two cancel out and the device is released without a trace; otherwise
    /// `DeviceRemoved` goes onto `device_events`. Returns `false` for ids that are not live.
    pub fn unplug(
        &mut self,
        id: DeviceId,
        device_events: &mut EventQueue,
        input_events: &mut EventQueue,
    ) -> bool {
        if !self.retire(id) {
            return false;
        }
        let purged = input_events.purge_device(id);
        if purged > 0 {
            tracing::debug!(id, purged, "[REGISTRY/UNPLUG] dropped queued input");
        }
        if device_events.purge_device(id) > 0 {
            self.release(id);
        } else {
            device_events.push(QueuedEvent::new(id, EventKind::DeviceRemoved));
        }
        true
    }

    /// Apply `event` to its device and forward it to `listener`.
    ///
    /// Button and axis state is written into the device before the listener sees the event,
    /// so listeners always observe state consistent with what they were told. Events for
    /// unknown ids are dropped. A `DeviceRemoved` event releases the device after the listener
    /// returns and hands the entry back so the backend can tear down its private side.
    pub fn dispatch(
        &mut self,
        event: QueuedEvent,
        listener: &mut dyn GamepadListener,
    ) -> Option<Entry<P>> {
        let QueuedEvent {
            device: id,
            timestamp,
            kind,
        } = event;

        match kind {
            EventKind::DeviceAttached => {
                if let Some(entry) = self.lookup_mut(id) {
                    listener.device_attached(&entry.device);
                }
                None
            }
            EventKind::DeviceRemoved => {
                let entry = self.release(id)?;
                listener.device_removed(&entry.device);
                Some(entry)
            }
            EventKind::ButtonDown { button } | EventKind::ButtonUp { button } => {
                let down = matches!(kind, EventKind::ButtonDown { .. });
                let entry = self.lookup_mut(id)?;
                let device = &mut entry.device;
                if let Some(state) = device.button_state.get_mut(button as usize) {
                    *state = down;
                }
                if down {
                    listener.button_down(device, button, timestamp);
                } else {
                    listener.button_up(device, button, timestamp);
                }
                None
            }
            EventKind::AxisMoved {
                axis,
                value,
                last_value,
            } => {
                let entry = self.lookup_mut(id)?;
                let device = &mut entry.device;
                if let Some(state) = device.axis_state.get_mut(axis as usize) {
                    *state = value;
                }
                listener.axis_moved(device, axis, value, last_value, timestamp);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DeviceMeta;

    fn pad(name: &str) -> Device {
        Device::new(name, 1, 2, 2, 2, DeviceMeta::default())
    }

    #[derive(Default)]
    struct Log(Vec<String>);

    impl GamepadListener for Log {
        fn device_attached(&mut self, d: &Device) {
            self.0.push(format!("attach {}", d.id));
        }
        fn device_removed(&mut self, d: &Device) {
            self.0.push(format!("remove {}", d.id));
        }
        fn button_down(&mut self, d: &Device, b: u32, _: f64) {
            self.0.push(format!("down {} {} {}", d.id, b, d.button(b as usize)));
        }
        fn axis_moved(&mut self, d: &Device, a: u32, v: f32, _: f32, _: f64) {
            self.0.push(format!("axis {} {} {}", d.id, a, v));
        }
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut reg: DeviceRegistry<()> = DeviceRegistry::new();
        let a = reg.insert(pad("a"), ());
        let b = reg.insert(pad("b"), ());
        assert!(reg.release(a).is_some());
        let c = reg.insert(pad("a again"), ());
        assert!(a < b && b < c);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.device_at(1).map(|d| d.id), Some(c));
        assert!(reg.device_at(2).is_none());
    }

    #[test]
    fn dispatch_updates_state_before_listener() {
        let mut reg: DeviceRegistry<()> = DeviceRegistry::new();
        let id = reg.insert(pad("a"), ());
        let mut log = Log::default();

        reg.dispatch(QueuedEvent::button(id, 1, true), &mut log);
        reg.dispatch(QueuedEvent::axis(id, 0, -1.0, 0.0), &mut log);
        reg.dispatch(QueuedEvent::button(id, 9, true), &mut log);

        assert_eq!(log.0, vec!["down 0 1 true", "axis 0 0 -1", "down 0 9 false"]);
        assert_eq!(reg.device_at(0).map(|d| d.axis(0)), Some(-1.0));
    }

    #[test]
    fn retired_devices_resolve_until_released() {
        let mut reg: DeviceRegistry<u8> = DeviceRegistry::new();
        let id = reg.insert(pad("a"), 7);
        assert!(reg.retire(id));
        assert_eq!(reg.len(), 0);

        let mut log = Log::default();
        assert!(reg
            .dispatch(QueuedEvent::button(id, 0, true), &mut log)
            .is_none());
        let released = reg.dispatch(QueuedEvent::new(id, EventKind::DeviceRemoved), &mut log);
        assert_eq!(released.map(|e| e.private), Some(7));

        // Anything after the removal no longer resolves.
        reg.dispatch(QueuedEvent::button(id, 1, true), &mut log);
        assert_eq!(log.0, vec!["down 0 0 true", "remove 0"]);
    }

    #[test]
    fn unplug_before_and_after_announce() {
        let mut reg: DeviceRegistry<()> = DeviceRegistry::new();
        let (mut devices, mut input) = (EventQueue::new(), EventQueue::new());

        let quiet = reg.insert(pad("quiet"), ());
        devices.push(QueuedEvent::new(quiet, EventKind::DeviceAttached));
        input.push(QueuedEvent::button(quiet, 0, true));
        assert!(reg.unplug(quiet, &mut devices, &mut input));
        assert!(devices.is_empty() && input.is_empty());
        assert!(reg.get(quiet).is_none());

        let loud = reg.insert(pad("loud"), ());
        input.push(QueuedEvent::button(loud, 0, true));
        assert!(reg.unplug(loud, &mut devices, &mut input));
        assert!(!reg.unplug(loud, &mut devices, &mut input));
        assert!(input.is_empty());
        let queued = devices.take();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].kind, EventKind::DeviceRemoved);
        assert_eq!(reg.len(), 0);
    }
}
