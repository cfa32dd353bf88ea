//! Windows backend.
//!
//! Everything runs on the caller's thread:
//! - **HID** discovery and report decoding via `hidapi` and the HIDP parser (feature `hid`)
//! - **XInput** standard gamepads in slots 0..3, with a fixed 6-axis/15-button layout
//! - **Hotplug** notification through a hidden message-only window (`notify.rs`)
//!
//! `detect()` pumps the notification window and re-enumerates HID devices only when it
//! reported a change (or on the first call). XInput slots are cheap and are checked on every
//! call. `process()` polls every device once; a device whose read fails is removed.
//!
//! With `standard_gamepads` enabled, HID entries that XInput already exposes (`IG_` interfaces
//! and the known XInput product signatures) are never opened on the generic path.

#[cfg(feature = "hid")]
mod hid_device;
#[cfg(feature = "hid")]
mod hid_discovery;
#[cfg(feature = "hid")]
mod hidp_parser;
mod notify;
mod xinput_devices;

use crate::backends::Backend;
use crate::config::Config;
use crate::device::{Device, DeviceId};
use crate::error::Result;
use crate::event::{EventKind, QueuedEvent};
use crate::listener::GamepadListener;
use crate::queue::EventQueue;
use crate::registry::DeviceRegistry;
use notify::DeviceNotifier;
use xinput_devices::{XInput, XInputPad};

#[cfg(feature = "hid")]
use crate::error::Error;
#[cfg(feature = "hid")]
use hid_device::HidPad;
#[cfg(feature = "hid")]
use hidapi::HidApi;

/// Backend-private side of one device.
#[derive(Debug)]
enum Pad {
    #[cfg(feature = "hid")]
    Hid(HidPad),
    XInput(XInputPad),
}

pub struct WindowsBackend {
    standard_gamepads: bool,
    max_reports_per_tick: usize,
    registry: DeviceRegistry<Pad>,
    device_events: EventQueue,
    input_events: EventQueue,
    #[cfg(feature = "hid")]
    hid: Option<HidApi>,
    xinput: Option<XInput>,
    notifier: Option<DeviceNotifier>,
    /// Enumerate HID on the next `detect()` regardless of notifications.
    rescan: bool,
    initialized: bool,
}

impl std::fmt::Debug for WindowsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsBackend")
            .field("standard_gamepads", &self.standard_gamepads)
            .field("registry", &self.registry)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl WindowsBackend {
    #[cfg(feature = "hid")]
    fn scan_hid(&mut self) {
        let Some(api) = self.hid.as_mut() else {
            return;
        };
        if let Err(e) = api.refresh_devices() {
            tracing::warn!(error = %e, "[HID/SCAN] refresh failed");
            return;
        }

        let present: Vec<String> = api
            .device_list()
            .map(|info| info.path().to_string_lossy().into_owned())
            .collect();
        let gone: Vec<DeviceId> = self
            .registry
            .iter()
            .filter_map(|e| match &e.private {
                Pad::Hid(pad) if !present.contains(&pad.path) => Some(e.device.id),
                _ => None,
            })
            .collect();
        for id in gone {
            tracing::debug!(id, "[HID/SCAN] interface gone");
            self.registry
                .unplug(id, &mut self.device_events, &mut self.input_events);
        }

        for info in api.device_list() {
            if !hid_discovery::accept_device(info, self.standard_gamepads) {
                continue;
            }
            let path = info.path().to_string_lossy();
            let open = self
                .registry
                .iter()
                .any(|e| matches!(&e.private, Pad::Hid(pad) if pad.path == path));
            if open {
                continue;
            }

            let Some(parser) =
                hidp_parser::HidpParser::open(&path, info.vendor_id(), info.product_id())
            else {
                continue;
            };
            let Some(pad) = HidPad::open(info, api, parser) else {
                continue;
            };
            let device = Device::new(
                hid_discovery::name(info),
                info.vendor_id(),
                info.product_id(),
                pad.axis_count(),
                pad.button_count(),
                hid_discovery::meta(info),
            );
            tracing::info!("[HID/ATTACH] {device}");
            let id = self.registry.insert(device, Pad::Hid(pad));
            self.device_events
                .push(QueuedEvent::new(id, EventKind::DeviceAttached));
        }
    }

    fn scan_xinput(&mut self) {
        let Some(xinput) = self.xinput.as_ref() else {
            return;
        };
        for slot in 0..xinput_devices::SLOTS {
            let registered = self.registry.iter().find_map(|e| match &e.private {
                Pad::XInput(pad) if pad.slot == slot => Some(e.device.id),
                _ => None,
            });
            match (xinput.connected(slot), registered) {
                (true, None) => {
                    let device = xinput_devices::device_for_slot(slot);
                    tracing::info!(slot, "[XINPUT/ATTACH] {device}");
                    let id = self
                        .registry
                        .insert(device, Pad::XInput(XInputPad::new(slot)));
                    self.device_events
                        .push(QueuedEvent::new(id, EventKind::DeviceAttached));
                }
                (false, Some(id)) => {
                    tracing::debug!(slot, id, "[XINPUT/SCAN] slot empty");
                    self.registry
                        .unplug(id, &mut self.device_events, &mut self.input_events);
                }
                _ => {}
            }
        }
    }

    /// Poll every live device into the input queue; returns the ids that failed.
    fn poll_devices(&mut self) -> Vec<DeviceId> {
        let mut failed = Vec::new();
        for entry in self.registry.iter_mut() {
            let id = entry.device.id;
            match &mut entry.private {
                #[cfg(feature = "hid")]
                Pad::Hid(pad) => {
                    if let Err(e) =
                        pad.poll(id, self.max_reports_per_tick, &mut self.input_events)
                    {
                        tracing::warn!(id, error = %e, "[HID/READ] read failed, treating as detach");
                        failed.push(id);
                    }
                }
                Pad::XInput(pad) => {
                    let sample = self.xinput.as_ref().and_then(|x| x.sample(pad.slot));
                    match sample {
                        Some(sample) => pad.update(id, sample, &mut self.input_events),
                        None => {
                            tracing::debug!(id, slot = pad.slot, "[XINPUT/READ] slot disconnected");
                            failed.push(id);
                        }
                    }
                }
            }
        }
        failed
    }

    fn drain(&mut self, events: Vec<QueuedEvent>, listener: &mut dyn GamepadListener) {
        for event in events {
            if let Some(entry) = self.registry.dispatch(event, listener) {
                tracing::info!(id = entry.device.id, "[WIN/REMOVE] {}", entry.device);
            }
        }
    }
}

impl Backend for WindowsBackend {
    fn with_config(config: &Config) -> Self {
        Self {
            standard_gamepads: config.standard_gamepads,
            max_reports_per_tick: config.max_reports_per_tick,
            registry: DeviceRegistry::new(),
            device_events: EventQueue::new(),
            input_events: EventQueue::new(),
            #[cfg(feature = "hid")]
            hid: None,
            xinput: None,
            notifier: None,
            rescan: true,
            initialized: false,
        }
    }

    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        #[cfg(feature = "hid")]
        {
            let api = HidApi::new().map_err(|e| Error::Backend(format!("hidapi: {e}")))?;
            self.hid = Some(api);
        }
        if self.standard_gamepads {
            self.xinput = Some(XInput::load());
        }
        self.notifier = DeviceNotifier::create();
        if self.notifier.is_none() {
            tracing::warn!("[WIN/INIT] no hotplug notifications; enumerating on every detect()");
        }
        self.rescan = true;
        self.initialized = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        let entries = self.registry.drain();
        if !entries.is_empty() {
            tracing::debug!(count = entries.len(), "[WIN/SHUTDOWN] closing devices");
        }
        drop(entries);
        self.device_events.clear();
        self.input_events.clear();
        #[cfg(feature = "hid")]
        {
            self.hid = None;
        }
        self.xinput = None;
        self.notifier = None;
        self.rescan = true;
        self.initialized = false;
    }

    fn device_count(&self) -> usize {
        self.registry.len()
    }

    fn device_at(&self, index: usize) -> Option<&Device> {
        self.registry.device_at(index)
    }

    fn detect(&mut self, listener: &mut dyn GamepadListener) {
        if !self.initialized {
            return;
        }
        let notified = self
            .notifier
            .as_mut()
            .map_or(true, DeviceNotifier::take_changed);
        if std::mem::take(&mut self.rescan) || notified {
            #[cfg(feature = "hid")]
            self.scan_hid();
        }
        self.scan_xinput();

        let batch = self.device_events.take();
        self.drain(batch, listener);
    }

    fn process(&mut self, listener: &mut dyn GamepadListener) {
        if !self.initialized {
            return;
        }
        for id in self.poll_devices() {
            self.registry
                .unplug(id, &mut self.device_events, &mut self.input_events);
        }
        let input = self.input_events.take();
        self.drain(input, listener);
        // Removals found while polling go out now, after the input that preceded them.
        let lifecycle = self.device_events.take();
        self.drain(lifecycle, listener);
    }
}

impl Drop for WindowsBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_backend_is_inert() {
        let mut b = WindowsBackend::with_config(&Config::default());
        let mut sink = crate::listener::Callbacks::default();
        b.detect(&mut sink);
        b.process(&mut sink);
        assert_eq!(b.device_count(), 0);
        assert!(b.device_at(0).is_none());
        b.shutdown();
        b.shutdown();
    }
}
