//! Device metadata snapshot.
//!
//! [`DeviceMeta`] carries the backend-specific details of a [`Device`](crate::Device)
//! that do not belong in the normalized record: which subsystem found it, where
//! it lives in the OS topology, and the HID usage it advertised. Backends fill in
//! what they know; unknown fields remain `None`.
//!
//! # Conventions
//! - `bus` is a short subsystem hint: `"evdev"`, `"iokit"`, `"hid"`, `"xinput"` or `"virtual"`.
//! - `path` is an OS path (device node, HID interface path, XInput slot) and is opaque.
//!   It may change across reconnects; treat it as diagnostic first, identity second.
//! - `usage_page`/`usage` are filled when the platform reports HID usages.

use serde::{Deserialize, Serialize};

/// What a backend knows about a device beyond its normalized controls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// Subsystem that enumerated the device.
    pub bus: Option<String>,

    /// Serial string reported by the device, when non-empty.
    pub serial_number: Option<String>,

    /// Top-level collection usage page (`0x01` Generic Desktop for most pads).
    pub usage_page: Option<u16>,

    /// Top-level collection usage (`0x04` Joystick, `0x05` GamePad, `0x08` MultiAxis).
    pub usage: Option<u16>,

    /// Node, interface path or slot name the backend opened.
    pub path: Option<String>,
}

impl DeviceMeta {
    /// Metadata with only the bus hint and path set.
    pub fn with_path(bus: &str, path: impl Into<String>) -> Self {
        Self {
            bus: Some(bus.to_string()),
            path: Some(path.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_path_leaves_hid_fields_empty() {
        let meta = DeviceMeta::with_path("evdev", "/dev/input/event3");
        assert_eq!(meta.bus.as_deref(), Some("evdev"));
        assert_eq!(meta.path.as_deref(), Some("/dev/input/event3"));
        assert!(meta.serial_number.is_none());
        assert!(meta.usage_page.is_none() && meta.usage.is_none());
    }
}
