//! Windows HID discovery rules.
//!
//! Decides which `hidapi` device-list entries are worth opening as generic controllers:
//!
//! - Accept usage pages that commonly carry game controls:
//!   - `0x01` Generic Desktop (sticks, gamepads, multi-axis)
//!   - `0x02` Simulation Controls (rudder/pedals on some devices)
//!   - `0x0F` Physical Interface (some throttle/pedal stacks)
//!   - `0xFFxx` Vendor-defined (virtual endpoints of some HOTAS vendors)
//! - Reject plain mouse and keyboard collections on Generic Desktop.
//! - With the standard-gamepad path enabled, reject every entry XInput already owns: the
//!   `IG_` compatibility interfaces and the known XInput product signatures.
//!
//! Entries that pass are still dropped later if the HIDP parser finds nothing to map.
//!
//! This module does **not** open devices; see `hid_device.rs` and `hidp_parser.rs`.

use crate::metadata::DeviceMeta;
use hidapi::DeviceInfo;

/// `(vendor, product)` pairs that enumerate through XInput.
const XINPUT_SIGNATURES: &[(u16, u16)] = &[
    // Xbox 360 controller
    (0x045E, 0x028E),
    // Xbox 360 wireless receiver
    (0x045E, 0x0719),
    // Valve streaming gamepad
    (0x28DE, 0x11FF),
];

/// `true` for devices claimed by the standard-gamepad path.
pub(crate) fn is_standard_signature(vendor_id: u16, product_id: u16, path: &str) -> bool {
    path.contains("IG_") || XINPUT_SIGNATURES.contains(&(vendor_id, product_id))
}

/// Usage filter for one top-level collection.
pub(crate) fn accept_usage(usage_page: u16, usage: u16) -> bool {
    let is_generic_desktop = usage_page == 0x01;
    let is_simulation = usage_page == 0x02;
    let is_physical_iface = usage_page == 0x0F;
    let is_vendor_defined = (usage_page & 0xFF00) == 0xFF00;

    if !(is_generic_desktop || is_simulation || is_physical_iface || is_vendor_defined) {
        return false;
    }
    // Mouse = 0x02, Keyboard = 0x06 on Generic Desktop.
    !(is_generic_desktop && matches!(usage, 0x02 | 0x06))
}

/// Whether a device-list entry should be opened on the generic path.
pub(crate) fn accept_device(info: &DeviceInfo, standard_gamepads: bool) -> bool {
    if !accept_usage(info.usage_page(), info.usage()) {
        return false;
    }
    let path = info.path().to_string_lossy();
    if standard_gamepads && is_standard_signature(info.vendor_id(), info.product_id(), &path) {
        tracing::debug!(
            path = %path,
            "[HID/FILTER] 0x{:04x}:0x{:04x} left to XInput",
            info.vendor_id(),
            info.product_id()
        );
        return false;
    }
    true
}

/// Display name, falling back to the ids.
pub(crate) fn name(info: &DeviceInfo) -> String {
    match info.product_string() {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => format!("HID {:04x}:{:04x}", info.vendor_id(), info.product_id()),
    }
}

/// Metadata snapshot for a `hidapi` entry.
pub(crate) fn meta(info: &DeviceInfo) -> DeviceMeta {
    DeviceMeta {
        bus: Some("hid".into()),
        serial_number: info
            .serial_number()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        usage_page: Some(info.usage_page()),
        usage: Some(info.usage()),
        path: Some(info.path().to_string_lossy().into_owned()),
    }
}
