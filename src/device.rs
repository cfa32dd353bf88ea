//! The normalized device record shared by every backend.

use crate::metadata::DeviceMeta;
use std::fmt;

/// Session-scoped device identifier.
///
/// Ids are handed out by the [`DeviceRegistry`](crate::registry::DeviceRegistry) in strictly
/// increasing order and are never reused, even when the same hardware is reattached.
pub type DeviceId = u32;

/// A connected controller as seen by consumers.
///
/// `axis_state` and `button_state` are allocated once at attach time and never resized,
/// so `axis_count()`/`button_count()` always match the hardware layout the backend reported.
/// Every axis value lies in `[-1.0, 1.0]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    /// Best-effort USB vendor id, `0` when unknown.
    pub vendor_id: u16,
    /// Best-effort USB product id, `0` when unknown.
    pub product_id: u16,
    pub axis_state: Vec<f32>,
    pub button_state: Vec<bool>,
    pub meta: DeviceMeta,
}

impl Device {
    /// Build a device with zeroed state arrays. The id is assigned by the registry on insert.
    pub fn new(
        name: impl Into<String>,
        vendor_id: u16,
        product_id: u16,
        axis_count: usize,
        button_count: usize,
        meta: DeviceMeta,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            vendor_id,
            product_id,
            axis_state: vec![0.0; axis_count],
            button_state: vec![false; button_count],
            meta,
        }
    }

    #[inline]
    pub fn axis_count(&self) -> usize {
        self.axis_state.len()
    }

    #[inline]
    pub fn button_count(&self) -> usize {
        self.button_state.len()
    }

    /// Current value of `axis`, `0.0` when out of range.
    pub fn axis(&self, axis: usize) -> f32 {
        self.axis_state.get(axis).copied().unwrap_or(0.0)
    }

    /// Current state of `button`, `false` when out of range.
    pub fn button(&self, button: usize) -> bool {
        self.button_state.get(button).copied().unwrap_or(false)
    }

    /// `"name (vvvv:pppp)"`, suitable for log lines and device pickers.
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04x}:{:04x})",
            self.name, self.vendor_id, self.product_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_arrays_match_layout() {
        let dev = Device::new("Pad", 0x045e, 0x028e, 6, 15, DeviceMeta::default());
        assert_eq!(dev.axis_count(), 6);
        assert_eq!(dev.button_count(), 15);
        assert!(dev.axis_state.iter().all(|&v| v == 0.0));
        assert!(!dev.button(14));
        assert!(!dev.button(15));
        assert_eq!(dev.axis(99), 0.0);
    }

    #[test]
    fn description_includes_ids() {
        let dev = Device::new("XInput Controller 1", 0x45e, 0x28e, 0, 0, DeviceMeta::default());
        assert_eq!(dev.description(), "XInput Controller 1 (045e:028e)");
    }
}
