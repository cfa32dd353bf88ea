//! XInput standard-gamepad path.
//!
//! Controllers reachable through XInput are exposed as fixed-layout devices, one per user slot
//! (`0..4`), independent of what their HID descriptor says.
//!
//! ## Axes (6)
//! - `0..=3`: LX, LY, RX, RY, mapped from `[-32768, 32767]` (Y is not inverted)
//! - `4`, `5`: LT, RT, mapped from `0..=255` through `v / 127.5 - 1`
//!
//! ## Buttons (15)
//! D-pad up/down/left/right, Start, Back, left/right stick click, left/right shoulder,
//! A, B, X, Y, Guide.
//!
//! The guide button is only visible through the undocumented `XInputGetStateEx` export
//! (ordinal 100 of `xinput1_4.dll`). When that entry point cannot be resolved the plain
//! `XInputGetState` is used and the guide button never goes down.
//!
//! XInput reports neither vendor nor product ids. Every slot is announced as an
//! Xbox 360 controller (`045E:028E`).

use crate::device::{Device, DeviceId};
use crate::event::QueuedEvent;
use crate::metadata::DeviceMeta;
use crate::normalize::{half_range, linear};
use crate::queue::EventQueue;
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

use windows_sys::Win32::Foundation::ERROR_SUCCESS;
use windows_sys::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows_sys::Win32::UI::Input::XboxController::*;

pub(crate) const SLOTS: u32 = 4;
pub(crate) const AXES: usize = 6;
pub(crate) const BUTTONS: usize = 15;

const VENDOR_ID: u16 = 0x045E;
const PRODUCT_ID: u16 = 0x028E;

const GAMEPAD_GUIDE: u16 = 0x0400;

/// Button index order of the fixed layout.
const BUTTON_MASKS: [u16; BUTTONS] = [
    XINPUT_GAMEPAD_DPAD_UP,
    XINPUT_GAMEPAD_DPAD_DOWN,
    XINPUT_GAMEPAD_DPAD_LEFT,
    XINPUT_GAMEPAD_DPAD_RIGHT,
    XINPUT_GAMEPAD_START,
    XINPUT_GAMEPAD_BACK,
    XINPUT_GAMEPAD_LEFT_THUMB,
    XINPUT_GAMEPAD_RIGHT_THUMB,
    XINPUT_GAMEPAD_LEFT_SHOULDER,
    XINPUT_GAMEPAD_RIGHT_SHOULDER,
    XINPUT_GAMEPAD_A,
    XINPUT_GAMEPAD_B,
    XINPUT_GAMEPAD_X,
    XINPUT_GAMEPAD_Y,
    GAMEPAD_GUIDE,
];

/// Layout of `XInputGetStateEx`'s output. Same as `XINPUT_STATE` plus trailing padding.
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct GamepadEx {
    buttons: u16,
    left_trigger: u8,
    right_trigger: u8,
    thumb_lx: i16,
    thumb_ly: i16,
    thumb_rx: i16,
    thumb_ry: i16,
    _reserved: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct StateEx {
    packet_number: u32,
    gamepad: GamepadEx,
}

type GetStateEx = unsafe extern "system" fn(user_index: u32, state: *mut StateEx) -> u32;

/// One raw sample of a slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Sample {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumbs: [i16; 4],
}

impl Sample {
    /// Normalized values in axis index order.
    pub fn axes(&self) -> [f32; AXES] {
        let stick = |v: i16| linear(i64::from(v), -32768, 32767);
        let trigger = |v: u8| half_range(f64::from(v), 127.5);
        [
            stick(self.thumbs[0]),
            stick(self.thumbs[1]),
            stick(self.thumbs[2]),
            stick(self.thumbs[3]),
            trigger(self.left_trigger),
            trigger(self.right_trigger),
        ]
    }

    #[cfg(test)]
    fn button(&self, index: usize) -> bool {
        BUTTON_MASKS
            .get(index)
            .is_some_and(|&mask| self.buttons & mask != 0)
    }
}

/// Entry points resolved at `init()`.
#[derive(Debug, Default)]
pub(crate) struct XInput {
    get_state_ex: Option<GetStateEx>,
}

impl XInput {
    pub fn load() -> Self {
        let name: Vec<u16> = OsStr::new("xinput1_4.dll")
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        // SAFETY: `name` is NUL-terminated and outlives the call.
        let module = unsafe { LoadLibraryW(name.as_ptr()) };
        if module.is_null() {
            tracing::debug!("[XINPUT/LOAD] xinput1_4.dll not found; guide button unavailable");
            return Self::default();
        }
        // SAFETY: ordinal lookups pass the ordinal in the low word of the name pointer.
        let proc = unsafe { GetProcAddress(module, 100usize as *const u8) };
        let get_state_ex = proc.map(|f| {
            // SAFETY: ordinal 100 of xinput1_4 has the `StateEx` signature.
            unsafe { std::mem::transmute::<unsafe extern "system" fn() -> isize, GetStateEx>(f) }
        });
        if get_state_ex.is_none() {
            tracing::debug!("[XINPUT/LOAD] XInputGetStateEx not exported; guide button unavailable");
        }
        Self { get_state_ex }
    }

    /// `true` when a controller occupies `slot`.
    pub fn connected(&self, slot: u32) -> bool {
        // SAFETY: XINPUT_CAPABILITIES is plain old data.
        let mut caps: XINPUT_CAPABILITIES = unsafe { std::mem::zeroed() };
        // SAFETY: `caps` outlives the call.
        unsafe { XInputGetCapabilities(slot, 0, &mut caps) == ERROR_SUCCESS }
    }

    /// Current state of `slot`, `None` when nothing is connected.
    pub fn sample(&self, slot: u32) -> Option<Sample> {
        if let Some(get_state_ex) = self.get_state_ex {
            let mut state = StateEx::default();
            // SAFETY: `state` matches the layout the export writes.
            if unsafe { get_state_ex(slot, &mut state) } != ERROR_SUCCESS {
                return None;
            }
            let g = state.gamepad;
            return Some(Sample {
                buttons: g.buttons,
                left_trigger: g.left_trigger,
                right_trigger: g.right_trigger,
                thumbs: [g.thumb_lx, g.thumb_ly, g.thumb_rx, g.thumb_ry],
            });
        }

        // SAFETY: XINPUT_STATE is plain old data.
        let mut state: XINPUT_STATE = unsafe { std::mem::zeroed() };
        // SAFETY: `state` outlives the call.
        if unsafe { XInputGetState(slot, &mut state) } != ERROR_SUCCESS {
            return None;
        }
        let g = state.Gamepad;
        Some(Sample {
            buttons: g.wButtons,
            left_trigger: g.bLeftTrigger,
            right_trigger: g.bRightTrigger,
            thumbs: [g.sThumbLX, g.sThumbLY, g.sThumbRX, g.sThumbRY],
        })
    }
}

/// The device record announced for `slot`.
pub(crate) fn device_for_slot(slot: u32) -> Device {
    Device::new(
        format!("XInput Controller {}", slot + 1),
        VENDOR_ID,
        PRODUCT_ID,
        AXES,
        BUTTONS,
        DeviceMeta::with_path("xinput", format!("xinput:{slot}")),
    )
}

/// Backend-private side of one XInput device.
#[derive(Debug)]
pub(crate) struct XInputPad {
    pub slot: u32,
    buttons: u16,
    axes: [f32; AXES],
    connected_logged: bool,
}

impl XInputPad {
    pub fn new(slot: u32) -> Self {
        Self {
            slot,
            buttons: 0,
            axes: [0.0; AXES],
            connected_logged: false,
        }
    }

    /// Queue the changes between the previous sample and `sample`.
    ///
    /// Axes start at 0, so the first sample also reports released triggers (-1).
    pub fn update(&mut self, id: DeviceId, sample: Sample, out: &mut EventQueue) {
        if !self.connected_logged {
            tracing::debug!(id, slot = self.slot, "[XINPUT/CONNECT] first sample");
            self.connected_logged = true;
        }

        let changed = sample.buttons ^ self.buttons;
        for (button, &mask) in BUTTON_MASKS.iter().enumerate() {
            if changed & mask != 0 {
                out.push(QueuedEvent::button(id, button as u32, sample.buttons & mask != 0));
            }
        }
        self.buttons = sample.buttons;

        for (axis, value) in sample.axes().into_iter().enumerate() {
            let last = std::mem::replace(&mut self.axes[axis], value);
            if value != last {
                out.push(QueuedEvent::axis(id, axis as u32, value, last));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn fixed_layout() {
        let d = device_for_slot(2);
        assert_eq!(d.name, "XInput Controller 3");
        assert_eq!((d.vendor_id, d.product_id), (0x045E, 0x028E));
        assert_eq!(d.axis_count(), 6);
        assert_eq!(d.button_count(), 15);
    }

    #[test]
    fn rest_position_is_centered_with_triggers_released() {
        let axes = Sample::default().axes();
        assert!(axes[0].abs() < 1e-4);
        assert_eq!(axes[4], -1.0);
        assert_eq!(axes[5], -1.0);

        let full = Sample {
            left_trigger: 255,
            thumbs: [32767, -32768, 0, 0],
            ..Sample::default()
        };
        let axes = full.axes();
        assert_eq!(axes[0], 1.0);
        assert_eq!(axes[1], -1.0);
        assert_eq!(axes[4], 1.0);
    }

    #[test]
    fn button_order() {
        let s = Sample {
            buttons: XINPUT_GAMEPAD_A | GAMEPAD_GUIDE | XINPUT_GAMEPAD_DPAD_UP,
            ..Sample::default()
        };
        let down: Vec<usize> = (0..BUTTONS).filter(|&b| s.button(b)).collect();
        assert_eq!(down, vec![0, 10, 14]);
        assert!(!s.button(BUTTONS));
    }

    #[test]
    fn update_reports_only_changes() {
        let mut pad = XInputPad::new(0);
        let mut q = EventQueue::new();

        pad.update(7, Sample::default(), &mut q);
        let rest = q.take();
        assert!(rest.iter().all(|e| matches!(e.kind, EventKind::AxisMoved { .. })));
        assert!(rest.iter().any(|e| e.kind
            == EventKind::AxisMoved {
                axis: 4,
                value: -1.0,
                last_value: 0.0
            }));
        pad.update(7, Sample::default(), &mut q);
        assert!(q.is_empty());

        let pressed = Sample {
            buttons: XINPUT_GAMEPAD_B,
            right_trigger: 255,
            ..Sample::default()
        };
        pad.update(7, pressed, &mut q);
        let events = q.take();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::ButtonDown { button: 11 });
        assert_eq!(
            events[1].kind,
            EventKind::AxisMoved {
                axis: 5,
                value: 1.0,
                last_value: -1.0
            }
        );

        pad.update(7, pressed, &mut q);
        assert!(q.is_empty());
    }
}
