//! Frame State Engine.
//!
//! [`FrameState`] keeps two [`FrameSnapshot`]s, *current* and *previous*, plus a fixed array of
//! [`GamepadSlot`]s. Keyboard and mouse input arrives from the host through
//! [`FrameState::handle_event`]; gamepad input arrives through the [`GamepadListener`] impl when
//! a backend dispatches. [`FrameState::flush`] is the only transition: it copies current into
//! previous and clears the per-frame fields.
//!
//! Edge queries compare the two snapshots:
//!
//! | query          | current | previous |
//! |----------------|---------|----------|
//! | `was_pressed`  | down    | up       |
//! | `was_released` | up      | down     |
//!
//! Held keys, held mouse buttons and the cursor survive a flush. Scroll and every gamepad
//! slot's buttons and axes do not: gamepad state in *current* only reflects events dispatched
//! since the last flush.
//!
//! All queries are pure reads. Out-of-range codes, unattached slots and slot indices past the
//! capacity read as released / zero.

use crate::combo::{parse_combo, Combo};
use crate::config::Config;
use crate::device::{Device, DeviceId};
use crate::keys::{Key, Modifiers, MouseButton, KEY_COUNT, MOUSE_BUTTON_COUNT};
use crate::listener::GamepadListener;

/// Raw keyboard/mouse input delivered by the host's event loop.
///
/// Only key and `Other` events update the recorded modifier mask. Mouse events carry the host's
/// mask but leave the frame's untouched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HostEvent {
    KeyDown { key: Key, modifiers: Modifiers },
    KeyUp { key: Key, modifiers: Modifiers },
    MouseDown { button: MouseButton, modifiers: Modifiers },
    MouseUp { button: MouseButton, modifiers: Modifiers },
    /// Absolute cursor position.
    MouseMove { x: i32, y: i32, modifiers: Modifiers },
    /// Scroll delta for this event.
    MouseScroll { dx: f32, dy: f32, modifiers: Modifiers },
    /// Any other host event; only its modifier mask is recorded.
    Other { modifiers: Modifiers },
}

impl HostEvent {
    pub fn modifiers(&self) -> Modifiers {
        match *self {
            HostEvent::KeyDown { modifiers, .. }
            | HostEvent::KeyUp { modifiers, .. }
            | HostEvent::MouseDown { modifiers, .. }
            | HostEvent::MouseUp { modifiers, .. }
            | HostEvent::MouseMove { modifiers, .. }
            | HostEvent::MouseScroll { modifiers, .. }
            | HostEvent::Other { modifiers } => modifiers,
        }
    }
}

/// Keyboard and mouse state at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSnapshot {
    keys: Vec<bool>,
    buttons: [bool; MOUSE_BUTTON_COUNT],
    modifiers: Modifiers,
    cursor: (i32, i32),
    scroll: (f32, f32),
}

impl Default for FrameSnapshot {
    fn default() -> Self {
        Self {
            keys: vec![false; KEY_COUNT],
            buttons: [false; MOUSE_BUTTON_COUNT],
            modifiers: Modifiers::empty(),
            cursor: (0, 0),
            scroll: (0.0, 0.0),
        }
    }
}

impl FrameSnapshot {
    pub fn key(&self, key: Key) -> bool {
        self.keys.get(key.index()).copied().unwrap_or(false)
    }

    pub fn button(&self, button: MouseButton) -> bool {
        self.buttons[button.index()]
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn cursor(&self) -> (i32, i32) {
        self.cursor
    }

    pub fn scroll(&self) -> (f32, f32) {
        self.scroll
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct PadFrame {
    buttons: Vec<bool>,
    axis: [f32; 2],
}

#[derive(Clone, Debug, PartialEq)]
struct SlotBuffers {
    device: DeviceId,
    axis_count: usize,
    current: PadFrame,
    previous: PadFrame,
}

/// Per-frame view of one gamepad. Buffers exist exactly while a device is attached.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GamepadSlot {
    buffers: Option<SlotBuffers>,
}

impl GamepadSlot {
    fn attach(&mut self, device: &Device) {
        let frame = PadFrame {
            buttons: vec![false; device.button_count()],
            axis: [0.0; 2],
        };
        self.buffers = Some(SlotBuffers {
            device: device.id,
            axis_count: device.axis_count(),
            current: frame.clone(),
            previous: frame,
        });
    }

    pub fn attached(&self) -> bool {
        self.buffers.is_some()
    }

    /// Id of the device occupying this slot.
    pub fn device(&self) -> Option<DeviceId> {
        self.buffers.as_ref().map(|b| b.device)
    }

    pub fn button_count(&self) -> usize {
        self.buffers.as_ref().map_or(0, |b| b.current.buttons.len())
    }

    pub fn axis_count(&self) -> usize {
        self.buffers.as_ref().map_or(0, |b| b.axis_count)
    }

    fn holds(&mut self, device: DeviceId) -> Option<&mut SlotBuffers> {
        self.buffers.as_mut().filter(|b| b.device == device)
    }

    fn frames(&self) -> Option<(&PadFrame, &PadFrame)> {
        self.buffers.as_ref().map(|b| (&b.current, &b.previous))
    }
}

/// Double-buffered keyboard, mouse and gamepad state.
#[derive(Clone, Debug)]
pub struct FrameState {
    current: FrameSnapshot,
    previous: FrameSnapshot,
    slots: Vec<GamepadSlot>,
}

impl Default for FrameState {
    fn default() -> Self {
        Self::new(Config::default().gamepad_slots)
    }
}

impl FrameState {
    /// Engine with `slot_capacity` gamepad slots (at least one).
    pub fn new(slot_capacity: usize) -> Self {
        Self {
            current: FrameSnapshot::default(),
            previous: FrameSnapshot::default(),
            slots: vec![GamepadSlot::default(); slot_capacity.max(1)],
        }
    }

    pub fn with_config(config: &Config) -> Self {
        Self::new(config.gamepad_slots)
    }

    pub fn current(&self) -> &FrameSnapshot {
        &self.current
    }

    pub fn previous(&self) -> &FrameSnapshot {
        &self.previous
    }

    /// Record one host event into the current snapshot.
    pub fn handle_event(&mut self, event: &HostEvent) {
        let cur = &mut self.current;
        match *event {
            HostEvent::KeyDown { key, modifiers } | HostEvent::KeyUp { key, modifiers } => {
                cur.modifiers = modifiers;
                let down = matches!(event, HostEvent::KeyDown { .. });
                if let Some(k) = cur.keys.get_mut(key.index()) {
                    *k = down;
                }
            }
            HostEvent::MouseDown { button, .. } => cur.buttons[button.index()] = true,
            HostEvent::MouseUp { button, .. } => cur.buttons[button.index()] = false,
            HostEvent::MouseMove { x, y, .. } => cur.cursor = (x, y),
            HostEvent::MouseScroll { dx, dy, .. } => {
                cur.scroll.0 += dx;
                cur.scroll.1 += dy;
            }
            HostEvent::Other { modifiers } => cur.modifiers = modifiers,
        }
    }

    /// Frame boundary: copy current into previous, then clear scroll and gamepad slots.
    pub fn flush(&mut self) {
        self.previous.clone_from(&self.current);
        self.current.scroll = (0.0, 0.0);
        for b in self.slots.iter_mut().filter_map(|s| s.buffers.as_mut()) {
            b.previous.clone_from(&b.current);
            b.current.buttons.fill(false);
            b.current.axis = [0.0; 2];
        }
    }

    // ----- keyboard -----

    pub fn is_key_down(&self, key: Key) -> bool {
        self.current.key(key)
    }

    pub fn was_key_pressed(&self, key: Key) -> bool {
        self.current.key(key) && !self.previous.key(key)
    }

    pub fn was_key_released(&self, key: Key) -> bool {
        !self.current.key(key) && self.previous.key(key)
    }

    /// `true` when every key is down; `true` for an empty list.
    pub fn all_keys_down(&self, keys: &[Key]) -> bool {
        keys.iter().all(|&k| self.is_key_down(k))
    }

    /// `true` when at least one key is down; `false` for an empty list.
    pub fn any_keys_down(&self, keys: &[Key]) -> bool {
        keys.iter().any(|&k| self.is_key_down(k))
    }

    // ----- mouse -----

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.current.button(button)
    }

    pub fn was_button_pressed(&self, button: MouseButton) -> bool {
        self.current.button(button) && !self.previous.button(button)
    }

    pub fn was_button_released(&self, button: MouseButton) -> bool {
        !self.current.button(button) && self.previous.button(button)
    }

    pub fn all_buttons_down(&self, buttons: &[MouseButton]) -> bool {
        buttons.iter().all(|&b| self.is_button_down(b))
    }

    pub fn any_buttons_down(&self, buttons: &[MouseButton]) -> bool {
        buttons.iter().any(|&b| self.is_button_down(b))
    }

    pub fn cursor(&self) -> (i32, i32) {
        self.current.cursor
    }

    pub fn cursor_delta(&self) -> (i32, i32) {
        (
            self.current.cursor.0 - self.previous.cursor.0,
            self.current.cursor.1 - self.previous.cursor.1,
        )
    }

    pub fn has_mouse_move(&self) -> bool {
        self.cursor_delta() != (0, 0)
    }

    pub fn scroll(&self) -> (f32, f32) {
        self.current.scroll
    }

    pub fn scrolled(&self) -> bool {
        self.current.scroll != (0.0, 0.0)
    }

    // ----- modifiers and combos -----

    /// `true` when every bit of `mask` is held.
    pub fn modifier_down(&self, mask: Modifiers) -> bool {
        self.current.modifiers.contains(mask)
    }

    /// `true` when the held modifiers are exactly `mask`.
    pub fn modifier_equals(&self, mask: Modifiers) -> bool {
        self.current.modifiers == mask
    }

    /// Combo check against explicit parts. See [`Combo::is_down`].
    pub fn is_down(&self, modifiers: Modifiers, keys: &[Key]) -> bool {
        if modifiers.is_empty() && keys.is_empty() {
            return false;
        }
        (modifiers.is_empty() || self.modifier_equals(modifiers)) && self.all_keys_down(keys)
    }

    /// Parse `combo` and check it. Unparseable combos are never down.
    pub fn is_str_down(&self, combo: &str) -> bool {
        parse_combo(combo).is_ok_and(|c| c.is_down(self))
    }

    // ----- gamepads -----

    pub fn slot_capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot index a device id maps to.
    pub fn slot_for(&self, device: DeviceId) -> usize {
        device as usize % self.slots.len()
    }

    pub fn slot(&self, slot: usize) -> Option<&GamepadSlot> {
        self.slots.get(slot)
    }

    pub fn gamepad_connected(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(GamepadSlot::attached)
    }

    /// Number of attached slots.
    pub fn connected_gamepads(&self) -> usize {
        self.slots.iter().filter(|s| s.attached()).count()
    }

    /// Drop a slot's buffers. The device stays attached to its backend; its later events
    /// are ignored until it is attached again.
    pub fn gamepad_disconnect(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.buffers = None;
        }
    }

    pub fn gamepad_disconnect_device(&mut self, device: DeviceId) {
        let slot = self.slot_for(device);
        if self.slots[slot].device() == Some(device) {
            self.slots[slot].buffers = None;
        }
    }

    fn pad_button(&self, slot: usize, button: usize) -> Option<(bool, bool)> {
        let (cur, prev) = self.slots.get(slot)?.frames()?;
        Some((*cur.buttons.get(button)?, *prev.buttons.get(button)?))
    }

    fn pad_axis(&self, slot: usize, axis: usize) -> Option<(f32, f32)> {
        let (cur, prev) = self.slots.get(slot)?.frames()?;
        Some((*cur.axis.get(axis)?, *prev.axis.get(axis)?))
    }

    pub fn gamepad_button_down(&self, slot: usize, button: usize) -> bool {
        self.pad_button(slot, button).is_some_and(|(cur, _)| cur)
    }

    /// `true` when the slot is attached, has `button`, and it is not down.
    pub fn gamepad_button_up(&self, slot: usize, button: usize) -> bool {
        self.pad_button(slot, button).is_some_and(|(cur, _)| !cur)
    }

    pub fn gamepad_was_pressed(&self, slot: usize, button: usize) -> bool {
        self.pad_button(slot, button)
            .is_some_and(|(cur, prev)| cur && !prev)
    }

    pub fn gamepad_was_released(&self, slot: usize, button: usize) -> bool {
        self.pad_button(slot, button)
            .is_some_and(|(cur, prev)| !cur && prev)
    }

    /// Current value of tracked axis `axis` (0 or 1).
    pub fn gamepad_axis(&self, slot: usize, axis: usize) -> f32 {
        self.pad_axis(slot, axis).map_or(0.0, |(cur, _)| cur)
    }

    /// `current - previous` for tracked axis `axis` (0 or 1).
    pub fn gamepad_axis_delta(&self, slot: usize, axis: usize) -> f32 {
        self.pad_axis(slot, axis).map_or(0.0, |(cur, prev)| cur - prev)
    }
}

impl Combo {
    /// `true` when the held modifiers equal this combo's mask (if it has one) and every key
    /// is down. A combo naming nothing is never down.
    pub fn is_down(&self, state: &FrameState) -> bool {
        state.is_down(self.modifiers, &self.keys)
    }
}

impl GamepadListener for FrameState {
    fn device_attached(&mut self, device: &Device) {
        let slot = self.slot_for(device.id);
        if let Some(other) = self.slots[slot].device() {
            tracing::debug!(slot, other, id = device.id, "[FRAME/SLOT] slot reassigned");
        }
        self.slots[slot].attach(device);
    }

    fn device_removed(&mut self, device: &Device) {
        self.gamepad_disconnect_device(device.id);
    }

    fn button_down(&mut self, device: &Device, button: u32, _timestamp: f64) {
        self.set_pad_button(device.id, button, true);
    }

    fn button_up(&mut self, device: &Device, button: u32, _timestamp: f64) {
        self.set_pad_button(device.id, button, false);
    }

    fn axis_moved(&mut self, device: &Device, axis: u32, value: f32, _last: f32, _timestamp: f64) {
        let slot = self.slot_for(device.id);
        if let Some(b) = self.slots[slot].holds(device.id) {
            if let Some(a) = b.current.axis.get_mut(axis as usize) {
                *a = value;
            }
        }
    }
}

impl FrameState {
    fn set_pad_button(&mut self, device: DeviceId, button: u32, down: bool) {
        let slot = self.slot_for(device);
        if let Some(b) = self.slots[slot].holds(device) {
            if let Some(s) = b.current.buttons.get_mut(button as usize) {
                *s = down;
            }
        }
    }
}
