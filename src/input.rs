//! One-stop facade: a gamepad backend wired into a frame state engine.

use crate::backends::{Backend, PlatformBackend};
use crate::config::Config;
use crate::error::Result;
use crate::frame::{FrameState, HostEvent};
use crate::gamepads::Gamepads;

/// Frame-based input for a host render loop.
///
/// ```text
/// loop {
///     for ev in host_events() { input.handle_event(&ev); }
///     update(input.frame());
///     input.flush();
/// }
/// ```
///
/// [`Input::flush`] ends a frame: it rolls the current snapshot into the previous one, then picks
/// up device changes and dispatches queued gamepad input into the fresh current snapshot. Queries
/// made after a flush therefore see the gamepad edges that arrived since the previous one.
pub struct Input<B: Backend = PlatformBackend> {
    gamepads: Gamepads<B>,
    frame: FrameState,
}

impl Input<PlatformBackend> {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_backend(
            PlatformBackend::with_config(config),
            config,
        ))
    }
}

impl<B: Backend> Input<B> {
    pub fn with_backend(backend: B, config: &Config) -> Self {
        Self {
            gamepads: Gamepads::with_backend(backend),
            frame: FrameState::with_config(config),
        }
    }

    /// Initialize the backend. Devices already plugged in get a slot straight away.
    pub fn init(&mut self) -> Result<()> {
        self.gamepads.init_with(&mut self.frame)
    }

    pub fn handle_event(&mut self, event: &HostEvent) {
        self.frame.handle_event(event);
    }

    /// End the frame, then pump the backend.
    pub fn flush(&mut self) {
        self.frame.flush();
        self.gamepads.detect_with(&mut self.frame);
        self.gamepads.process_with(&mut self.frame);
    }

    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut FrameState {
        &mut self.frame
    }

    pub fn gamepads(&self) -> &Gamepads<B> {
        &self.gamepads
    }

    pub fn gamepads_mut(&mut self) -> &mut Gamepads<B> {
        &mut self.gamepads
    }

    pub fn gamepad_count(&self) -> usize {
        self.gamepads.device_count()
    }

    /// Shut the backend down and empty every slot.
    pub fn shutdown(&mut self) {
        self.gamepads.shutdown();
        for slot in 0..self.frame.slot_capacity() {
            self.frame.gamepad_disconnect(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::{VirtualBackend, VirtualPad};

    fn input() -> Input<VirtualBackend> {
        Input::with_backend(VirtualBackend::new(), &Config::default())
    }

    #[test]
    fn init_fills_slots_for_present_devices() {
        let mut backend = VirtualBackend::new();
        backend.attach(VirtualPad::new("Pad").buttons(2));
        let mut input = Input::with_backend(backend, &Config::default());
        input.init().unwrap();
        assert!(input.frame().gamepad_connected(0));
        assert_eq!(input.gamepad_count(), 1);
    }

    #[test]
    fn gamepad_press_is_visible_after_flush() {
        let mut input = input();
        input.init().unwrap();
        let id = input
            .gamepads_mut()
            .backend_mut()
            .attach(VirtualPad::new("Pad").buttons(4));
        input.flush();

        input.gamepads_mut().backend_mut().press_button(id, 3);
        input.flush();
        assert!(input.frame().gamepad_was_pressed(0, 3));
        input.flush();
        assert!(!input.frame().gamepad_button_down(0, 3));
    }

    #[test]
    fn shutdown_clears_slots() {
        let mut input = input();
        input.init().unwrap();
        input
            .gamepads_mut()
            .backend_mut()
            .attach(VirtualPad::new("Pad"));
        input.flush();
        assert_eq!(input.frame().connected_gamepads(), 1);
        input.shutdown();
        assert_eq!(input.frame().connected_gamepads(), 0);
        assert_eq!(input.gamepad_count(), 0);
    }
}
