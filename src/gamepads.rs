//! Host-facing wrapper around one backend instance.

use crate::backends::{Backend, PlatformBackend};
use crate::config::Config;
use crate::device::Device;
use crate::error::Result;
use crate::listener::{
    AxisCallback, ButtonCallback, Callbacks, DeviceCallback, Fanout, GamepadListener,
};

/// A backend plus its registered callbacks.
///
/// `detect()`/`process()` dispatch to the registered callbacks; the `_with` variants also
/// dispatch to an extra listener (the frame state engine, usually) after each callback.
pub struct Gamepads<B: Backend = PlatformBackend> {
    backend: B,
    callbacks: Callbacks,
    initialized: bool,
    in_flight: bool,
}

impl Gamepads<PlatformBackend> {
    /// The native backend for this target.
    pub fn new(config: &Config) -> Self {
        Self::with_backend(PlatformBackend::with_config(config))
    }
}

impl<B: Backend> Gamepads<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            callbacks: Callbacks::default(),
            initialized: false,
            in_flight: false,
        }
    }

    /// Initialize the backend and run a first `detect()`, so devices already plugged in are
    /// announced to callbacks registered beforehand. Idempotent.
    pub fn init(&mut self) -> Result<()> {
        self.init_with(&mut NoListener)
    }

    pub fn init_with(&mut self, listener: &mut dyn GamepadListener) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.backend.init()?;
        self.initialized = true;
        self.detect_with(listener);
        Ok(())
    }

    /// Release every device. No removal callbacks fire.
    pub fn shutdown(&mut self) {
        self.backend.shutdown();
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn device_count(&self) -> usize {
        self.backend.device_count()
    }

    pub fn device_at(&self, index: usize) -> Option<&Device> {
        self.backend.device_at(index)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        (0..self.device_count()).filter_map(move |i| self.device_at(i))
    }

    pub fn detect(&mut self) {
        self.detect_with(&mut NoListener);
    }

    pub fn detect_with(&mut self, listener: &mut dyn GamepadListener) {
        let mut fan = Fanout {
            first: &mut self.callbacks,
            second: listener,
        };
        self.backend.detect(&mut fan);
    }

    pub fn process(&mut self) {
        self.process_with(&mut NoListener);
    }

    /// Dispatch queued input. A call made while another is still dispatching returns at once.
    pub fn process_with(&mut self, listener: &mut dyn GamepadListener) {
        if self.in_flight {
            return;
        }
        self.in_flight = true;
        let mut fan = Fanout {
            first: &mut self.callbacks,
            second: listener,
        };
        self.backend.process(&mut fan);
        self.in_flight = false;
    }

    pub fn on_attach(&mut self, callback: Option<DeviceCallback>) {
        self.callbacks.on_attach(callback);
    }

    pub fn on_remove(&mut self, callback: Option<DeviceCallback>) {
        self.callbacks.on_remove(callback);
    }

    pub fn on_button_down(&mut self, callback: Option<ButtonCallback>) {
        self.callbacks.on_button_down(callback);
    }

    pub fn on_button_up(&mut self, callback: Option<ButtonCallback>) {
        self.callbacks.on_button_up(callback);
    }

    pub fn on_axis_move(&mut self, callback: Option<AxisCallback>) {
        self.callbacks.on_axis_move(callback);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: Backend> Drop for Gamepads<B> {
    fn drop(&mut self) {
        self.backend.shutdown();
    }
}

struct NoListener;

impl GamepadListener for NoListener {}
