//! Platform backends for `padframe`.
//!
//! Every backend implements [`Backend`] and keeps its own
//! [`DeviceRegistry`](crate::registry::DeviceRegistry). Exactly one native backend is compiled
//! per target and exposed as [`PlatformBackend`]:
//!
//! | target  | backend                        | threads                                        |
//! |---------|--------------------------------|------------------------------------------------|
//! | Linux   | [`linux::EvdevBackend`]        | one blocking reader per device, shared queue   |
//! | macOS   | [`macos::IoKitBackend`]        | caller's thread, private run-loop mode         |
//! | Windows | [`windows::WindowsBackend`]    | caller's thread, hidden message window         |
//!
//! Other targets get the in-process [`virtual_input::VirtualBackend`], which is also available
//! everywhere for tests and for hosts that synthesize controllers.
//!
//! # Feature flags
//! - **`hid`**: generic HID enumeration on Windows (XInput pads work without it).

use crate::config::Config;
use crate::device::Device;
use crate::error::Result;
use crate::listener::GamepadListener;

#[cfg(target_os = "linux")]
#[cfg_attr(docsrs, doc(cfg(target_os = "linux")))]
pub mod linux;

#[cfg(target_os = "macos")]
#[cfg_attr(docsrs, doc(cfg(target_os = "macos")))]
pub mod macos;

#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
pub mod windows;

pub mod virtual_input;

/// The native backend for the current target.
#[cfg(target_os = "linux")]
pub type PlatformBackend = linux::EvdevBackend;

/// The native backend for the current target.
#[cfg(target_os = "macos")]
pub type PlatformBackend = macos::IoKitBackend;

/// The native backend for the current target.
#[cfg(target_os = "windows")]
pub type PlatformBackend = windows::WindowsBackend;

/// No native backend on this target; devices can only be injected.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub type PlatformBackend = virtual_input::VirtualBackend;

/// Contract shared by all backends.
///
/// All methods are called from one thread: the one that called [`Backend::init`].
pub trait Backend {
    /// Build an uninitialized backend.
    fn with_config(config: &Config) -> Self
    where
        Self: Sized;

    /// Prepare the OS enumeration context. Calling it again while initialized does nothing.
    fn init(&mut self) -> Result<()>;

    /// Release every device and OS resource. Safe without a prior `init()`.
    /// Afterwards `device_count()` is 0. No removal events are dispatched.
    fn shutdown(&mut self);

    fn device_count(&self) -> usize;

    /// Live device at `index`, `None` when out of range.
    fn device_at(&self, index: usize) -> Option<&Device>;

    /// Pick up attached and removed devices and dispatch their lifecycle events.
    fn detect(&mut self, listener: &mut dyn GamepadListener);

    /// Dispatch the button and axis events accumulated since the last call.
    fn process(&mut self, listener: &mut dyn GamepadListener);
}
