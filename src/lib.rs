//! padframe: cross-platform gamepads plus a per-frame input state engine.
//!
//! Two layers:
//!
//! - **Gamepads.** [`Gamepads`] wraps one platform backend (evdev on Linux, IOKit on macOS,
//!   HID + XInput on Windows). `detect()` reports attached/removed devices, `process()` reports
//!   button and axis changes, both to callbacks or any [`GamepadListener`]. Axis values are
//!   always normalized to `[-1, 1]`; hats become two axes.
//! - **Frames.** [`FrameState`] double-buffers keyboard, mouse and gamepad-slot state so a
//!   game loop can ask "was this pressed this frame?" or "is `CTRL+S` down?".
//!
//! [`Input`] wires the two together:
//!
//! ```
//! use padframe::{Config, HostEvent, Input, Key, Modifiers, VirtualBackend};
//!
//! // `Input::new(&config)` picks the native backend instead.
//! let config = Config::default();
//! let mut input = Input::with_backend(VirtualBackend::new(), &config);
//! input.init()?;
//! loop {
//!     input.handle_event(&HostEvent::KeyDown { key: Key::SPACE, modifiers: Modifiers::empty() });
//!     // Query before flushing: the flush turns this frame into the previous one.
//!     let quit = input.frame().was_key_pressed(Key::SPACE) || input.frame().gamepad_was_pressed(0, 0);
//!     input.flush();
//!     if quit {
//!         break;
//!     }
//! }
//! # Ok::<(), padframe::Error>(())
//! ```

pub mod backends;
pub mod combo;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod frame;
pub mod gamepads;
pub mod input;
pub mod keys;
pub mod listener;
pub mod metadata;
pub mod normalize;
pub mod queue;
pub mod registry;

pub use backends::virtual_input::{VirtualBackend, VirtualPad};
pub use backends::{Backend, PlatformBackend};
pub use combo::{parse_combo, Combo};
pub use config::Config;
pub use device::{Device, DeviceId};
pub use error::{ComboError, Error, Result};
pub use event::{EventKind, QueuedEvent};
pub use frame::{FrameSnapshot, FrameState, GamepadSlot, HostEvent};
pub use gamepads::Gamepads;
pub use input::Input;
pub use keys::{Key, Modifiers, MouseButton, KEY_COUNT, MOUSE_BUTTON_COUNT};
pub use listener::{Callbacks, GamepadListener};
pub use metadata::DeviceMeta;
