//! macOS IOKit backend.
//!
//! An `IOHIDManager` matching Generic Desktop joysticks, gamepads and multi-axis controllers is
//! scheduled on the caller's run loop in a private mode (`Config::run_loop_mode`). Nothing runs
//! in the background: `detect()` and `process()` spin that mode once without waiting, which is
//! when IOKit delivers its matching, removal and value callbacks. Callbacks only queue events;
//! the events are dispatched after the run loop returns.
//!
//! ## Queues
//! - attach/remove go on the device queue, dispatched by `detect()`
//! - button/axis changes go on the input queue, dispatched by `process()`
//!
//! A device can be matched during `process()`'s pump and deliver input in the same pass. Its
//! attach is then taken off the device queue and dispatched ahead of that input.
//!
//! A removal callback purges the device's pending input. A device removed before its attach was
//! dispatched vanishes without any event.
//!
//! ## Elements
//! `Input_Misc` and `Input_Axis` elements become axes. Hat switches (usage `0x39`) take two axis
//! slots; values outside the logical range are the centered position. Other axes start from
//! their declared logical range and widen it when a sample falls outside. `Input_Button`
//! elements become buttons in enumeration order.

mod ffi;

use crate::backends::Backend;
use crate::config::Config;
use crate::device::{Device, DeviceId};
use crate::error::{Error, Result};
use crate::event::{EventKind, QueuedEvent};
use crate::listener::GamepadListener;
use crate::metadata::DeviceMeta;
use crate::normalize::{AxisLayout, AxisRange};
use crate::queue::EventQueue;
use crate::registry::DeviceRegistry;
use core_foundation::array::CFArray;
use core_foundation::base::{kCFAllocatorDefault, CFRelease, CFType, TCFType};
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::runloop::{kCFRunLoopRunHandledSource, CFRunLoop, CFRunLoopRunInMode};
use core_foundation::string::CFString;
use ffi::*;
use std::cell::UnsafeCell;
use std::ffi::c_void;

/// Upper bound on run-loop passes per pump, in case a device floods the mode.
const MAX_PUMP_PASSES: usize = 64;

/// How a HID element is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ElementRole {
    Axis,
    Hat,
    Button,
    Ignored,
}

fn classify(kind: IOHIDElementType, usage: u32) -> ElementRole {
    match kind {
        kIOHIDElementTypeInput_Misc | kIOHIDElementTypeInput_Axis => {
            if usage == kHIDUsage_GD_Hatswitch {
                ElementRole::Hat
            } else {
                ElementRole::Axis
            }
        }
        kIOHIDElementTypeInput_Button => ElementRole::Button,
        _ => ElementRole::Ignored,
    }
}

/// Backend-private side of one matched device.
#[derive(Debug)]
struct HidElements {
    device_ref: IOHIDDeviceRef,
    layout: AxisLayout,
    buttons: Vec<IOHIDElementCookie>,
    pressed: Vec<bool>,
}

/// State the IOKit callbacks write into.
#[derive(Debug, Default)]
struct Shared {
    registry: DeviceRegistry<HidElements>,
    device_events: EventQueue,
    input_events: EventQueue,
}

impl Shared {
    fn find(&self, device_ref: IOHIDDeviceRef) -> Option<DeviceId> {
        self.registry
            .iter()
            .find(|e| e.private.device_ref == device_ref)
            .map(|e| e.device.id)
    }

    fn matched(&mut self, device_ref: IOHIDDeviceRef) {
        if self.find(device_ref).is_some() {
            return;
        }
        let (layout, buttons) = read_elements(device_ref);
        if layout.is_empty() && buttons.is_empty() {
            tracing::debug!("[IOKIT/MATCH] no usable elements, skipped");
            return;
        }
        let name = string_property(device_ref, kIOHIDProductKey).unwrap_or_else(|| "Unknown".into());
        let vendor_id = int_property(device_ref, kIOHIDVendorIDKey).unwrap_or(0) as u16;
        let product_id = int_property(device_ref, kIOHIDProductIDKey).unwrap_or(0) as u16;
        let location = int_property(device_ref, kIOHIDLocationIDKey).unwrap_or(0);
        let meta = DeviceMeta {
            serial_number: string_property(device_ref, kIOHIDSerialNumberKey),
            usage_page: int_property(device_ref, kIOHIDPrimaryUsagePageKey).map(|v| v as u16),
            usage: int_property(device_ref, kIOHIDPrimaryUsageKey).map(|v| v as u16),
            ..DeviceMeta::with_path("iokit", format!("iokit:{location:08x}"))
        };

        let device = Device::new(name, vendor_id, product_id, layout.len(), buttons.len(), meta);
        tracing::debug!(
            axes = device.axis_count(),
            buttons = device.button_count(),
            "[IOKIT/MATCH] {device}"
        );
        let pressed = vec![false; buttons.len()];
        let id = self.registry.insert(
            device,
            HidElements {
                device_ref,
                layout,
                buttons,
                pressed,
            },
        );
        self.device_events
            .push(QueuedEvent::new(id, EventKind::DeviceAttached));
    }

    fn removed(&mut self, device_ref: IOHIDDeviceRef) {
        if let Some(id) = self.find(device_ref) {
            self.registry
                .unplug(id, &mut self.device_events, &mut self.input_events);
        }
    }

    fn value(&mut self, value: IOHIDValueRef) {
        // SAFETY: `value` is valid for the duration of the callback.
        let (element, length, raw) = unsafe {
            (
                IOHIDValueGetElement(value),
                IOHIDValueGetLength(value),
                IOHIDValueGetIntegerValue(value),
            )
        };
        if element.is_null() {
            return;
        }
        // SAFETY: `element` came from a live value.
        let (device_ref, cookie) = unsafe { (IOHIDElementGetDevice(element), IOHIDElementGetCookie(element)) };
        let Some(entry) = self
            .registry
            .iter_mut()
            .find(|e| e.private.device_ref == device_ref)
        else {
            return;
        };
        let id = entry.device.id;
        let elements = &mut entry.private;

        if let Some(slot) = elements.layout.find(cookie) {
            // Some controllers report multi-byte blobs on axis cookies.
            if length > 4 {
                return;
            }
            for (axis, value, last) in elements.layout.feed(slot, raw as i64) {
                self.input_events
                    .push(QueuedEvent::axis(id, axis, value, last));
            }
        } else if let Some(button) = elements.buttons.iter().position(|&c| c == cookie) {
            let down = raw != 0;
            if elements.pressed[button] != down {
                elements.pressed[button] = down;
                self.input_events
                    .push(QueuedEvent::button(id, button as u32, down));
            }
        }
    }
}

fn read_elements(device_ref: IOHIDDeviceRef) -> (AxisLayout, Vec<IOHIDElementCookie>) {
    let mut layout = AxisLayout::new();
    let mut buttons = Vec::new();
    // SAFETY: copy rule; the array is released when `elements` drops.
    let array = unsafe {
        IOHIDDeviceCopyMatchingElements(device_ref, std::ptr::null(), kIOHIDOptionsTypeNone)
    };
    if array.is_null() {
        return (layout, buttons);
    }
    let elements: CFArray<CFType> = unsafe { CFArray::wrap_under_create_rule(array) };
    for element in elements.get_all_values() {
        let element = element as IOHIDElementRef;
        // SAFETY: elements of a live device.
        let (kind, usage, cookie, min, max) = unsafe {
            (
                IOHIDElementGetType(element),
                IOHIDElementGetUsage(element),
                IOHIDElementGetCookie(element),
                IOHIDElementGetLogicalMin(element) as i64,
                IOHIDElementGetLogicalMax(element) as i64,
            )
        };
        match classify(kind, usage) {
            ElementRole::Axis => layout.push_linear(cookie, AxisRange::calibrating(min, max)),
            ElementRole::Hat => layout.push_hat(cookie, min, max),
            ElementRole::Button => buttons.push(cookie),
            ElementRole::Ignored => {}
        }
    }
    (layout, buttons)
}

fn property(device_ref: IOHIDDeviceRef, key: &str) -> Option<CFType> {
    let key = CFString::new(key);
    // SAFETY: get rule; the property is retained by the wrapper.
    let value = unsafe { IOHIDDeviceGetProperty(device_ref, key.as_concrete_TypeRef()) };
    if value.is_null() {
        return None;
    }
    Some(unsafe { CFType::wrap_under_get_rule(value) })
}

fn int_property(device_ref: IOHIDDeviceRef, key: &str) -> Option<i64> {
    property(device_ref, key)?
        .downcast::<CFNumber>()?
        .to_i64()
}

fn string_property(device_ref: IOHIDDeviceRef, key: &str) -> Option<String> {
    Some(property(device_ref, key)?.downcast::<CFString>()?.to_string())
}

fn matching_dictionaries() -> CFArray<CFDictionary<CFType, CFType>> {
    let page_key = CFString::new(kIOHIDDeviceUsagePageKey);
    let usage_key = CFString::new(kIOHIDDeviceUsageKey);
    let dicts: Vec<CFDictionary<CFType, CFType>> = [
        kHIDUsage_GD_Joystick,
        kHIDUsage_GD_GamePad,
        kHIDUsage_GD_MultiAxisController,
    ]
    .iter()
    .map(|&usage| {
        CFDictionary::from_CFType_pairs(&[
            (
                page_key.as_CFType(),
                CFNumber::from(kHIDPage_GenericDesktop).as_CFType(),
            ),
            (usage_key.as_CFType(), CFNumber::from(usage).as_CFType()),
        ])
    })
    .collect();
    CFArray::from_CFTypes(&dicts)
}

/// Recover the shared state from a callback context.
///
/// # Safety
/// `context` must be the pointer registered in `init()`, and no reference into the shared state
/// may be alive (callbacks only run inside `pump()`).
unsafe fn shared<'a>(context: *mut c_void) -> &'a mut Shared {
    &mut *(context as *mut Shared)
}

extern "C" fn on_matched(context: *mut c_void, _: IOReturn, _: *mut c_void, device: IOHIDDeviceRef) {
    unsafe { shared(context) }.matched(device);
}

extern "C" fn on_removed(context: *mut c_void, _: IOReturn, _: *mut c_void, device: IOHIDDeviceRef) {
    unsafe { shared(context) }.removed(device);
}

extern "C" fn on_value(context: *mut c_void, _: IOReturn, _: *mut c_void, value: IOHIDValueRef) {
    unsafe { shared(context) }.value(value);
}

pub struct IoKitBackend {
    mode: CFString,
    manager: IOHIDManagerRef,
    shared: Box<UnsafeCell<Shared>>,
}

impl IoKitBackend {
    fn state(&self) -> &Shared {
        // SAFETY: callbacks only write during `pump()`, which takes `&mut self`.
        unsafe { &*self.shared.get() }
    }

    fn state_mut(&mut self) -> &mut Shared {
        self.shared.get_mut()
    }

    /// Run the private mode until it has no more sources to handle.
    fn pump(&mut self) {
        if self.manager.is_null() {
            return;
        }
        for _ in 0..MAX_PUMP_PASSES {
            // SAFETY: mode string outlives the call.
            let result = unsafe { CFRunLoopRunInMode(self.mode.as_concrete_TypeRef(), 0.0, 1) };
            if result != kCFRunLoopRunHandledSource {
                break;
            }
        }
    }

    fn drain(&mut self, events: Vec<QueuedEvent>, listener: &mut dyn GamepadListener) {
        let registry = &mut self.state_mut().registry;
        for event in events {
            if let Some(entry) = registry.dispatch(event, listener) {
                tracing::info!(id = entry.device.id, "[IOKIT/REMOVE] {}", entry.device);
            }
        }
    }
}

impl Backend for IoKitBackend {
    fn with_config(config: &Config) -> Self {
        Self {
            mode: CFString::new(&config.run_loop_mode),
            manager: std::ptr::null_mut(),
            shared: Box::new(UnsafeCell::new(Shared::default())),
        }
    }

    fn init(&mut self) -> Result<()> {
        if !self.manager.is_null() {
            return Ok(());
        }
        // SAFETY: plain create call; checked for null below.
        let manager = unsafe { IOHIDManagerCreate(kCFAllocatorDefault, kIOHIDOptionsTypeNone) };
        if manager.is_null() {
            return Err(Error::Backend("IOHIDManagerCreate returned null".into()));
        }
        let context = self.shared.get() as *mut c_void;
        let matching = matching_dictionaries();
        // SAFETY: `manager` is live; `context` stays valid until `shutdown()` closes the manager.
        unsafe {
            IOHIDManagerSetDeviceMatchingMultiple(manager, matching.as_concrete_TypeRef());
            IOHIDManagerRegisterDeviceMatchingCallback(manager, on_matched, context);
            IOHIDManagerRegisterDeviceRemovalCallback(manager, on_removed, context);
            IOHIDManagerRegisterInputValueCallback(manager, on_value, context);
            IOHIDManagerScheduleWithRunLoop(
                manager,
                CFRunLoop::get_current().as_concrete_TypeRef(),
                self.mode.as_concrete_TypeRef(),
            );
            let rc = IOHIDManagerOpen(manager, kIOHIDOptionsTypeNone);
            if rc != kIOReturnSuccess {
                tracing::warn!(rc, "[IOKIT/OPEN] IOHIDManagerOpen failed, devices may be missing");
            }
        }
        self.manager = manager;
        self.pump();
        Ok(())
    }

    fn shutdown(&mut self) {
        if !self.manager.is_null() {
            // SAFETY: the manager was created by `init()` and is released exactly once.
            unsafe {
                IOHIDManagerUnscheduleFromRunLoop(
                    self.manager,
                    CFRunLoop::get_current().as_concrete_TypeRef(),
                    self.mode.as_concrete_TypeRef(),
                );
                IOHIDManagerClose(self.manager, kIOHIDOptionsTypeNone);
                CFRelease(self.manager as *const c_void);
            }
            self.manager = std::ptr::null_mut();
        }
        let state = self.state_mut();
        state.registry.drain();
        state.device_events.clear();
        state.input_events.clear();
    }

    fn device_count(&self) -> usize {
        self.state().registry.len()
    }

    fn device_at(&self, index: usize) -> Option<&Device> {
        self.state().registry.device_at(index)
    }

    fn detect(&mut self, listener: &mut dyn GamepadListener) {
        self.pump();
        let batch = self.state_mut().device_events.take();
        self.drain(batch, listener);
    }

    fn process(&mut self, listener: &mut dyn GamepadListener) {
        self.pump();
        let batch = self.state_mut().input_events.take();
        // Devices matched during this pump have input before their attach was dispatched.
        let attaches = self.state_mut().device_events.take_attaches_for(&batch);
        self.drain(attaches, listener);
        self.drain(batch, listener);
    }
}

impl Drop for IoKitBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_roles() {
        assert_eq!(classify(kIOHIDElementTypeInput_Misc, 0x30), ElementRole::Axis);
        assert_eq!(classify(kIOHIDElementTypeInput_Axis, 0x31), ElementRole::Axis);
        assert_eq!(
            classify(kIOHIDElementTypeInput_Misc, kHIDUsage_GD_Hatswitch),
            ElementRole::Hat
        );
        assert_eq!(classify(kIOHIDElementTypeInput_Button, 1), ElementRole::Button);
        // Output and feature elements
        assert_eq!(classify(129, 0x30), ElementRole::Ignored);
        assert_eq!(classify(257, 0x30), ElementRole::Ignored);
    }

    #[test]
    fn uninitialized_backend_is_inert() {
        let mut b = IoKitBackend::with_config(&Config::default());
        struct Fail;
        impl GamepadListener for Fail {
            fn device_attached(&mut self, _: &Device) {
                panic!("no manager, no devices");
            }
        }
        b.detect(&mut Fail);
        b.process(&mut Fail);
        assert_eq!(b.device_count(), 0);
        b.shutdown();
    }
}
