//! Consumer side of device events.
//!
//! Everything a backend dispatches ends up in a [`GamepadListener`]. The frame state engine
//! implements it directly; hosts that prefer plain callbacks register closures on
//! [`Callbacks`], which implements the trait by forwarding to whatever is registered.

use crate::device::Device;

/// Receives dispatched device events, always on the thread that called `detect()`/`process()`.
///
/// All methods default to doing nothing.
#[allow(unused_variables)]
pub trait GamepadListener {
    fn device_attached(&mut self, device: &Device) {}

    fn device_removed(&mut self, device: &Device) {}

    fn button_down(&mut self, device: &Device, button: u32, timestamp: f64) {}

    fn button_up(&mut self, device: &Device, button: u32, timestamp: f64) {}

    fn axis_moved(
        &mut self,
        device: &Device,
        axis: u32,
        value: f32,
        last_value: f32,
        timestamp: f64,
    ) {
    }
}

/// Attach/remove callback.
pub type DeviceCallback = Box<dyn FnMut(&Device)>;
/// Button callback: `(device, button, timestamp)`.
pub type ButtonCallback = Box<dyn FnMut(&Device, u32, f64)>;
/// Axis callback: `(device, axis, value, last_value, timestamp)`.
pub type AxisCallback = Box<dyn FnMut(&Device, u32, f32, f32, f64)>;

/// One optional callback per event kind.
///
/// Registering replaces the previous callback of that kind; registering `None` clears it.
/// Any context the callback needs is captured by the closure.
#[derive(Default)]
pub struct Callbacks {
    attach: Option<DeviceCallback>,
    remove: Option<DeviceCallback>,
    button_down: Option<ButtonCallback>,
    button_up: Option<ButtonCallback>,
    axis_move: Option<AxisCallback>,
}

impl Callbacks {
    pub fn on_attach(&mut self, callback: Option<DeviceCallback>) {
        self.attach = callback;
    }

    pub fn on_remove(&mut self, callback: Option<DeviceCallback>) {
        self.remove = callback;
    }

    pub fn on_button_down(&mut self, callback: Option<ButtonCallback>) {
        self.button_down = callback;
    }

    pub fn on_button_up(&mut self, callback: Option<ButtonCallback>) {
        self.button_up = callback;
    }

    pub fn on_axis_move(&mut self, callback: Option<AxisCallback>) {
        self.axis_move = callback;
    }

    /// `true` when no callback of any kind is registered.
    pub fn is_empty(&self) -> bool {
        self.attach.is_none()
            && self.remove.is_none()
            && self.button_down.is_none()
            && self.button_up.is_none()
            && self.axis_move.is_none()
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("attach", &self.attach.is_some())
            .field("remove", &self.remove.is_some())
            .field("button_down", &self.button_down.is_some())
            .field("button_up", &self.button_up.is_some())
            .field("axis_move", &self.axis_move.is_some())
            .finish()
    }
}

impl GamepadListener for Callbacks {
    fn device_attached(&mut self, device: &Device) {
        if let Some(cb) = self.attach.as_mut() {
            cb(device);
        }
    }

    fn device_removed(&mut self, device: &Device) {
        if let Some(cb) = self.remove.as_mut() {
            cb(device);
        }
    }

    fn button_down(&mut self, device: &Device, button: u32, timestamp: f64) {
        if let Some(cb) = self.button_down.as_mut() {
            cb(device, button, timestamp);
        }
    }

    fn button_up(&mut self, device: &Device, button: u32, timestamp: f64) {
        if let Some(cb) = self.button_up.as_mut() {
            cb(device, button, timestamp);
        }
    }

    fn axis_moved(
        &mut self,
        device: &Device,
        axis: u32,
        value: f32,
        last_value: f32,
        timestamp: f64,
    ) {
        if let Some(cb) = self.axis_move.as_mut() {
            cb(device, axis, value, last_value, timestamp);
        }
    }
}

/// Forwards every event to two listeners, first then second.
pub struct Fanout<'a> {
    pub first: &'a mut dyn GamepadListener,
    pub second: &'a mut dyn GamepadListener,
}

impl GamepadListener for Fanout<'_> {
    fn device_attached(&mut self, device: &Device) {
        self.first.device_attached(device);
        self.second.device_attached(device);
    }

    fn device_removed(&mut self, device: &Device) {
        self.first.device_removed(device);
        self.second.device_removed(device);
    }

    fn button_down(&mut self, device: &Device, button: u32, timestamp: f64) {
        self.first.button_down(device, button, timestamp);
        self.second.button_down(device, button, timestamp);
    }

    fn button_up(&mut self, device: &Device, button: u32, timestamp: f64) {
        self.first.button_up(device, button, timestamp);
        self.second.button_up(device, button, timestamp);
    }

    fn axis_moved(
        &mut self,
        device: &Device,
        axis: u32,
        value: f32,
        last_value: f32,
        timestamp: f64,
    ) {
        self.first
            .axis_moved(device, axis, value, last_value, timestamp);
        self.second
            .axis_moved(device, axis, value, last_value, timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DeviceMeta;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn pad() -> Device {
        Device::new("Pad", 0, 0, 2, 2, DeviceMeta::default())
    }

    #[test]
    fn last_registration_wins_and_none_clears() {
        let hits = Rc::new(RefCell::new(Vec::new()));
        let mut cbs = Callbacks::default();

        let h = hits.clone();
        cbs.on_button_down(Some(Box::new(move |_: &Device, b: u32, _: f64| {
            h.borrow_mut().push(("first", b))
        })));
        let h = hits.clone();
        cbs.on_button_down(Some(Box::new(move |_: &Device, b: u32, _: f64| {
            h.borrow_mut().push(("second", b))
        })));

        let dev = pad();
        cbs.button_down(&dev, 1, 0.0);
        cbs.on_button_down(None);
        cbs.button_down(&dev, 2, 0.0);

        assert_eq!(*hits.borrow(), vec![("second", 1)]);
        assert!(cbs.is_empty());
    }

    #[test]
    fn fanout_reaches_both() {
        #[derive(Default)]
        struct Count(usize);
        impl GamepadListener for Count {
            fn device_attached(&mut self, _: &Device) {
                self.0 += 1;
            }
        }

        let (mut a, mut b) = (Count::default(), Count::default());
        let mut fan = Fanout {
            first: &mut a,
            second: &mut b,
        };
        fan.device_attached(&pad());
        assert_eq!((a.0, b.0), (1, 1));
    }
}
