//! Hotplug notification through a hidden message-only window.
//!
//! The window registers for `WM_DEVICECHANGE` on the HID interface class. Its window procedure
//! only raises a process-wide flag; [`DeviceNotifier::take_changed`] pumps the window's
//! messages on the caller's thread and consumes the flag, so `detect()` can skip enumeration
//! entirely when nothing was plugged or unplugged.

use std::ffi::{c_void, OsStr};
use std::os::windows::ffi::OsStrExt;
use std::sync::atomic::{AtomicBool, Ordering};

use windows_sys::core::GUID;
use windows_sys::Win32::Devices::HumanInterfaceDevice::HidD_GetHidGuid;
use windows_sys::Win32::Foundation::{GetLastError, HWND, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, PeekMessageW,
    RegisterClassExW, RegisterDeviceNotificationW, TranslateMessage, UnregisterClassW,
    UnregisterDeviceNotification, MSG, WNDCLASSEXW,
};

const WM_DEVICECHANGE: u32 = 0x0219;
const DBT_DEVICEARRIVAL: usize = 0x8000;
const DBT_DEVICEREMOVECOMPLETE: usize = 0x8004;
const DBT_DEVTYP_DEVICEINTERFACE: u32 = 5;
const DEVICE_NOTIFY_WINDOW_HANDLE: u32 = 0;
const PM_REMOVE: u32 = 1;
const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;
const HWND_MESSAGE: HWND = -3isize as HWND;

/// `DEV_BROADCAST_DEVICEINTERFACE_W` header.
#[repr(C)]
struct DevBroadcastDeviceInterface {
    size: u32,
    device_type: u32,
    reserved: u32,
    class_guid: GUID,
    name: [u16; 1],
}

static DEVICES_CHANGED: AtomicBool = AtomicBool::new(false);

unsafe extern "system" fn wndproc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if msg == WM_DEVICECHANGE && matches!(wparam, DBT_DEVICEARRIVAL | DBT_DEVICEREMOVECOMPLETE) {
        DEVICES_CHANGED.store(true, Ordering::Release);
        tracing::trace!(event = wparam, "[NOTIFY] device change");
    }
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

fn wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

#[derive(Debug)]
pub(crate) struct DeviceNotifier {
    hwnd: HWND,
    hinstance: *mut c_void,
    notification: *mut c_void,
    class_name: Vec<u16>,
}

impl DeviceNotifier {
    /// Create the window and subscribe it. `None` when any step fails; the caller then
    /// rescans on every `detect()`.
    pub fn create() -> Option<Self> {
        let class_name = wide("padframe-device-notify");
        // SAFETY: a null module name returns the handle of the current executable.
        let hinstance = unsafe { GetModuleHandleW(std::ptr::null()) };

        // SAFETY: WNDCLASSEXW is plain old data; unset fields are null/zero.
        let mut class: WNDCLASSEXW = unsafe { std::mem::zeroed() };
        class.cbSize = std::mem::size_of::<WNDCLASSEXW>() as u32;
        class.lpfnWndProc = Some(wndproc);
        class.hInstance = hinstance;
        class.lpszClassName = class_name.as_ptr();
        // SAFETY: `class` and the name it points to outlive the call.
        if unsafe { RegisterClassExW(&class) } == 0 {
            // SAFETY: reads the calling thread's last-error value.
            let code = unsafe { GetLastError() };
            if code != ERROR_CLASS_ALREADY_EXISTS {
                tracing::warn!(code, "[NOTIFY] RegisterClassExW failed");
                return None;
            }
        }

        // SAFETY: the class was registered above; HWND_MESSAGE makes a message-only window.
        let hwnd = unsafe {
            CreateWindowExW(
                0,
                class_name.as_ptr(),
                class_name.as_ptr(),
                0,
                0,
                0,
                0,
                0,
                HWND_MESSAGE,
                std::ptr::null_mut(),
                hinstance,
                std::ptr::null(),
            )
        };
        if hwnd.is_null() {
            // SAFETY: as above.
            tracing::warn!(code = unsafe { GetLastError() }, "[NOTIFY] CreateWindowExW failed");
            // SAFETY: class registered by this call (or an earlier one) under this instance.
            unsafe { UnregisterClassW(class_name.as_ptr(), hinstance) };
            return None;
        }

        // SAFETY: the filter is plain old data and only read during the call.
        let mut filter: DevBroadcastDeviceInterface = unsafe { std::mem::zeroed() };
        filter.size = std::mem::size_of::<DevBroadcastDeviceInterface>() as u32;
        filter.device_type = DBT_DEVTYP_DEVICEINTERFACE;
        // SAFETY: writes the HID interface class GUID into `class_guid`.
        unsafe { HidD_GetHidGuid(&mut filter.class_guid) };
        // SAFETY: `hwnd` is ours; the filter outlives the call.
        let notification = unsafe {
            RegisterDeviceNotificationW(
                hwnd,
                (&filter as *const DevBroadcastDeviceInterface).cast(),
                DEVICE_NOTIFY_WINDOW_HANDLE,
            )
        };
        if notification.is_null() {
            // SAFETY: as above.
            tracing::warn!(code = unsafe { GetLastError() }, "[NOTIFY] RegisterDeviceNotificationW failed");
            // SAFETY: created above, not shared.
            unsafe {
                DestroyWindow(hwnd);
                UnregisterClassW(class_name.as_ptr(), hinstance);
            }
            return None;
        }

        tracing::debug!("[NOTIFY] listening for HID interface changes");
        Some(Self {
            hwnd,
            hinstance,
            notification,
            class_name,
        })
    }

    /// Pump pending window messages, then report and clear the change flag.
    pub fn take_changed(&mut self) -> bool {
        // SAFETY: MSG is plain old data.
        let mut msg: MSG = unsafe { std::mem::zeroed() };
        // SAFETY: `self.hwnd` is a live window owned by this thread.
        while unsafe { PeekMessageW(&mut msg, self.hwnd, 0, 0, PM_REMOVE) } != 0 {
            // SAFETY: `msg` was filled by PeekMessageW.
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        DEVICES_CHANGED.swap(false, Ordering::AcqRel)
    }
}

impl Drop for DeviceNotifier {
    fn drop(&mut self) {
        // SAFETY: all three were created in `create` and are released once.
        unsafe {
            UnregisterDeviceNotification(self.notification);
            DestroyWindow(self.hwnd);
            UnregisterClassW(self.class_name.as_ptr(), self.hinstance);
        }
    }
}
