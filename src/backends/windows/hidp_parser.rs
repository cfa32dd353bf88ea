//! Windows HIDP descriptor-driven parser.
//!
//! Builds a per-device map from the HID Parser (HIDP) capability tables and decodes input
//! reports with it:
//! - Buttons (bitfields) via `HidP_GetUsages`, reported as edges
//! - Axes (any bit width, signed or unsigned) via `HidP_GetUsageValue`, normalized through the
//!   device's [`AxisLayout`]
//! - Hat switches (Generic Desktop usage 0x39), two axis slots each, decoded relative to the
//!   declared logical minimum so that `0..7`, `1..8` and degree-based hats all work. Values
//!   outside the logical range (the null state) are centered.
//!
//! Only the controls a game controller is made of are mapped: Generic Desktop X through Wheel,
//! hat switches, and the Simulation Controls page. Everything else in the descriptor is ignored.
//!
//! The parser keeps its own OS handle and the `PreparsedData` for its whole lifetime.

use crate::device::DeviceId;
use crate::event::QueuedEvent;
use crate::normalize::{AxisLayout, AxisRange};
use crate::queue::EventQueue;
use core::mem::MaybeUninit;
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

use windows_sys::Win32::Devices::HumanInterfaceDevice::*;
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE, NTSTATUS,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};

const STATUS_SUCCESS: NTSTATUS = HIDP_STATUS_SUCCESS;
const STATUS_BUFFER_TOO_SMALL: NTSTATUS = HIDP_STATUS_BUFFER_TOO_SMALL;

const PAGE_GENERIC_DESKTOP: u16 = 0x01;
const PAGE_SIMULATION: u16 = 0x02;
const USAGE_HAT_SWITCH: u16 = 0x39;

/// What a value usage becomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ValueRole {
    Axis,
    Hat,
    Ignored,
}

pub(crate) fn value_role(usage_page: u16, usage: u16) -> ValueRole {
    match (usage_page, usage) {
        (PAGE_GENERIC_DESKTOP, USAGE_HAT_SWITCH) => ValueRole::Hat,
        (PAGE_GENERIC_DESKTOP, 0x30..=0x38) => ValueRole::Axis,
        (PAGE_SIMULATION, _) => ValueRole::Axis,
        _ => ValueRole::Ignored,
    }
}

/// Interpret the low `bits` of `raw` as two's complement.
pub(crate) fn sign_extend(raw: u32, bits: u16) -> i64 {
    if bits == 0 || bits >= 32 {
        return i64::from(raw as i32);
    }
    let shift = 32 - u32::from(bits);
    i64::from(((raw << shift) as i32) >> shift)
}

/// One button cap, expanded to its concrete usages.
#[derive(Clone, Debug)]
struct ButtonField {
    report_id: u8,
    usage_page: u16,
    link_collection: u16,
    /// Device button index of `usages[0]`; the rest follow consecutively.
    first_index: u32,
    usages: Vec<u16>,
}

/// One mapped axis or hat usage.
#[derive(Clone, Debug)]
struct ValueField {
    report_id: u8,
    usage_page: u16,
    usage: u16,
    link_collection: u16,
    bit_size: u16,
    signed: bool,
}

/// Descriptor-driven HIDP parser for one open device.
pub(crate) struct HidpParser {
    handle: HANDLE,
    ppd: PHIDP_PREPARSED_DATA,
    input_report_len: usize,
    /// Every cap uses report id 0, so reads arrive without an id byte.
    only_rid0: bool,
    buttons: Vec<ButtonField>,
    button_count: usize,
    pressed: Vec<bool>,
    values: Vec<ValueField>,
    layout: AxisLayout,
}

impl std::fmt::Debug for HidpParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidpParser")
            .field("input_report_len", &self.input_report_len)
            .field("only_rid0", &self.only_rid0)
            .field("buttons", &self.button_count)
            .field("axes", &self.layout.len())
            .finish()
    }
}

impl Drop for HidpParser {
    fn drop(&mut self) {
        // SAFETY: both were obtained in `open` and are released exactly once.
        unsafe {
            if self.ppd != 0 {
                HidD_FreePreparsedData(self.ppd);
                self.ppd = 0;
            }
            if !self.handle.is_null() {
                CloseHandle(self.handle);
                self.handle = std::ptr::null_mut();
            }
        }
    }
}

impl HidpParser {
    /// Open the interface at `path` and build its map.
    ///
    /// Returns `None` when the device cannot be opened, its preparsed data or caps cannot be
    /// read, or it exposes neither buttons nor mapped values.
    pub fn open(path: &str, vendor_id: u16, product_id: u16) -> Option<Self> {
        let handle = match open_device_handle(path) {
            Ok(h) => h,
            Err(code) => {
                tracing::debug!(path, code, "[HIDP/OPEN] CreateFileW failed");
                return None;
            }
        };

        let mut ppd: PHIDP_PREPARSED_DATA = 0;
        // SAFETY: `handle` is a valid HID handle; `ppd` receives the allocation.
        let ok = unsafe { HidD_GetPreparsedData(handle, &mut ppd) };
        if ok == 0 || ppd == 0 {
            // SAFETY: opened above, not shared.
            unsafe { CloseHandle(handle) };
            return None;
        }

        // From here on Drop releases both handles.
        let mut parser = Self {
            handle,
            ppd,
            input_report_len: 0,
            only_rid0: true,
            buttons: Vec::new(),
            button_count: 0,
            pressed: Vec::new(),
            values: Vec::new(),
            layout: AxisLayout::new(),
        };

        let mut caps = MaybeUninit::<HIDP_CAPS>::uninit();
        // SAFETY: `ppd` is valid; HidP_GetCaps fills `caps` on success.
        if unsafe { HidP_GetCaps(ppd, caps.as_mut_ptr()) } != STATUS_SUCCESS {
            return None;
        }
        // SAFETY: initialized by the successful call above.
        let caps = unsafe { caps.assume_init() };
        parser.input_report_len = usize::from(caps.InputReportByteLength);

        // A device may legitimately have only axes or only buttons.
        let btn_caps = enumerate_button_caps(ppd).unwrap_or_else(|| {
            tracing::debug!(
                "[HIDP/CAPS] GetButtonCaps failed; continuing without buttons (vid=0x{vendor_id:04x} pid=0x{product_id:04x})"
            );
            Vec::new()
        });
        let val_caps = enumerate_value_caps(ppd).unwrap_or_else(|| {
            tracing::debug!(
                "[HIDP/CAPS] GetValueCaps failed; continuing without axes (vid=0x{vendor_id:04x} pid=0x{product_id:04x})"
            );
            Vec::new()
        });

        parser.only_rid0 = btn_caps.iter().all(|c| c.ReportID == 0)
            && val_caps.iter().all(|c| c.ReportID == 0);

        parser.buttons = normalize_buttons(&btn_caps);
        parser.button_count = parser.buttons.iter().map(|b| b.usages.len()).sum();
        parser.pressed = vec![false; parser.button_count];
        parser.values = normalize_values(&val_caps, &mut parser.layout);

        // VKB T-Rudder only answers value queries on link collection 0.
        if vendor_id == 0x231d && product_id == 0x011f {
            for v in &mut parser.values {
                v.link_collection = 0;
            }
            tracing::debug!("[HIDP/QUIRK] forced LinkCollection=0 for VKB T-Rudder (231d:011f)");
        }

        if parser.button_count == 0 && parser.layout.is_empty() {
            tracing::debug!(path, "[HIDP/CAPS] no buttons or mapped values");
            return None;
        }

        tracing::debug!(
            buttons = parser.button_count,
            axes = parser.layout.len(),
            only_rid0 = parser.only_rid0,
            "[HIDP/MAP] vid=0x{vendor_id:04x} pid=0x{product_id:04x}"
        );
        Some(parser)
    }

    pub fn button_count(&self) -> usize {
        self.button_count
    }

    pub fn axis_count(&self) -> usize {
        self.layout.len()
    }

    /// Full report size including the id byte.
    pub fn input_report_len(&self) -> usize {
        self.input_report_len.max(1)
    }

    /// Decode bytes returned by a buffered read.
    ///
    /// Devices without numbered reports arrive without the id byte; it is put back here.
    pub fn parse_read(&mut self, id: DeviceId, data: &[u8], out: &mut EventQueue) {
        if self.only_rid0 {
            let mut report = Vec::with_capacity(data.len() + 1);
            report.push(0);
            report.extend_from_slice(data);
            self.parse_report(id, &report, out);
        } else {
            self.parse_report(id, data, out);
        }
    }

    /// Decode a report whose first byte is the report id.
    pub fn parse_report(&mut self, id: DeviceId, data: &[u8], out: &mut EventQueue) {
        let Some(&rid) = data.first() else {
            return;
        };
        let mut report = vec![0u8; self.input_report_len()];
        let n = data.len().min(report.len());
        report[..n].copy_from_slice(&data[..n]);
        let report_len = report.len() as u32;

        for field in &self.buttons {
            if field.report_id != rid {
                continue;
            }
            let mut usage_buf = [0u16; 128];
            let mut usage_len = usage_buf.len() as u32;
            // SAFETY: buffers are live for the call and their lengths are passed along.
            let status = unsafe {
                HidP_GetUsages(
                    HidP_Input,
                    field.usage_page,
                    field.link_collection,
                    usage_buf.as_mut_ptr(),
                    &mut usage_len,
                    self.ppd,
                    report.as_mut_ptr(),
                    report_len,
                )
            };
            if status != STATUS_SUCCESS {
                tracing::trace!(
                    "[HIDP] GetUsages failed: status=0x{:08x} rid={rid} up=0x{:02x}",
                    status as u32,
                    field.usage_page
                );
                continue;
            }
            let down = &usage_buf[..usage_len as usize];
            for (offset, usage) in field.usages.iter().enumerate() {
                let button = field.first_index + offset as u32;
                let now = down.contains(usage);
                if let Some(state) = self.pressed.get_mut(button as usize) {
                    if *state != now {
                        *state = now;
                        out.push(QueuedEvent::button(id, button, now));
                    }
                }
            }
        }

        // A field's index in `values` is its cookie in `layout`.
        for (index, field) in self.values.iter_mut().enumerate() {
            if field.report_id != rid {
                continue;
            }
            let mut value: u32 = 0;
            let mut get = |link_collection: u16, value: &mut u32| {
                // SAFETY: as above.
                unsafe {
                    HidP_GetUsageValue(
                        HidP_Input,
                        field.usage_page,
                        link_collection,
                        field.usage,
                        value,
                        self.ppd,
                        report.as_mut_ptr(),
                        report_len,
                    )
                }
            };
            let mut status = get(field.link_collection, &mut value);
            if status != STATUS_SUCCESS && field.link_collection != 0 {
                status = get(0, &mut value);
                if status == STATUS_SUCCESS {
                    tracing::debug!(
                        "[HIDP/QUIRK] rid={rid} up=0x{:02x} u=0x{:02x} forced LinkCollection=0 (runtime)",
                        field.usage_page,
                        field.usage
                    );
                    field.link_collection = 0;
                }
            }
            if status != STATUS_SUCCESS {
                continue;
            }

            let raw = if field.signed {
                sign_extend(value, field.bit_size)
            } else {
                i64::from(value)
            };
            let Some(slot) = self.layout.find(index as u32) else {
                continue;
            };
            for (axis, v, last) in self.layout.feed(slot, raw) {
                out.push(QueuedEvent::axis(id, axis, v, last));
            }
        }
    }
}

fn enumerate_button_caps(ppd: PHIDP_PREPARSED_DATA) -> Option<Vec<HIDP_BUTTON_CAPS>> {
    let mut len: u16 = 64;
    for _ in 0..2 {
        // SAFETY: HIDP_BUTTON_CAPS is plain old data.
        let mut caps: Vec<HIDP_BUTTON_CAPS> = vec![unsafe { core::mem::zeroed() }; len as usize];
        let mut needed = len;
        // SAFETY: `caps` holds `needed` entries.
        let status = unsafe { HidP_GetButtonCaps(HidP_Input, caps.as_mut_ptr(), &mut needed, ppd) };
        if status == STATUS_SUCCESS {
            caps.truncate(needed as usize);
            return Some(caps);
        }
        if status != STATUS_BUFFER_TOO_SMALL || needed == 0 {
            return None;
        }
        len = needed;
    }
    None
}

fn enumerate_value_caps(ppd: PHIDP_PREPARSED_DATA) -> Option<Vec<HIDP_VALUE_CAPS>> {
    let mut len: u16 = 64;
    for _ in 0..2 {
        // SAFETY: HIDP_VALUE_CAPS is plain old data.
        let mut caps: Vec<HIDP_VALUE_CAPS> = vec![unsafe { core::mem::zeroed() }; len as usize];
        let mut needed = len;
        // SAFETY: `caps` holds `needed` entries.
        let status = unsafe { HidP_GetValueCaps(HidP_Input, caps.as_mut_ptr(), &mut needed, ppd) };
        if status == STATUS_SUCCESS {
            caps.truncate(needed as usize);
            return Some(caps);
        }
        if status != STATUS_BUFFER_TOO_SMALL || needed == 0 {
            return None;
        }
        len = needed;
    }
    None
}

/// `(min, max)` of a cap's usages; a single usage for non-range caps.
fn usage_span(is_range: bool, range: (u16, u16), single: u16) -> (u16, u16) {
    if is_range {
        range
    } else {
        (single, single)
    }
}

fn normalize_buttons(caps: &[HIDP_BUTTON_CAPS]) -> Vec<ButtonField> {
    let mut out = Vec::new();
    let mut next: u32 = 0;
    for c in caps {
        // SAFETY: IsRange selects the active union member.
        let (lo, hi) = unsafe {
            usage_span(
                c.IsRange != 0,
                (c.Anonymous.Range.UsageMin, c.Anonymous.Range.UsageMax),
                c.Anonymous.NotRange.Usage,
            )
        };
        if lo > hi {
            continue;
        }
        let usages: Vec<u16> = (lo..=hi).collect();
        let count = usages.len() as u32;
        out.push(ButtonField {
            report_id: c.ReportID,
            usage_page: c.UsagePage,
            link_collection: c.LinkCollection,
            first_index: next,
            usages,
        });
        next += count;
    }
    out
}

fn normalize_values(caps: &[HIDP_VALUE_CAPS], layout: &mut AxisLayout) -> Vec<ValueField> {
    let mut out = Vec::new();
    for c in caps {
        // SAFETY: IsRange selects the active union member.
        let (lo, hi) = unsafe {
            usage_span(
                c.IsRange != 0,
                (c.Anonymous.Range.UsageMin, c.Anonymous.Range.UsageMax),
                c.Anonymous.NotRange.Usage,
            )
        };
        if lo > hi {
            continue;
        }
        let min = i64::from(c.LogicalMin);
        let max = i64::from(c.LogicalMax);
        for usage in lo..=hi {
            let role = value_role(c.UsagePage, usage);
            if role == ValueRole::Ignored {
                continue;
            }
            let cookie = out.len() as u32;
            match role {
                ValueRole::Hat => layout.push_hat(cookie, min, max),
                _ if max > min => layout.push_linear(cookie, AxisRange::declared(min, max)),
                // Nonsense declared range: learn it from the samples instead.
                _ => layout.push_linear(cookie, AxisRange::calibrating(0, 0)),
            }
            out.push(ValueField {
                report_id: c.ReportID,
                usage_page: c.UsagePage,
                usage,
                link_collection: c.LinkCollection,
                bit_size: c.BitSize,
                signed: min < 0,
            });
        }
    }
    out
}

/// Open a Windows file handle for a HID interface path, read-write if possible.
fn open_device_handle(path: &str) -> Result<HANDLE, u32> {
    use std::ptr::{null, null_mut};

    let wide: Vec<u16> = OsStr::new(path)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    let try_open = |access: u32| unsafe {
        CreateFileW(
            wide.as_ptr(),
            access,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            null(),
            OPEN_EXISTING,
            FILE_ATTRIBUTE_NORMAL,
            null_mut(),
        )
    };

    let mut handle = try_open(GENERIC_READ | GENERIC_WRITE);
    if handle == INVALID_HANDLE_VALUE {
        handle = try_open(GENERIC_READ);
    }
    if handle == INVALID_HANDLE_VALUE {
        // SAFETY: reads the calling thread's last-error value.
        Err(unsafe { GetLastError() })
    } else {
        Ok(handle)
    }
}
