//! Windows HID device wrapper.
//!
//! [`HidPad`] pairs a `hidapi::HidDevice` with its [`HidpParser`]. It is responsible for:
//! - opening the HID handle in non-blocking mode
//! - draining a bounded number of reports per `process()`
//! - falling back to explicit input-report requests for devices that refuse non-blocking reads
//!
//! This module does **not**:
//! - keep accumulated device state (the registry's `Device` does)
//! - decide which devices to open (see `hid_discovery.rs`)

use super::hidp_parser::HidpParser;
use crate::device::DeviceId;
use crate::queue::EventQueue;
use hidapi::{DeviceInfo, HidApi, HidDevice, HidError};

/// How reports are fetched from a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReadMode {
    /// Non-blocking reads from the driver's report buffer.
    Buffered,
    /// One `HidD_GetInputReport` request per `process()`.
    Polled,
}

/// Backend-private side of one generic HID device.
pub(crate) struct HidPad {
    pub path: String,
    raw: HidDevice,
    parser: HidpParser,
    buf: Vec<u8>,
    mode: ReadMode,
}

impl std::fmt::Debug for HidPad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidPad")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("parser", &self.parser)
            .finish()
    }
}

impl HidPad {
    /// Open `info` for reading. `None` if the OS handle cannot be opened.
    pub fn open(info: &DeviceInfo, api: &HidApi, parser: HidpParser) -> Option<Self> {
        let path = info.path().to_string_lossy().into_owned();
        let raw = match info.open_device(api) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "[HID/OPEN] cannot open device");
                return None;
            }
        };
        let mode = match raw.set_blocking_mode(false) {
            Ok(()) => ReadMode::Buffered,
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "[HID/OPEN] non-blocking mode refused, polling");
                ReadMode::Polled
            }
        };
        let buf = vec![0u8; parser.input_report_len().max(64)];

        tracing::debug!(
            "[HID/OPEN] vid=0x{:04x} pid=0x{:04x} serial={} product={} path={} usage_page=0x{:04x} usage=0x{:04x} mode={:?}",
            info.vendor_id(),
            info.product_id(),
            info.serial_number().unwrap_or(""),
            info.product_string().unwrap_or(""),
            path,
            info.usage_page(),
            info.usage(),
            mode,
        );

        Some(Self {
            path,
            raw,
            parser,
            buf,
            mode,
        })
    }

    pub fn button_count(&self) -> usize {
        self.parser.button_count()
    }

    pub fn axis_count(&self) -> usize {
        self.parser.axis_count()
    }

    /// Read what the device has and queue the resulting events.
    ///
    /// Buffered devices are drained up to `max_reports` reports. An error means the device is
    /// gone (or unusable, which is handled the same way).
    pub fn poll(
        &mut self,
        id: DeviceId,
        max_reports: usize,
        out: &mut EventQueue,
    ) -> Result<(), HidError> {
        match self.mode {
            ReadMode::Buffered => {
                for _ in 0..max_reports {
                    let n = self.raw.read(&mut self.buf)?;
                    if n == 0 {
                        break;
                    }
                    self.parser.parse_read(id, &self.buf[..n], out);
                }
            }
            ReadMode::Polled => {
                self.buf.fill(0);
                let n = self.raw.get_input_report(&mut self.buf)?;
                if n > 0 {
                    self.parser.parse_report(id, &self.buf[..n], out);
                }
            }
        }
        Ok(())
    }
}
