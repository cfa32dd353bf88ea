//! evdev node probing.
//!
//! Everything here talks to one `/dev/input/event*` node through the `EVIOC*` ioctls:
//! - capability bitmaps (`EVIOCGBIT`) and the admission rule for game controllers
//! - device name (`EVIOCGNAME`) and bus ids (`EVIOCGID`)
//! - absolute axis ranges (`EVIOCGABS`)
//!
//! The result is a [`Probe`]: the button and axis maps a reader thread needs to translate raw
//! `input_event`s into device-relative button and axis indices.
//!
//! This module does **not** read events or spawn threads; see `reader.rs`.

use crate::normalize::{AxisLayout, AxisRange};
use libc::{c_int, c_ulong, c_void};
use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

pub(crate) const EV_KEY: u16 = 0x01;
pub(crate) const EV_ABS: u16 = 0x03;
const EV_CNT: usize = 0x20;

const ABS_X: usize = 0x00;
const ABS_Y: usize = 0x01;
pub(crate) const ABS_CNT: usize = 0x40;

pub(crate) const BTN_MISC: usize = 0x100;
const BTN_1: usize = 0x101;
const BTN_TRIGGER: usize = 0x120;
const BTN_A: usize = 0x130;
pub(crate) const KEY_CNT: usize = 0x300;

const NAME_LEN: usize = 128;

// <asm-generic/ioctl.h>
const IOC_READ: c_ulong = 2;

const fn ioc_read(nr: usize, size: usize) -> c_ulong {
    (IOC_READ << 30) | ((size as c_ulong) << 16) | ((b'E' as c_ulong) << 8) | nr as c_ulong
}

const fn eviocgbit(ev: usize, len: usize) -> c_ulong {
    ioc_read(0x20 + ev, len)
}

const fn eviocgname(len: usize) -> c_ulong {
    ioc_read(0x06, len)
}

const EVIOCGID: c_ulong = ioc_read(0x02, std::mem::size_of::<libc::input_id>());

const fn eviocgabs(abs: usize) -> c_ulong {
    ioc_read(0x40 + abs, std::mem::size_of::<libc::input_absinfo>())
}

const WORD_BITS: usize = c_ulong::BITS as usize;

/// A kernel capability bitmap (`unsigned long[]`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Bitmap(Vec<c_ulong>);

impl Bitmap {
    pub fn with_bits(bits: usize) -> Self {
        Self(vec![0; bits.div_ceil(WORD_BITS)])
    }

    pub fn test(&self, bit: usize) -> bool {
        self.0
            .get(bit / WORD_BITS)
            .is_some_and(|word| (word >> (bit % WORD_BITS)) & 1 == 1)
    }

    #[cfg(test)]
    pub fn set(&mut self, bit: usize) {
        if let Some(word) = self.0.get_mut(bit / WORD_BITS) {
            *word |= 1 << (bit % WORD_BITS);
        }
    }

    fn byte_len(&self) -> usize {
        self.0.len() * std::mem::size_of::<c_ulong>()
    }

    fn as_mut_ptr(&mut self) -> *mut c_void {
        self.0.as_mut_ptr().cast()
    }
}

/// `EV_KEY` + `EV_ABS`, both of `ABS_X`/`ABS_Y`, and at least one joystick or gamepad button.
pub(crate) fn is_game_controller(ev: &Bitmap, keys: &Bitmap, abs: &Bitmap) -> bool {
    ev.test(EV_KEY as usize)
        && ev.test(EV_ABS as usize)
        && abs.test(ABS_X)
        && abs.test(ABS_Y)
        && (keys.test(BTN_TRIGGER) || keys.test(BTN_A) || keys.test(BTN_1))
}

/// `true` for `event<N>` node names.
pub(crate) fn is_event_node(name: &str) -> bool {
    name.strip_prefix("event")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Key code to button index for one node. ABS codes are the cookies of the node's
/// [`AxisLayout`], so axes resolve through [`AxisLayout::find`].
#[derive(Clone, Debug)]
pub(crate) struct CodeMap {
    /// Indexed by `code - BTN_MISC`.
    buttons: Vec<Option<u32>>,
    pub button_count: usize,
}

impl CodeMap {
    /// Number buttons from `BTN_MISC` upward and every ABS axis with a non-empty range.
    pub fn build(keys: &Bitmap, ranges: &[(usize, i64, i64)], layout: &mut AxisLayout) -> Self {
        let mut buttons = vec![None; KEY_CNT - BTN_MISC];
        let mut button_count = 0;
        for code in BTN_MISC..KEY_CNT {
            if keys.test(code) {
                buttons[code - BTN_MISC] = Some(button_count as u32);
                button_count += 1;
            }
        }

        for &(code, min, max) in ranges {
            if code >= ABS_CNT || min == max {
                continue;
            }
            layout.push_linear(code as u32, AxisRange::declared(min, max));
        }

        Self {
            buttons,
            button_count,
        }
    }

    pub fn button(&self, code: u16) -> Option<u32> {
        let code = code as usize;
        if code < BTN_MISC {
            return None;
        }
        self.buttons.get(code - BTN_MISC).copied().flatten()
    }
}

/// What a node looks like, once admitted.
#[derive(Debug)]
pub(crate) struct Probe {
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub map: CodeMap,
    pub layout: AxisLayout,
}

unsafe fn ioctl(fd: c_int, request: c_ulong, arg: *mut c_void) -> c_int {
    libc::ioctl(fd, request as _, arg)
}

fn read_bits(file: &File, ev: usize, bits: usize) -> io::Result<Bitmap> {
    let mut map = Bitmap::with_bits(bits);
    let req = eviocgbit(ev, map.byte_len());
    // SAFETY: the kernel writes at most `byte_len` bytes into the buffer.
    if unsafe { ioctl(file.as_raw_fd(), req, map.as_mut_ptr()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(map)
}

fn read_name(file: &File) -> Option<String> {
    let mut buf = [0u8; NAME_LEN];
    // SAFETY: the request encodes the buffer length.
    let n = unsafe { ioctl(file.as_raw_fd(), eviocgname(NAME_LEN), buf.as_mut_ptr().cast()) };
    if n <= 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    let name = String::from_utf8_lossy(&buf[..end]).trim().to_string();
    (!name.is_empty()).then_some(name)
}

fn read_ids(file: &File) -> (u16, u16) {
    // SAFETY: input_id is plain old data.
    let mut id: libc::input_id = unsafe { std::mem::zeroed() };
    let ok = unsafe {
        ioctl(
            file.as_raw_fd(),
            EVIOCGID,
            (&mut id as *mut libc::input_id).cast(),
        )
    } == 0;
    if ok {
        (id.vendor, id.product)
    } else {
        (0, 0)
    }
}

fn read_ranges(file: &File, abs: &Bitmap) -> Vec<(usize, i64, i64)> {
    let mut out = Vec::new();
    for code in (0..ABS_CNT).filter(|&c| abs.test(c)) {
        // SAFETY: input_absinfo is plain old data.
        let mut info: libc::input_absinfo = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            ioctl(
                file.as_raw_fd(),
                eviocgabs(code),
                (&mut info as *mut libc::input_absinfo).cast(),
            )
        };
        if rc < 0 {
            tracing::debug!(code, "[EVDEV/ABS] range query failed");
            continue;
        }
        out.push((code, i64::from(info.minimum), i64::from(info.maximum)));
    }
    out
}

/// Inspect an open node. `Ok(None)` means it is not a game controller.
pub(crate) fn probe(file: &File, path: &Path) -> io::Result<Option<Probe>> {
    let ev = read_bits(file, 0, EV_CNT)?;
    let keys = read_bits(file, EV_KEY as usize, KEY_CNT)?;
    let abs = read_bits(file, EV_ABS as usize, ABS_CNT)?;
    if !is_game_controller(&ev, &keys, &abs) {
        return Ok(None);
    }

    let name = read_name(file).unwrap_or_else(|| path.display().to_string());
    let (vendor_id, product_id) = read_ids(file);
    let ranges = read_ranges(file, &abs);
    let mut layout = AxisLayout::new();
    let map = CodeMap::build(&keys, &ranges, &mut layout);
    if layout.is_empty() {
        tracing::debug!(path = %path.display(), "[EVDEV/CAPS] every axis has an empty range");
        return Ok(None);
    }

    Ok(Some(Probe {
        name,
        vendor_id,
        product_id,
        map,
        layout,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gamepad_bits() -> (Bitmap, Bitmap, Bitmap) {
        let mut ev = Bitmap::with_bits(EV_CNT);
        ev.set(EV_KEY as usize);
        ev.set(EV_ABS as usize);
        let mut keys = Bitmap::with_bits(KEY_CNT);
        keys.set(BTN_A);
        keys.set(BTN_A + 1);
        let mut abs = Bitmap::with_bits(ABS_CNT);
        abs.set(ABS_X);
        abs.set(ABS_Y);
        (ev, keys, abs)
    }

    #[test]
    fn ioctl_numbers_match_kernel_headers() {
        // Values from <linux/input.h>.
        assert_eq!(eviocgname(256), 0x8100_4506);
        assert_eq!(EVIOCGID, 0x8008_4502);
        assert_eq!(eviocgabs(0), 0x8018_4540);
        assert_eq!(eviocgbit(EV_KEY as usize, 96), 0x8060_4521);
    }

    #[test]
    fn bitmap_spans_words() {
        let mut b = Bitmap::with_bits(KEY_CNT);
        b.set(0);
        b.set(WORD_BITS + 3);
        b.set(KEY_CNT - 1);
        assert!(b.test(0) && b.test(WORD_BITS + 3) && b.test(KEY_CNT - 1));
        assert!(!b.test(1));
        assert!(!b.test(KEY_CNT * 4));
    }

    #[test]
    fn admission() {
        let (ev, keys, abs) = gamepad_bits();
        assert!(is_game_controller(&ev, &keys, &abs));

        let mut no_y = Bitmap::with_bits(ABS_CNT);
        no_y.set(ABS_X);
        assert!(!is_game_controller(&ev, &keys, &no_y));

        // A keyboard: keys but no gamepad buttons.
        let mut kb = Bitmap::with_bits(KEY_CNT);
        kb.set(30);
        assert!(!is_game_controller(&ev, &kb, &abs));
    }

    #[test]
    fn event_node_names() {
        assert!(is_event_node("event0"));
        assert!(is_event_node("event17"));
        assert!(!is_event_node("event"));
        assert!(!is_event_node("event1a"));
        assert!(!is_event_node("js0"));
        assert!(!is_event_node("mouse0"));
    }

    #[test]
    fn code_map_skips_flat_axes() {
        let (_, keys, _) = gamepad_bits();
        let mut layout = AxisLayout::new();
        let map = CodeMap::build(&keys, &[(0, -32768, 32767), (2, 0, 0), (1, 0, 255)], &mut layout);

        assert_eq!(map.button_count, 2);
        assert_eq!(map.button(BTN_A as u16), Some(0));
        assert_eq!(map.button(BTN_A as u16 + 1), Some(1));
        assert_eq!(map.button(BTN_MISC as u16), None);
        assert_eq!(map.button(30), None);

        assert_eq!(layout.len(), 2);
        assert_eq!(layout.find(0), Some(0));
        assert_eq!(layout.find(2), None);
        assert_eq!(layout.find(1), Some(1));
        assert_eq!(layout.find(200), None);
    }
}
