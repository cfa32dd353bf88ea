//! Per-device reader threads.
//!
//! Each admitted node gets one thread that blocks in `poll()` on the node and on a cancel pipe.
//! Input is translated by a [`Decoder`] and pushed onto the backend's [`SharedEventQueue`].
//! When the node stops delivering (unplugged, read error) the thread queues `DeviceRemoved`
//! and exits; the consumer joins it when that removal is dispatched.
//!
//! Shutdown closes the write end of the cancel pipe. The thread sees `POLLHUP` on the read end
//! and exits without queueing anything.

use super::evdev::{CodeMap, EV_ABS, EV_KEY};
use crate::device::DeviceId;
use crate::event::{EventKind, QueuedEvent};
use crate::normalize::AxisLayout;
use crate::queue::SharedEventQueue;
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::thread::JoinHandle;

/// Turns raw `input_event`s of one node into queued events.
#[derive(Debug)]
pub(crate) struct Decoder {
    map: CodeMap,
    layout: AxisLayout,
    buttons: Vec<bool>,
}

impl Decoder {
    pub fn new(map: CodeMap, layout: AxisLayout) -> Self {
        let buttons = vec![false; map.button_count];
        Self {
            map,
            layout,
            buttons,
        }
    }

    /// Events for one raw sample. Key repeats and unmapped codes produce nothing.
    pub fn decode(&mut self, id: DeviceId, kind: u16, code: u16, value: i32) -> Vec<QueuedEvent> {
        match kind {
            EV_KEY => {
                let Some(button) = self.map.button(code) else {
                    return Vec::new();
                };
                let down = value != 0;
                let Some(state) = self.buttons.get_mut(button as usize) else {
                    return Vec::new();
                };
                if *state == down {
                    return Vec::new();
                }
                *state = down;
                vec![QueuedEvent::button(id, button, down)]
            }
            EV_ABS => {
                let Some(slot) = self.layout.find(u32::from(code)) else {
                    return Vec::new();
                };
                self.layout
                    .feed(slot, i64::from(value))
                    .into_iter()
                    .map(|(axis, value, last)| QueuedEvent::axis(id, axis, value, last))
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Handle to a running reader thread. Dropping it cancels and joins the thread.
#[derive(Debug)]
pub(crate) struct Reader {
    cancel: Option<OwnedFd>,
    handle: Option<JoinHandle<()>>,
}

impl Reader {
    pub fn spawn(
        id: DeviceId,
        file: File,
        decoder: Decoder,
        queue: SharedEventQueue,
    ) -> io::Result<Self> {
        let (wake, cancel) = pipe()?;
        let handle = std::thread::Builder::new()
            .name(format!("padframe-evdev-{id}"))
            .spawn(move || run(id, file, wake, decoder, queue))?;
        Ok(Self {
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    /// `true` once the thread has returned, cancelled or not.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn stop(&mut self) {
        drop(self.cancel.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("[EVDEV/READER] reader thread panicked");
            }
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `(read end, write end)`, both close-on-exec.
fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0; 2];
    // SAFETY: pipe2 fills both slots on success.
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: the descriptors are fresh and owned by nobody else.
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

enum Wake {
    Input,
    Cancelled,
    Gone,
}

fn wait(file: &File, cancel: &OwnedFd) -> Wake {
    let mut fds = [
        libc::pollfd {
            fd: file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: cancel.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
    ];
    loop {
        // SAFETY: `fds` outlives the call and its length is passed along.
        let n = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if n < 0 {
            if io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Wake::Gone;
        }
        if fds[1].revents != 0 {
            return Wake::Cancelled;
        }
        if fds[0].revents & libc::POLLIN != 0 {
            return Wake::Input;
        }
        if fds[0].revents != 0 {
            return Wake::Gone;
        }
    }
}

fn read_event(file: &File) -> io::Result<Option<libc::input_event>> {
    // SAFETY: input_event is plain old data.
    let mut ev: libc::input_event = unsafe { std::mem::zeroed() };
    let size = std::mem::size_of::<libc::input_event>();
    // SAFETY: reading at most `size` bytes into `ev`.
    let n = unsafe {
        libc::read(
            file.as_raw_fd(),
            (&mut ev as *mut libc::input_event).cast(),
            size,
        )
    };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((n as usize == size).then_some(ev))
}

fn run(id: DeviceId, file: File, cancel: OwnedFd, mut decoder: Decoder, queue: SharedEventQueue) {
    loop {
        match wait(&file, &cancel) {
            Wake::Cancelled => return,
            Wake::Gone => break,
            Wake::Input => {}
        }
        match read_event(&file) {
            Ok(Some(ev)) => {
                for event in decoder.decode(id, ev.type_, ev.code, ev.value) {
                    queue.push(event);
                }
            }
            Ok(None) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!(id, error = %e, "[EVDEV/READ] read failed, treating as detach");
                break;
            }
        }
    }
    queue.push(QueuedEvent::new(id, EventKind::DeviceRemoved));
}

#[cfg(test)]
mod tests {
    use super::super::evdev::{Bitmap, BTN_MISC, KEY_CNT};
    use super::*;

    fn decoder() -> Decoder {
        let mut keys = Bitmap::with_bits(KEY_CNT);
        keys.set(0x130);
        keys.set(0x131);
        let mut layout = AxisLayout::new();
        let map = CodeMap::build(&keys, &[(0, 0, 255), (0x10, -1, 1)], &mut layout);
        Decoder::new(map, layout)
    }

    #[test]
    fn buttons_report_edges() {
        let mut d = decoder();
        let down = d.decode(4, EV_KEY, 0x131, 1);
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].device, 4);
        assert_eq!(down[0].kind, EventKind::ButtonDown { button: 1 });
        // autorepeat
        assert!(d.decode(4, EV_KEY, 0x131, 2).is_empty());
        assert_eq!(
            d.decode(4, EV_KEY, 0x131, 0)[0].kind,
            EventKind::ButtonUp { button: 1 }
        );
        assert!(d.decode(4, EV_KEY, BTN_MISC as u16 + 7, 1).is_empty());
    }

    #[test]
    fn axes_normalize_and_carry_last_value() {
        let mut d = decoder();
        let ev = d.decode(0, EV_ABS, 0, 255);
        assert_eq!(
            ev[0].kind,
            EventKind::AxisMoved {
                axis: 0,
                value: 1.0,
                last_value: 0.0
            }
        );
        let ev = d.decode(0, EV_ABS, 0, 0);
        assert_eq!(
            ev[0].kind,
            EventKind::AxisMoved {
                axis: 0,
                value: -1.0,
                last_value: 1.0
            }
        );
        // d-pad X reported as an absolute axis
        let ev = d.decode(0, EV_ABS, 0x10, -1);
        assert_eq!(
            ev[0].kind,
            EventKind::AxisMoved {
                axis: 1,
                value: -1.0,
                last_value: 0.0
            }
        );
        assert!(d.decode(0, EV_ABS, 0x11, 1).is_empty());
        assert!(d.decode(0, 0x00, 0, 0).is_empty());
    }

    #[test]
    fn cancelled_reader_queues_nothing() {
        let (read_end, write_end) = pipe().unwrap();
        let file = File::from(read_end);
        let queue = SharedEventQueue::new();
        let mut reader = Reader::spawn(9, file, decoder(), queue.clone()).unwrap();
        reader.stop();
        assert!(queue.take().is_empty());
        drop(write_end);
    }

    #[test]
    fn closed_source_queues_removal() {
        let (read_end, write_end) = pipe().unwrap();
        let queue = SharedEventQueue::new();
        let mut reader = Reader::spawn(3, File::from(read_end), decoder(), queue.clone()).unwrap();
        drop(write_end);
        // The thread sees EOF, queues the removal and exits; join waits for it.
        if let Some(h) = reader.handle.take() {
            h.join().unwrap();
        }
        let events = queue.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::DeviceRemoved);
    }

    #[test]
    fn reader_reports_finished_after_removal() {
        let (read_end, write_end) = pipe().unwrap();
        let queue = SharedEventQueue::new();
        let reader = Reader::spawn(4, File::from(read_end), decoder(), queue.clone()).unwrap();
        assert!(!reader.is_finished());
        drop(write_end);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !reader.is_finished() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(reader.is_finished());
        assert_eq!(queue.take()[0].kind, EventKind::DeviceRemoved);
    }
}
