//! Linux evdev backend.
//!
//! `detect()` scans the configured directory (`/dev/input` by default) for `event<N>` nodes,
//! opens the ones that look like game controllers and announces them right away. Each open
//! node is read by its own thread (see `reader.rs`); input and removals reach the consumer
//! through one [`SharedEventQueue`] drained by `process()`.
//!
//! ## Rescans
//! A node is only looked at again when its modification time is not older than the previous
//! scan, and paths held by a running reader are skipped. Device nodes are recreated on plug, so
//! new hardware passes the first test while the steady state costs one `stat()` per node.
//!
//! Two cases bypass the modification time, since nothing touches it when they resolve:
//! - a node that could not be opened (udev grants access after the node appears)
//! - a changed node whose path is still held by a reader that has not seen its old node go
//!
//! ## Removal
//! A reader that loses its node queues `DeviceRemoved` after everything it read before. The
//! device stays in the registry until `process()` dispatches that removal, so every earlier
//! event still resolves, and nothing for the id can follow it. Only then is the thread joined.

mod evdev;
mod reader;

use crate::backends::Backend;
use crate::config::Config;
use crate::device::Device;
use crate::error::Result;
use crate::event::{EventKind, QueuedEvent};
use crate::listener::GamepadListener;
use crate::metadata::DeviceMeta;
use crate::queue::SharedEventQueue;
use crate::registry::DeviceRegistry;
use reader::{Decoder, Reader};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Backend-private side of one open node.
#[derive(Debug)]
struct Node {
    path: PathBuf,
    reader: Option<Reader>,
}

#[derive(Debug)]
pub struct EvdevBackend {
    device_dir: PathBuf,
    registry: DeviceRegistry<Node>,
    queue: SharedEventQueue,
    last_scan: Option<SystemTime>,
    /// Paths looked at again on every scan until they open or disappear.
    retry: BTreeSet<PathBuf>,
    initialized: bool,
}

impl EvdevBackend {
    fn scan(&mut self, listener: &mut dyn GamepadListener) {
        let started = SystemTime::now();
        let entries = match std::fs::read_dir(&self.device_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %self.device_dir.display(), error = %e, "[EVDEV/SCAN] cannot list");
                self.last_scan = Some(started);
                return;
            }
        };

        let mut retry = BTreeSet::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_str().is_some_and(evdev::is_event_node) {
                continue;
            }
            let path = entry.path();
            if !self.retry.contains(&path) && !self.changed_since_last_scan(&path) {
                continue;
            }
            if self.is_open(&path) || !self.open(&path, listener) {
                retry.insert(path);
            }
        }
        self.retry = retry;
        self.last_scan = Some(started);
    }

    fn changed_since_last_scan(&self, path: &Path) -> bool {
        let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) else {
            return false;
        };
        self.last_scan.map_or(true, |last| modified >= last)
    }

    /// `true` while a live reader holds `path`. A reader that has ended releases the path even
    /// though its removal is still waiting for `process()`.
    fn is_open(&self, path: &Path) -> bool {
        self.registry.iter().any(|e| {
            e.private.path == path && e.private.reader.as_ref().is_some_and(|r| !r.is_finished())
        })
    }

    /// Open and announce `path`. Returns `false` when the node could not be opened and should
    /// be tried again on the next scan.
    fn open(&mut self, path: &Path, listener: &mut dyn GamepadListener) -> bool {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "[EVDEV/OPEN] cannot open, will retry");
                return false;
            }
        };
        let probe = match evdev::probe(&file, path) {
            Ok(Some(p)) => p,
            Ok(None) => return true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "[EVDEV/CAPS] capability query failed");
                return true;
            }
        };

        let device = Device::new(
            probe.name,
            probe.vendor_id,
            probe.product_id,
            probe.layout.len(),
            probe.map.button_count,
            DeviceMeta::with_path("evdev", path.display().to_string()),
        );
        tracing::debug!(
            path = %path.display(),
            axes = device.axis_count(),
            buttons = device.button_count(),
            "[EVDEV/OPEN] {device}"
        );

        let decoder = Decoder::new(probe.map, probe.layout);
        let id = self.registry.insert(
            device,
            Node {
                path: path.to_path_buf(),
                reader: None,
            },
        );
        match Reader::spawn(id, file, decoder, self.queue.clone()) {
            Ok(reader) => {
                if let Some(entry) = self.registry.get_mut(id) {
                    entry.private.reader = Some(reader);
                }
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "[EVDEV/OPEN] cannot start reader");
                self.registry.release(id);
                return false;
            }
        }

        if let Some(entry) = self.registry.get(id) {
            tracing::info!(id, "[EVDEV/ATTACH] {}", entry.device);
        }
        self.registry
            .dispatch(QueuedEvent::new(id, EventKind::DeviceAttached), listener);
        true
    }
}

impl Backend for EvdevBackend {
    fn with_config(config: &Config) -> Self {
        Self {
            device_dir: config.device_dir.clone(),
            registry: DeviceRegistry::new(),
            queue: SharedEventQueue::new(),
            last_scan: None,
            retry: BTreeSet::new(),
            initialized: false,
        }
    }

    fn init(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        // Dropping each entry cancels and joins its reader.
        let entries = self.registry.drain();
        if !entries.is_empty() {
            tracing::debug!(count = entries.len(), "[EVDEV/SHUTDOWN] closing devices");
        }
        drop(entries);
        self.queue.clear();
        self.last_scan = None;
        self.retry.clear();
        self.initialized = false;
    }

    fn device_count(&self) -> usize {
        self.registry.len()
    }

    fn device_at(&self, index: usize) -> Option<&Device> {
        self.registry.device_at(index)
    }

    fn detect(&mut self, listener: &mut dyn GamepadListener) {
        if self.initialized {
            self.scan(listener);
        }
    }

    fn process(&mut self, listener: &mut dyn GamepadListener) {
        if !self.initialized {
            return;
        }
        for event in self.queue.take() {
            if let Some(mut entry) = self.registry.dispatch(event, listener) {
                tracing::info!(id = entry.device.id, "[EVDEV/REMOVE] {}", entry.device);
                if let Some(mut reader) = entry.private.reader.take() {
                    reader.stop();
                }
            }
        }
    }
}

impl Drop for EvdevBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::Callbacks;

    fn backend_in(dir: &Path) -> EvdevBackend {
        let config = Config {
            device_dir: dir.to_path_buf(),
            ..Config::default()
        };
        EvdevBackend::with_config(&config)
    }

    #[test]
    fn missing_directory_is_empty() {
        let mut b = backend_in(Path::new("/nonexistent/padframe"));
        b.init().unwrap();
        struct Fail;
        impl GamepadListener for Fail {
            fn device_attached(&mut self, _: &Device) {
                panic!("nothing to attach");
            }
        }
        b.detect(&mut Fail);
        b.process(&mut Fail);
        assert_eq!(b.device_count(), 0);
        assert!(b.device_at(0).is_none());
        b.shutdown();
        b.shutdown();
    }

    #[test]
    fn regular_files_are_not_controllers() {
        let dir = std::env::temp_dir().join(format!("padframe-evdev-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("event0"), b"not a device").unwrap();
        std::fs::write(dir.join("mouse0"), b"").unwrap();

        let mut b = backend_in(&dir);
        b.init().unwrap();
        b.detect(&mut Callbacks::default());
        assert_eq!(b.device_count(), 0);
        assert!(b.last_scan.is_some());
        assert!(b.retry.is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unopenable_node_is_retried_until_it_goes() {
        let dir = std::env::temp_dir().join(format!("padframe-evdev-retry-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // open(2) on a socket fails with ENXIO, whatever the caller's privileges.
        let node = dir.join("event5");
        let socket = std::os::unix::net::UnixListener::bind(&node).unwrap();

        let mut b = backend_in(&dir);
        b.init().unwrap();
        b.detect(&mut Callbacks::default());
        assert!(b.retry.contains(&node));

        // Unchanged since the last scan, still looked at again.
        std::thread::sleep(std::time::Duration::from_millis(20));
        b.detect(&mut Callbacks::default());
        assert!(b.retry.contains(&node));
        assert_eq!(b.device_count(), 0);

        drop(socket);
        std::fs::remove_file(&node).unwrap();
        b.detect(&mut Callbacks::default());
        assert!(b.retry.is_empty());

        b.shutdown();
        assert!(b.retry.is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn ended_reader_releases_its_path_before_removal_dispatch() {
        let mut fds = [0; 2];
        // SAFETY: pipe2 fills both slots on success.
        assert_eq!(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) }, 0);
        // SAFETY: fresh descriptors from pipe2.
        let (read_end, write_end) = unsafe {
            use std::os::fd::FromRawFd;
            (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1]))
        };

        let mut b = backend_in(Path::new("/nonexistent/padframe"));
        b.init().unwrap();
        let path = PathBuf::from("/dev/input/event9");
        let device = Device::new("pad", 0, 0, 0, 0, DeviceMeta::default());
        let mut layout = crate::normalize::AxisLayout::new();
        let map = evdev::CodeMap::build(&evdev::Bitmap::with_bits(evdev::KEY_CNT), &[], &mut layout);
        let decoder = Decoder::new(map, layout);
        let id = b.registry.insert(
            device,
            Node {
                path: path.clone(),
                reader: None,
            },
        );
        let reader = Reader::spawn(id, read_end, decoder, b.queue.clone()).unwrap();
        b.registry.get_mut(id).unwrap().private.reader = Some(reader);
        assert!(b.is_open(&path));

        drop(write_end);
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while b.is_open(&path) && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(!b.is_open(&path));
        assert_eq!(b.device_count(), 1);

        b.process(&mut Callbacks::default());
        assert_eq!(b.device_count(), 0);
    }
}
