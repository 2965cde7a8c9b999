//! # Shared supervisor state.
//!
//! Thread-safe container for the worker set, the generation counter, the
//! shutdown flag, and the listener vector, plus the status-file writer.
//!
//! ## Rules
//! - Workers are keyed by generation (unique and never reused).
//! - Membership changes and the status-file write happen under the same
//!   write lock, so the on-disk snapshot is always consistent with the
//!   in-memory set at a locking instant.
//! - Shutdown is monotonic: the flag is set once and only read afterwards.
//! - The listener vector is set once before the first spawn and only taken
//!   back at close.

use std::collections::HashMap;
use std::os::unix::io::{FromRawFd, OwnedFd, RawFd};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use crate::core::worker::Worker;
use crate::events::{Bus, Event, EventKind};
use crate::inherit::PortMapping;
use crate::net::Listener;

/// Mutable fields guarded by the supervisor lock.
struct Inner {
    workers: HashMap<u64, Arc<Worker>>,
    generation: u64,
    shutdown: bool,
}

/// The supervisor's shared bookkeeping.
pub(crate) struct SharedState {
    inner: RwLock<Inner>,
    listeners: Mutex<Vec<Listener>>,
    status_file: Option<PathBuf>,
    bus: Bus,
}

impl SharedState {
    pub(crate) fn new(status_file: Option<PathBuf>, bus: Bus) -> Self {
        Self {
            inner: RwLock::new(Inner {
                workers: HashMap::new(),
                generation: 0,
                shutdown: false,
            }),
            listeners: Mutex::new(Vec::new()),
            status_file,
            bus,
        }
    }

    // ---------------------------
    // Listeners
    // ---------------------------

    /// Installs the listener vector; called once after binding.
    pub(crate) fn set_listeners(&self, listeners: Vec<Listener>) {
        *self.listeners.lock().unwrap_or_else(|e| e.into_inner()) = listeners;
    }

    /// Bound textual addresses, in configuration order.
    pub(crate) fn listener_addrs(&self) -> Vec<String> {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(Listener::addr)
            .collect()
    }

    /// Takes the listeners back for close; dropping them closes the sockets
    /// and unlinks Unix paths.
    pub(crate) fn take_listeners(&self) -> Vec<Listener> {
        std::mem::take(&mut *self.listeners.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Duplicates each listener descriptor for one spawn.
    ///
    /// Returns the child-side mappings (fds 3..) and the parent-side
    /// duplicates, in configuration order. Duplicates are floored above the
    /// slot range so the in-child `dup2` loop cannot clobber a
    /// not-yet-installed source; `CLOEXEC` on them is cleared by `dup2`.
    pub(crate) fn dup_listeners(&self) -> std::io::Result<(Vec<PortMapping>, Vec<OwnedFd>)> {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let floor = 3 + listeners.len() as RawFd;

        let mut mappings = Vec::with_capacity(listeners.len());
        let mut dups = Vec::with_capacity(listeners.len());
        for (i, listener) in listeners.iter().enumerate() {
            let raw = unsafe {
                nix::libc::fcntl(listener.raw_fd(), nix::libc::F_DUPFD_CLOEXEC, floor)
            };
            if raw < 0 {
                return Err(std::io::Error::last_os_error());
            }
            dups.push(unsafe { OwnedFd::from_raw_fd(raw) });
            mappings.push(PortMapping {
                addr: listener.addr(),
                fd: 3 + i as RawFd,
            });
        }
        Ok((mappings, dups))
    }

    // ---------------------------
    // Generation and shutdown
    // ---------------------------

    /// Returns the next generation number; strictly increasing, never
    /// reused, consumed even when the subsequent spawn fails.
    pub(crate) fn next_generation(&self) -> u64 {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.generation += 1;
        inner.generation
    }

    pub(crate) fn set_shutdown(&self) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .shutdown = true;
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).shutdown
    }

    // ---------------------------
    // Worker set
    // ---------------------------

    /// Adds a worker and rewrites the status file under the same lock.
    pub(crate) fn add_worker(&self, worker: Arc<Worker>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.workers.insert(worker.generation(), worker);
        self.write_status_locked(&inner);
    }

    /// Removes a worker and rewrites the status file under the same lock.
    pub(crate) fn remove_worker(&self, generation: u64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.workers.remove(&generation);
        self.write_status_locked(&inner);
    }

    /// Snapshot of the worker set, ascending by pid.
    pub(crate) fn list_workers(&self) -> Vec<Arc<Worker>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut workers: Vec<Arc<Worker>> = inner.workers.values().cloned().collect();
        workers.sort_by_key(|w| w.pid());
        workers
    }

    // ---------------------------
    // Status file
    // ---------------------------

    /// Writes the status file: one `<generation>:<pid>` line per worker,
    /// ascending by generation, to a temporary `.{egid}` sibling, then an
    /// atomic rename. Failures are advisory.
    fn write_status_locked(&self, inner: &Inner) {
        let Some(path) = &self.status_file else {
            return;
        };

        let mut entries: Vec<(u64, i32)> = inner
            .workers
            .values()
            .map(|w| (w.generation(), w.pid()))
            .collect();
        entries.sort_by_key(|(generation, _)| *generation);
        let contents = render_status(&entries);

        let tmp = PathBuf::from(format!(
            "{}.{}",
            path.display(),
            nix::unistd::getegid().as_raw()
        ));
        if let Err(e) = std::fs::write(&tmp, contents) {
            self.bus.publish(
                Event::now(EventKind::StatusWriteFailed)
                    .with_path(tmp.display().to_string())
                    .with_error(e.to_string()),
            );
            return;
        }
        if let Err(e) = std::fs::rename(&tmp, path) {
            self.bus.publish(
                Event::now(EventKind::StatusWriteFailed)
                    .with_path(path.display().to_string())
                    .with_error(e.to_string()),
            );
        }
    }
}

/// Renders status-file contents from `(generation, pid)` entries.
fn render_status(entries: &[(u64, i32)]) -> String {
    let mut out = String::new();
    for (generation, pid) in entries {
        out.push_str(&format!("{generation}:{pid}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_status(path: PathBuf) -> SharedState {
        SharedState::new(Some(path), Bus::new(64))
    }

    #[test]
    fn renders_one_line_per_worker() {
        assert_eq!(render_status(&[]), "");
        assert_eq!(render_status(&[(1, 100)]), "1:100\n");
        assert_eq!(render_status(&[(1, 100), (2, 200)]), "1:100\n2:200\n");
    }

    #[test]
    fn generations_are_strictly_increasing() {
        let state = SharedState::new(None, Bus::new(64));
        assert_eq!(state.next_generation(), 1);
        assert_eq!(state.next_generation(), 2);
        assert_eq!(state.next_generation(), 3);
    }

    #[test]
    fn status_file_tracks_membership_sorted_by_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        let state = state_with_status(path.clone());

        // insert out of pid order to pin the generation sort
        state.add_worker(Worker::stub(900, 1));
        state.add_worker(Worker::stub(150, 2));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1:900\n2:150\n");

        state.remove_worker(1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2:150\n");

        state.remove_worker(2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn list_workers_sorts_by_pid() {
        let state = SharedState::new(None, Bus::new(64));
        state.add_worker(Worker::stub(300, 1));
        state.add_worker(Worker::stub(100, 2));
        state.add_worker(Worker::stub(200, 3));

        let pids: Vec<i32> = state.list_workers().iter().map(|w| w.pid()).collect();
        assert_eq!(pids, vec![100, 200, 300]);
    }

    #[test]
    fn shutdown_flag_is_monotonic() {
        let state = SharedState::new(None, Bus::new(64));
        assert!(!state.is_shutdown());
        state.set_shutdown();
        state.set_shutdown();
        assert!(state.is_shutdown());
    }
}
