//! # Supervisor events.
//!
//! [`EventKind`] classifies what the supervisor observes across four areas:
//! - **Spawn and boot**: worker starting, spawn failure, boot-watchdog failure
//! - **Reload and autorestart**: HUP handling, new-generation handover, the ticker
//! - **Worker death**: unexpected / old-generation / shutdown exits
//! - **Advisory I/O**: status-file writes, signal delivery, env-dir, socket files
//!
//! [`Event`] carries the metadata for each: pid, generation, exit status,
//! delays, signal names, paths.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, so events can be ordered correctly even when delivered
//! out-of-order through async channels.
//!
//! ## Example
//! ```
//! use genvisor::events::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::WorkerBootFailed)
//!     .with_pid(4242)
//!     .with_generation(3)
//!     .with_status("exit status: 1");
//!
//! assert_eq!(ev.kind, EventKind::WorkerBootFailed);
//! assert_eq!(ev.pid, Some(4242));
//! assert_eq!(ev.status.as_deref(), Some("exit status: 1"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor events.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Spawn and boot ===
    /// A new worker process has been started (boot window not yet passed).
    WorkerStarting,
    /// Executing the worker command failed; a retry is scheduled.
    SpawnFailed,
    /// The worker exited inside the boot window; a retry is scheduled.
    WorkerBootFailed,

    // === Reload and autorestart ===
    /// HUP received; a new worker is being spawned.
    ReloadRequested,
    /// The autorestart ticker fired and is requesting a reload.
    AutoRestartTriggered,
    /// A new generation survived the boot window; old workers are about to
    /// be drained. `pids` lists the victims, `signal` the relay signal.
    NewWorkerReady,
    /// Sleeping `delay` before signalling the old generation.
    KillOldDelay,
    /// The relay signal is being sent to the old generation.
    KillingOldWorkers,

    // === Worker death ===
    /// A healthy worker died outside any reload; a respawn is triggered.
    WorkerDiedUnexpectedly,
    /// A worker of an old generation died after being signalled.
    OldWorkerDied,
    /// A worker died during supervisor shutdown.
    WorkerStopped,

    // === Shutdown ===
    /// A termination signal was received; `signal` names it, `pids` the
    /// workers about to be relayed to.
    ShutdownRequested,
    /// The supervisor has finished closing.
    Exiting,

    // === Advisory I/O ===
    /// Sending a signal to a worker's process group failed.
    SignalFailed,
    /// Writing or renaming the status file failed.
    StatusWriteFailed,
    /// Reading the env-dir failed; the worker starts without its variables.
    EnvDirFailed,
    /// A stale socket file is being removed before bind.
    RemovingSocketFile,
    /// Removing a stale socket file failed.
    RemoveSocketFailed,
    /// Binding a configured address failed; boot fails.
    BindFailed,
}

/// Supervisor event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for display only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,

    /// Worker pid, if applicable.
    pub pid: Option<i32>,
    /// Worker generation, if applicable.
    pub generation: Option<u64>,
    /// Human-readable exit status (`exit status: N` or `signal: N`).
    pub status: Option<String>,
    /// Signal name (`SIGTERM`, ...), if applicable; for shutdown and reload
    /// events this is the *relay* signal sent to workers.
    pub signal: Option<&'static str>,
    /// The signal the supervisor itself received, if applicable.
    pub received: Option<&'static str>,
    /// Comma-separated pid list (`"none"` when empty), if applicable.
    pub pids: Option<String>,
    /// Sleep or drain delay, if applicable.
    pub delay: Option<Duration>,
    /// Autorestart firing count since the last reset.
    pub attempt: Option<u64>,
    /// Filesystem path, if applicable.
    pub path: Option<String>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind with the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pid: None,
            generation: None,
            status: None,
            signal: None,
            received: None,
            pids: None,
            delay: None,
            attempt: None,
            path: None,
            error: None,
        }
    }

    /// Attaches a worker pid.
    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a worker generation.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a human-readable exit status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Attaches a signal name.
    pub fn with_signal(mut self, signal: &'static str) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Attaches the signal the supervisor received.
    pub fn with_received(mut self, received: &'static str) -> Self {
        self.received = Some(received);
        self
    }

    /// Attaches a pid list.
    pub fn with_pids(mut self, pids: impl Into<String>) -> Self {
        self.pids = Some(pids.into());
        self
    }

    /// Attaches a delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attaches an attempt count.
    pub fn with_attempt(mut self, attempt: u64) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches a filesystem path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::now(EventKind::WorkerStarting);
        let b = Event::now(EventKind::WorkerStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_attach_metadata() {
        let ev = Event::now(EventKind::ShutdownRequested)
            .with_signal("SIGTERM")
            .with_pids("100,101");
        assert_eq!(ev.signal, Some("SIGTERM"));
        assert_eq!(ev.pids.as_deref(), Some("100,101"));
        assert!(ev.pid.is_none());
    }
}
