//! # Coordination gates.
//!
//! Three single-slot primitives serialize the orchestrator's concurrent
//! entry points (signal handler, autorestart ticker, unexpected-exit
//! handler):
//!
//! - **reload gate**: held for the duration of any reload, caller-initiated
//!   or triggered by an unexpected worker exit. A failed `try`-acquisition
//!   means "already reloading; skip".
//! - **spawn gate**: held for the duration of a single spawn attempt, so
//!   descriptors are duplicated and the inheritance environment composed for
//!   at most one child at a time. Shutdown acquires it to fence off new
//!   spawns before setting the shutdown flag.
//! - **restarter mailbox**: signals "a new generation came up healthy"; the
//!   autorestart ticker listens and resets its interval. Absent when
//!   autorestart is disabled, which turns notification into a no-op.
//!
//! ## Rules
//! - Gate permits release on drop; no explicit release calls.
//! - Acquisitions that may block are raced against the supervisor token by
//!   the callers.

use std::sync::Arc;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

/// The supervisor's mutual-exclusion primitives.
pub(crate) struct Gates {
    reload: Arc<Semaphore>,
    spawn: Arc<Semaphore>,
    restarter: Option<mpsc::Sender<()>>,
}

impl Gates {
    /// Creates the gates. With autorestart enabled the restarter mailbox
    /// receiver is returned for the ticker task; otherwise notification is
    /// a no-op.
    pub(crate) fn new(auto_restart: bool) -> (Self, Option<mpsc::Receiver<()>>) {
        let (restarter, rx) = if auto_restart {
            let (tx, rx) = mpsc::channel(1);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let gates = Self {
            reload: Arc::new(Semaphore::new(1)),
            spawn: Arc::new(Semaphore::new(1)),
            restarter,
        };
        (gates, rx)
    }

    /// Non-blocking reload acquisition. `None` means a reload is already in
    /// flight and the caller should skip.
    pub(crate) fn try_reload(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.reload).try_acquire_owned().ok()
    }

    /// Blocking spawn acquisition. `None` only if the semaphore is closed,
    /// which callers treat like shutdown.
    pub(crate) async fn acquire_spawn(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.spawn).acquire_owned().await.ok()
    }

    /// Notifies the autorestart ticker that a generation verified healthy.
    ///
    /// Never blocks: a full mailbox means a reset is already pending.
    pub(crate) fn notify_restarter(&self) {
        if let Some(tx) = &self.restarter {
            let _ = tx.try_send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reload_gate_is_single_slot() {
        let (gates, _rx) = Gates::new(false);

        let held = gates.try_reload().expect("fresh gate grants");
        assert!(gates.try_reload().is_none(), "second acquisition must skip");

        drop(held);
        assert!(gates.try_reload().is_some(), "released on drop");
    }

    #[tokio::test]
    async fn restarter_is_noop_when_disabled() {
        let (gates, rx) = Gates::new(false);
        assert!(rx.is_none());
        gates.notify_restarter();
    }

    #[tokio::test]
    async fn restarter_delivers_and_coalesces() {
        let (gates, rx) = Gates::new(true);
        let mut rx = rx.expect("mailbox exists with autorestart");

        gates.notify_restarter();
        gates.notify_restarter(); // coalesced: mailbox holds one slot
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
