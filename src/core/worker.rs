//! # Worker: one supervised child process.
//!
//! A [`Worker`] owns everything the supervisor knows about one child: pid,
//! generation, a cancellation token derived from the supervisor token, a
//! single-slot command channel for `(signal, next-state)` pairs, and an exit
//! watch resolved exactly once when the OS reap completes.
//!
//! Two background tasks drive it:
//!
//! - the **reaper** (started at spawn) waits for the child, resolves the
//!   exit watch, cancels the worker token, and removes the worker from the
//!   shared set. Supervisor cancellation makes it deliver the spawn
//!   library's kill (SIGKILL) first.
//! - the **watch** task (started once the worker verified healthy) consumes
//!   signal commands and the exit watch. On exit it branches on the current
//!   worker state:
//!
//! ```text
//! Init     → unexpected death: try the reload gate non-blockingly;
//!            granted  → spawn-and-verify a replacement
//!            occupied → a reload in flight is already producing one; skip
//! Old      → expected death of a drained generation; log only
//! Shutdown → expected death during supervisor shutdown; log only
//! ```
//!
//! ## Rules
//! - The state tag leaves `Init` at most once, driven by signal commands.
//! - Signals go to the child's *process group*; delivery failure is logged,
//!   never fatal.
//! - The worker leaves the shared set exactly when the exit watch resolves.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, Weak};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::supervisor::Core;
use crate::events::{Event, EventKind};

/// Lifecycle tag of a worker, driven by signal commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    /// Current generation; restarts itself on unexpected death.
    Init,
    /// Marked old by a reload; a newer generation is serving.
    Old,
    /// The supervisor is shutting down.
    Shutdown,
}

/// A signal to deliver plus the state the worker transitions to.
pub(crate) struct WorkerCommand {
    pub(crate) signal: Signal,
    pub(crate) next_state: WorkerState,
}

/// Handle to one child process.
pub(crate) struct Worker {
    pid: i32,
    generation: u64,
    token: CancellationToken,
    cmd_tx: mpsc::Sender<WorkerCommand>,
    cmd_rx: Mutex<Option<mpsc::Receiver<WorkerCommand>>>,
    exit_rx: watch::Receiver<Option<ExitStatus>>,
}

impl Worker {
    /// Starts the child from the prepared command and begins reaping.
    ///
    /// The returned worker is already in the shared set, so membership is
    /// observable before the spawn call returns.
    pub(crate) fn spawn(
        core: &Arc<Core>,
        generation: u64,
        cmd: &mut tokio::process::Command,
    ) -> std::io::Result<Arc<Worker>> {
        let child = cmd.spawn()?;
        let pid = child.id().map_or(-1, |p| p as i32);

        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (exit_tx, exit_rx) = watch::channel(None);
        let worker = Arc::new(Worker {
            pid,
            generation,
            token: core.token.child_token(),
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
            exit_rx,
        });

        core.state.add_worker(Arc::clone(&worker));
        core.tracker
            .spawn(Self::reap(Arc::downgrade(core), Arc::clone(&worker), child, exit_tx));
        Ok(worker)
    }

    pub(crate) fn pid(&self) -> i32 {
        self.pid
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Resolves when the reaper has observed the child's exit.
    pub(crate) async fn exited(&self) -> ExitStatus {
        let mut rx = self.exit_rx.clone();
        loop {
            if let Some(status) = *rx.borrow_and_update() {
                return status;
            }
            if rx.changed().await.is_err() {
                // reaper gone without resolving; report a clean exit
                return ExitStatus::from_raw(0);
            }
        }
    }

    /// Queues `signal` for delivery and the transition to `next_state`.
    ///
    /// Returns once the command is accepted or the worker is gone.
    pub(crate) async fn signal(&self, signal: Signal, next_state: WorkerState) {
        let cmd = WorkerCommand { signal, next_state };
        tokio::select! {
            _ = self.cmd_tx.send(cmd) => {}
            _ = self.token.cancelled() => {}
        }
    }

    /// Starts watching: after this, the worker restarts itself if it dies
    /// while still current. Called exactly once, after the boot watchdog.
    pub(crate) fn watch(self: Arc<Self>, core: &Arc<Core>) {
        let Some(cmd_rx) = self
            .cmd_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return;
        };
        let weak = Arc::downgrade(core);
        core.tracker.spawn(self.watch_loop(weak, cmd_rx));
    }

    async fn watch_loop(
        self: Arc<Self>,
        core: Weak<Core>,
        mut cmd_rx: mpsc::Receiver<WorkerCommand>,
    ) {
        let mut state = WorkerState::Init;
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    // the worker itself keeps a sender, so recv never closes
                    if let Some(cmd) = cmd {
                        state = cmd.next_state;
                        self.deliver(cmd.signal, &core);
                    }
                }
                status = self.exited() => {
                    self.on_exit(state, status, &core);
                    return;
                }
            }
        }
    }

    /// Sends a signal to the child's process group; best-effort.
    fn deliver(&self, signal: Signal, core: &Weak<Core>) {
        if kill(Pid::from_raw(-self.pid), signal).is_err() {
            if let Some(core) = core.upgrade() {
                core.bus.publish(
                    Event::now(EventKind::SignalFailed)
                        .with_signal(signal.as_str())
                        .with_pid(self.pid),
                );
            }
        }
    }

    fn on_exit(&self, state: WorkerState, status: ExitStatus, core: &Weak<Core>) {
        let Some(core) = core.upgrade() else {
            return;
        };
        let status = describe_exit(status);

        match state {
            WorkerState::Init => {
                core.bus.publish(
                    Event::now(EventKind::WorkerDiedUnexpectedly)
                        .with_pid(self.pid)
                        .with_generation(self.generation)
                        .with_status(status),
                );
                respawn(core);
            }
            WorkerState::Old => {
                core.bus.publish(
                    Event::now(EventKind::OldWorkerDied)
                        .with_pid(self.pid)
                        .with_generation(self.generation)
                        .with_status(status),
                );
            }
            WorkerState::Shutdown => {
                core.bus.publish(
                    Event::now(EventKind::WorkerStopped)
                        .with_pid(self.pid)
                        .with_generation(self.generation)
                        .with_status(status),
                );
            }
        }
    }

    /// Reaps the child and tears the handle down.
    async fn reap(
        core: Weak<Core>,
        worker: Arc<Worker>,
        mut child: Child,
        exit_tx: watch::Sender<Option<ExitStatus>>,
    ) {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = worker.token.cancelled() => {
                let _ = child.start_kill();
                child.wait().await
            }
        };
        let status = status.unwrap_or_else(|_| ExitStatus::from_raw(-1));

        let _ = exit_tx.send(Some(status));
        // unblocks pending signal() callers on a dead worker
        worker.token.cancel();
        if let Some(core) = core.upgrade() {
            core.state.remove_worker(worker.generation);
        }
    }

    #[cfg(test)]
    pub(crate) fn stub(pid: i32, generation: u64) -> Arc<Worker> {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (_exit_tx, exit_rx) = watch::channel(None);
        Arc::new(Worker {
            pid,
            generation,
            token: CancellationToken::new(),
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
            exit_rx,
        })
    }
}

/// Triggers the unexpected-exit respawn, unless a reload is already in
/// flight (that reload is itself producing the replacement).
fn respawn(core: Arc<Core>) {
    let tracker = core.tracker.clone();
    tracker.spawn(async move {
        let Some(_permit) = core.gates.try_reload() else {
            return;
        };
        if let Ok(worker) = Core::start_worker(&core).await {
            worker.watch(&core);
        }
    });
}

/// Human-readable exit status: `exit status: N` or `signal: N`.
pub(crate) fn describe_exit(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        format!("exit status: {code}")
    } else if let Some(sig) = status.signal() {
        format!("signal: {sig}")
    } else {
        status.to_string()
    }
}
