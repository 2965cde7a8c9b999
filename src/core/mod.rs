//! Supervisor core: orchestration and worker lifecycle.
//!
//! This module contains the embedded implementation of the supervisor. The
//! only public API re-exported from here is [`Supervisor`]. Everything else
//! is an internal building block that the supervisor wires together.
//!
//! ## Files & responsibilities
//! - **supervisor.rs**: public facade; owns the runtime (Bus, SharedState,
//!   Gates, TaskTracker), drives boot, spawn-and-verify, reload, the
//!   autorestart ticker, and shutdown.
//! - **worker.rs**: one child process: spawn with inherited descriptors,
//!   reaper task, watch task, signal delivery to the process group.
//! - **state.rs**: worker set + generation counter + shutdown flag +
//!   listener vector; writes the status file under the same lock.
//! - **gates.rs**: the three single-slot coordination primitives
//!   (reload, spawn, restarter mailbox).
//! - **signals.rs**: HUP/INT/TERM/QUIT subscription and dispatch.
//! - **pidfile.rs**: exclusive, locked pid file.
//! - **envdir.rs**: per-file environment variables for workers.
//!
//! ## Wiring (module-level flow)
//! ```text
//! Application code
//!   └─ builds Config, creates Supervisor, calls Supervisor::run()
//!
//! Supervisor::run()
//!   ├─ pid file ──► signal watcher ──► ticker (optional) ──► bind
//!   ├─ start_worker() ─► Worker::spawn ─► reaper task (per worker)
//!   │                    └─► watch() ───► watch task  (per worker)
//!   └─ wait on TaskTracker, then close()
//!
//!                      ┌────────────────── Bus (broadcast) ──────────────┐
//! Publishers:          │                                                 │
//!   orchestrator ────► │ WorkerStarting / SpawnFailed / WorkerBootFailed │
//!                      │ ReloadRequested / NewWorkerReady / KillOldDelay │
//!                      │ AutoRestartTriggered / ShutdownRequested / ...  │
//!   worker tasks ────► │ WorkerDiedUnexpectedly / OldWorkerDied /        │
//!                      │ WorkerStopped / SignalFailed                    │
//!   state / binder ──► │ StatusWriteFailed / RemovingSocketFile / ...    │
//!                      └──────────────┬──────────────────────────────────┘
//!                        fan-out listener ──► SubscriberSet ──► Subscribe
//!
//! watch task (per worker)
//! loop {
//!   select:
//!     command (signal, next_state) → deliver to process group; tag := next_state
//!     exit                         → branch on tag:
//!        Init     → try reload gate → granted: spawn-and-verify replacement
//!        Old      → OldWorkerDied
//!        Shutdown → WorkerStopped
//! }
//! ```
//!
//! ## Shutdown timeline
//! ```text
//! INT/TERM/QUIT → shutdown_by_signal: spawn gate + shutdown flag
//! → (relay, Shutdown) to every worker → close():
//!   cancel supervisor token → children killed and reaped
//!   → listeners dropped (Unix paths unlinked) → tracker drained
//!   → pid file removed
//! ```
//!
//! Internal modules:
//! - [`supervisor`] orchestrator; boot/reload/shutdown state machine
//! - [`worker`]     child handle, reaper and watch tasks
//! - [`state`]      shared bookkeeping and the status file
//! - [`gates`]      reload/spawn/restarter coordination
//! - [`signals`]    OS signal subscription
//! - [`pidfile`]    locked pid file
//! - [`envdir`]     env-dir loader

mod envdir;
mod gates;
mod pidfile;
mod signals;
mod state;
mod supervisor;
mod worker;

pub use supervisor::Supervisor;
