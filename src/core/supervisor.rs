//! # Supervisor: orchestrates worker generations and graceful handover.
//!
//! The [`Supervisor`] owns the runtime components (event bus, subscriber
//! fan-out, shared state, coordination gates) and drives the worker
//! lifecycle from boot through reloads to shutdown.
//!
//! - Bind the inheritable listeners once, before the first spawn
//! - Spawn-and-verify each generation behind the boot watchdog
//! - Reload on HUP, on the autorestart ticker, or programmatically
//! - Respawn unexpectedly dead workers at the configured interval
//! - Shut down gracefully on INT/TERM/QUIT or programmatically
//!
//! ## Boot sequence
//! ```text
//! run()
//!   ├─► open + lock pid file
//!   ├─► spawn subscriber fan-out listener
//!   ├─► hold the reload gate (blocks reload during boot)
//!   ├─► spawn signal watcher; spawn autorestart ticker (if enabled)
//!   ├─► bind all listeners (fail-fast)
//!   ├─► spawn-and-verify generation 1 ──► watch()
//!   ├─► release the reload gate
//!   └─► wait for all worker tasks, then close()
//! ```
//!
//! ## Reload
//! ```text
//! reload()
//!   ├─► try the reload gate; occupied → drop the request silently
//!   ├─► spawn-and-verify the new generation
//!   ├─► victims = worker set minus the new worker
//!   ├─► kill-old-delay > 0:
//!   │     sleep(delay) raced against the new worker's exit
//!   │       died → loop back to spawn-and-verify (victims untouched)
//!   ├─► watch() the new worker
//!   └─► send (hup-relay, Old) to every victim
//! ```
//!
//! ## Rules
//! - At most one spawn attempt and one reload run at any instant (gates).
//! - Shutdown is monotonic; spawn-and-verify surfaces it as the
//!   [`ShuttingDown`](crate::SupervisorError::ShuttingDown) sentinel, which
//!   every caller treats as graceful termination.
//! - `close()` runs exactly once; concurrent callers wait for the first.
//! - Every blocking wait is raced against the supervisor token.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::core::envdir;
use crate::core::gates::Gates;
use crate::core::pidfile::PidFile;
use crate::core::signals;
use crate::core::state::SharedState;
use crate::core::worker::{describe_exit, Worker, WorkerState};
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::inherit::{format_port_mappings, GENERATION_ENV_NAME, PORT_ENV_NAME};
use crate::net;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Why a single spawn attempt failed; internal to spawn-and-verify.
enum SpawnAttemptError {
    /// The shutdown flag (or supervisor cancellation) was observed.
    ShuttingDown,
    /// Executing the command failed; retried at interval.
    Exec(std::io::Error),
}

/// Orchestrates worker generations, socket handover, and shutdown.
pub struct Supervisor {
    core: Arc<Core>,
}

/// Shared internals; workers and background tasks hold weak references.
pub(crate) struct Core {
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) state: SharedState,
    pub(crate) gates: Gates,
    /// Supervisor context; every worker token is a child of it.
    pub(crate) token: CancellationToken,
    /// Tracks reaper, watch, and respawn tasks (the wait group).
    pub(crate) tracker: TaskTracker,
    subs: Arc<SubscriberSet>,
    restarter_rx: Mutex<Option<mpsc::Receiver<()>>>,
    pid_file: Mutex<Option<PidFile>>,
    close_once: tokio::sync::Mutex<bool>,
}

impl Supervisor {
    /// Creates a supervisor with the given config and subscribers (maybe
    /// empty).
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        let subs = Arc::new(SubscriberSet::new(subscribers));
        let (gates, restarter_rx) = Gates::new(cfg.enable_auto_restart);
        let state = SharedState::new(cfg.status_file.clone(), bus.clone());

        Self {
            core: Arc::new(Core {
                cfg,
                bus,
                state,
                gates,
                token: CancellationToken::new(),
                tracker: TaskTracker::new(),
                subs,
                restarter_rx: Mutex::new(restarter_rx),
                pid_file: Mutex::new(None),
                close_once: tokio::sync::Mutex::new(false),
            }),
        }
    }

    /// Runs the supervisor until shutdown.
    ///
    /// Returns `Ok(())` on graceful termination (signal-initiated or
    /// programmatic), an error on configuration or boot failure.
    pub async fn run(&self) -> Result<(), SupervisorError> {
        let result = Core::run_inner(&self.core).await;
        self.core.close().await;
        result
    }

    /// Requests a generational reload.
    ///
    /// Silently dropped when another reload is in flight. This is the same
    /// path a received HUP takes.
    pub async fn reload(&self) -> Result<(), SupervisorError> {
        Core::reload(&self.core).await
    }

    /// Gracefully terminates all workers, waiting for each exit under the
    /// caller's token, then closes the supervisor.
    ///
    /// On caller cancellation the remaining workers are cancelled anyway
    /// and [`SupervisorError::DrainInterrupted`] is returned.
    pub async fn shutdown(&self, ctx: &CancellationToken) -> Result<(), SupervisorError> {
        Core::shutdown(&self.core, ctx).await
    }

    /// Textual addresses actually bound, in configuration order.
    ///
    /// Empty before the listeners are bound during [`run`](Self::run).
    pub fn listener_addrs(&self) -> Vec<String> {
        self.core.state.listener_addrs()
    }
}

impl Core {
    async fn run_inner(core: &Arc<Core>) -> Result<(), SupervisorError> {
        if core.cfg.command.is_empty() {
            return Err(SupervisorError::CommandRequired);
        }

        if let Some(path) = &core.cfg.pid_file {
            let pid_file = PidFile::create(path)?;
            *core.pid_file.lock().unwrap_or_else(|e| e.into_inner()) = Some(pid_file);
        }

        core.spawn_fanout_listener();

        // block reload during boot; the gate is fresh, so this grants
        let reload_guard = core.gates.try_reload();

        let streams = signals::install()?;
        tokio::spawn(signals::watch(Arc::clone(core), streams));

        if core.cfg.enable_auto_restart {
            let rx = core
                .restarter_rx
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            if let Some(rx) = rx {
                tokio::spawn(auto_restarter(Arc::clone(core), rx));
            }
        }

        let listeners = net::bind_all(&core.cfg, &core.bus).await?;
        core.state.set_listeners(listeners);

        match Core::start_worker(core).await {
            Ok(worker) => worker.watch(core),
            Err(e) if e.is_shutdown() => return Ok(()),
            Err(e) => return Err(e),
        }

        // enable reload
        drop(reload_guard);

        core.tracker.close();
        core.tracker.wait().await;
        Ok(())
    }

    /// Forwards every bus event to the subscriber set. The task ends when
    /// the bus closes, i.e. when the supervisor is dropped.
    fn spawn_fanout_listener(&self) {
        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => subs.emit_arc(Arc::new(ev)),
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        });
    }

    // ---------------------------
    // Spawn-and-verify
    // ---------------------------

    /// Starts a new generation and verifies it survives the boot window.
    ///
    /// Retries indefinitely at the configured interval; only the shutdown
    /// sentinel escapes. On success the worker has already notified the
    /// autorestart mailbox but is **not** watched yet.
    pub(crate) async fn start_worker(core: &Arc<Core>) -> Result<Arc<Worker>, SupervisorError> {
        loop {
            let worker = match Core::try_start_worker(core).await {
                Ok(worker) => worker,
                Err(SpawnAttemptError::ShuttingDown) => return Err(SupervisorError::ShuttingDown),
                Err(SpawnAttemptError::Exec(e)) => {
                    core.bus.publish(Event::now(EventKind::SpawnFailed).with_error(format!(
                        "failed to exec {}: {}",
                        core.cfg.command, e
                    )));
                    core.sleep_interval().await;
                    continue;
                }
            };

            core.bus.publish(
                Event::now(EventKind::WorkerStarting)
                    .with_pid(worker.pid())
                    .with_generation(worker.generation()),
            );

            // boot watchdog: exit before the interval means a failed boot
            tokio::select! {
                status = worker.exited() => {
                    if core.state.is_shutdown() {
                        return Err(SupervisorError::ShuttingDown);
                    }
                    core.bus.publish(
                        Event::now(EventKind::WorkerBootFailed)
                            .with_pid(worker.pid())
                            .with_generation(worker.generation())
                            .with_status(describe_exit(status)),
                    );
                    core.sleep_interval().await;
                    continue;
                }
                _ = tokio::time::sleep(core.cfg.interval()) => {}
            }

            core.gates.notify_restarter();
            return Ok(worker);
        }
    }

    /// One spawn attempt under the spawn gate: duplicate the listener
    /// descriptors, compose the inheritance environment, start the child.
    async fn try_start_worker(core: &Arc<Core>) -> Result<Arc<Worker>, SpawnAttemptError> {
        if core.state.is_shutdown() {
            return Err(SpawnAttemptError::ShuttingDown);
        }
        let _gate = tokio::select! {
            permit = core.gates.acquire_spawn() => {
                permit.ok_or(SpawnAttemptError::ShuttingDown)?
            }
            _ = core.token.cancelled() => return Err(SpawnAttemptError::ShuttingDown),
        };
        // shutdown sets the flag while holding the gate; re-check under it
        if core.state.is_shutdown() {
            return Err(SpawnAttemptError::ShuttingDown);
        }

        let (mappings, dups) = core
            .state
            .dup_listeners()
            .map_err(SpawnAttemptError::Exec)?;
        let generation = core.state.next_generation();

        let mut cmd = tokio::process::Command::new(&core.cfg.command);
        cmd.args(&core.cfg.args);
        if let Some(dir) = &core.cfg.dir {
            cmd.current_dir(dir);
        }
        cmd.env(PORT_ENV_NAME, format_port_mappings(&mappings));
        cmd.env(GENERATION_ENV_NAME, generation.to_string());
        if let Some(env_dir) = &core.cfg.env_dir {
            match envdir::load(env_dir) {
                Ok(vars) => {
                    for (name, value) in vars {
                        cmd.env(name, value);
                    }
                }
                Err(e) => {
                    core.bus.publish(
                        Event::now(EventKind::EnvDirFailed)
                            .with_path(env_dir.display().to_string())
                            .with_error(e.to_string()),
                    );
                }
            }
        }
        // own process group, so relay signals reach the whole worker tree
        cmd.process_group(0);
        unsafe {
            cmd.pre_exec(move || {
                use std::os::unix::io::AsRawFd;
                for (i, fd) in dups.iter().enumerate() {
                    if nix::libc::dup2(fd.as_raw_fd(), 3 + i as i32) < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }

        // the command (and with it the parent-side duplicates held by the
        // pre_exec closure) drops once the child has started
        Worker::spawn(core, generation, &mut cmd).map_err(SpawnAttemptError::Exec)
    }

    async fn sleep_interval(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.cfg.interval()) => {}
            _ = self.token.cancelled() => {}
        }
    }

    // ---------------------------
    // Reload
    // ---------------------------

    /// Spawns a new generation and drains the old one.
    ///
    /// Returns silently when a reload is already in flight.
    pub(crate) async fn reload(core: &Arc<Core>) -> Result<(), SupervisorError> {
        let Some(_permit) = core.gates.try_reload() else {
            return Ok(());
        };

        loop {
            let worker = match Core::start_worker(core).await {
                Ok(worker) => worker,
                Err(e) if e.is_shutdown() => return Ok(()),
                Err(e) => return Err(e),
            };

            let victims: Vec<Arc<Worker>> = core
                .state
                .list_workers()
                .into_iter()
                .filter(|w| w.generation() != worker.generation())
                .collect();

            core.bus.publish(
                Event::now(EventKind::NewWorkerReady)
                    .with_pid(worker.pid())
                    .with_generation(worker.generation())
                    .with_signal(core.cfg.signal_on_hup.as_str())
                    .with_pids(format_pids(&victims)),
            );

            let delay = core.cfg.kill_old_delay();
            if delay > Duration::ZERO {
                core.bus
                    .publish(Event::now(EventKind::KillOldDelay).with_delay(delay));
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    status = worker.exited() => {
                        if core.state.is_shutdown() {
                            return Ok(());
                        }
                        // the new worker died during the drain window;
                        // the victims stay untouched and we start over
                        core.bus.publish(
                            Event::now(EventKind::WorkerDiedUnexpectedly)
                                .with_pid(worker.pid())
                                .with_generation(worker.generation())
                                .with_status(describe_exit(status)),
                        );
                        continue;
                    }
                }
            }

            worker.watch(core);

            core.bus.publish(Event::now(EventKind::KillingOldWorkers));
            for victim in &victims {
                victim
                    .signal(core.cfg.signal_on_hup, WorkerState::Old)
                    .await;
            }
            return Ok(());
        }
    }

    // ---------------------------
    // Shutdown
    // ---------------------------

    /// Signal-initiated shutdown; idempotent.
    pub(crate) async fn shutdown_by_signal(core: &Arc<Core>, received: Signal) {
        let mut _gate = None;
        if !core.state.is_shutdown() {
            let permit = tokio::select! {
                permit = core.gates.acquire_spawn() => permit,
                _ = core.token.cancelled() => return,
            };
            core.state.set_shutdown();
            _gate = permit;
        }

        let relay = if received == Signal::SIGTERM {
            core.cfg.signal_on_term
        } else {
            Signal::SIGTERM
        };

        let workers = core.state.list_workers();
        core.bus.publish(
            Event::now(EventKind::ShutdownRequested)
                .with_received(received.as_str())
                .with_signal(relay.as_str())
                .with_pids(format_pids(&workers)),
        );
        for worker in &workers {
            worker.signal(relay, WorkerState::Shutdown).await;
        }

        core.close().await;
        core.bus.publish(Event::now(EventKind::Exiting));
    }

    /// Programmatic shutdown: signal, drain under `ctx`, close.
    pub(crate) async fn shutdown(
        core: &Arc<Core>,
        ctx: &CancellationToken,
    ) -> Result<(), SupervisorError> {
        let mut _gate = None;
        if !core.state.is_shutdown() {
            let permit = tokio::select! {
                permit = core.gates.acquire_spawn() => permit,
                _ = ctx.cancelled() => return Err(SupervisorError::DrainInterrupted),
                _ = core.token.cancelled() => return Ok(()),
            };
            core.state.set_shutdown();
            _gate = permit;
        }

        let workers = core.state.list_workers();
        for worker in &workers {
            worker
                .signal(core.cfg.signal_on_term, WorkerState::Shutdown)
                .await;
        }
        for worker in &workers {
            tokio::select! {
                _ = worker.exited() => {}
                _ = ctx.cancelled() => {
                    // drain interrupted: workers are cancelled regardless
                    core.close().await;
                    return Err(SupervisorError::DrainInterrupted);
                }
            }
        }

        core.close().await;
        Ok(())
    }

    /// One-shot teardown: cancel every worker context, close the listeners
    /// (unlinking Unix paths), wait for all worker tasks, remove the pid
    /// file. Concurrent callers block until the first call finishes.
    pub(crate) async fn close(&self) {
        let mut closed = self.close_once.lock().await;
        if *closed {
            return;
        }
        *closed = true;

        self.token.cancel();
        drop(self.state.take_listeners());
        self.tracker.close();
        self.tracker.wait().await;
        let pid_file = self
            .pid_file
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(pid_file) = pid_file {
            pid_file.remove();
        }
    }
}

/// Autorestart ticker: armed by the first healthy generation, re-armed on
/// every later one, fires a reload per period otherwise.
async fn auto_restarter(core: Arc<Core>, mut rx: mpsc::Receiver<()>) {
    let period = core.cfg.auto_restart_interval();

    // the first healthy generation arms the ticker
    tokio::select! {
        _ = core.token.cancelled() => return,
        msg = rx.recv() => {
            if msg.is_none() {
                return;
            }
        }
    }
    let mut ticker = make_ticker(period);
    let mut count: u64 = 0;

    loop {
        tokio::select! {
            _ = core.token.cancelled() => return,
            msg = rx.recv() => {
                if msg.is_none() {
                    return;
                }
                // a new generation verified healthy: start a fresh period
                ticker = make_ticker(period);
                count = 0;
            }
            _ = ticker.tick() => {
                count += 1;
                core.bus.publish(
                    Event::now(EventKind::AutoRestartTriggered)
                        .with_attempt(count)
                        .with_delay(period),
                );
                let core = Arc::clone(&core);
                tokio::spawn(async move {
                    let _ = Core::reload(&core).await;
                });
            }
        }
    }
}

fn make_ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}

/// Comma-separated pid list for events; `"none"` when empty.
fn format_pids(workers: &[Arc<Worker>]) -> String {
    if workers.is_empty() {
        return "none".to_string();
    }
    workers
        .iter()
        .map(|w| w.pid().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_list_formats_like_the_status_log() {
        assert_eq!(format_pids(&[]), "none");
        let workers = vec![Worker::stub(100, 1), Worker::stub(200, 2)];
        assert_eq!(format_pids(&workers), "100,200");
    }
}
