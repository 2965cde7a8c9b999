//! # Simple logging subscriber for operations and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [starting] worker pid=4242 generation=2
//! [boot-failed] worker pid=4242 status="exit status: 1", retrying
//! [ready] new worker is running, sending SIGTERM to old workers: 4001
//! [died-unexpectedly] worker pid=4242 status="signal: 11", restarting
//! [shutdown] received SIGTERM, sending SIGTERM to all workers: 4242
//! [exiting]
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Simple stdout logging subscriber.
///
/// Prints one line per event, close to what an operator wants to see in a
/// service log. Implement a custom [`Subscribe`] for structured sinks.
pub struct LogWriter;

fn opt(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("?")
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::WorkerStarting => {
                println!(
                    "[starting] worker pid={} generation={}",
                    e.pid.unwrap_or(-1),
                    e.generation.unwrap_or(0)
                );
            }
            EventKind::SpawnFailed => {
                println!("[spawn-failed] {}, retrying", opt(&e.error));
            }
            EventKind::WorkerBootFailed => {
                println!(
                    "[boot-failed] worker pid={} status={:?}, retrying",
                    e.pid.unwrap_or(-1),
                    opt(&e.status)
                );
            }
            EventKind::ReloadRequested => {
                println!("[reload] received HUP, spawning a new worker");
            }
            EventKind::AutoRestartTriggered => {
                if e.attempt.unwrap_or(1) > 1 {
                    println!("[autorestart] triggered (forced)");
                } else {
                    println!("[autorestart] triggered");
                }
            }
            EventKind::NewWorkerReady => {
                println!(
                    "[ready] new worker is running, sending {} to old workers: {}",
                    e.signal.unwrap_or("?"),
                    opt(&e.pids)
                );
            }
            EventKind::KillOldDelay => {
                println!(
                    "[drain] sleeping {:?} before killing old workers",
                    e.delay.unwrap_or_default()
                );
            }
            EventKind::KillingOldWorkers => {
                println!("[drain] killing old workers");
            }
            EventKind::WorkerDiedUnexpectedly => {
                println!(
                    "[died-unexpectedly] worker pid={} status={:?}, restarting",
                    e.pid.unwrap_or(-1),
                    opt(&e.status)
                );
            }
            EventKind::OldWorkerDied => {
                println!(
                    "[old-died] worker pid={} status={:?}",
                    e.pid.unwrap_or(-1),
                    opt(&e.status)
                );
            }
            EventKind::WorkerStopped => {
                println!(
                    "[stopped] worker pid={} status={:?}",
                    e.pid.unwrap_or(-1),
                    opt(&e.status)
                );
            }
            EventKind::ShutdownRequested => {
                println!(
                    "[shutdown] received {}, sending {} to all workers: {}",
                    e.received.unwrap_or("?"),
                    e.signal.unwrap_or("?"),
                    opt(&e.pids)
                );
            }
            EventKind::Exiting => {
                println!("[exiting]");
            }
            EventKind::SignalFailed => {
                println!(
                    "[signal-failed] failed to send {} to pid={}",
                    e.signal.unwrap_or("?"),
                    e.pid.unwrap_or(-1)
                );
            }
            EventKind::StatusWriteFailed => {
                println!("[status-failed] path={} {}", opt(&e.path), opt(&e.error));
            }
            EventKind::EnvDirFailed => {
                println!("[env-dir-failed] path={} {}", opt(&e.path), opt(&e.error));
            }
            EventKind::RemovingSocketFile => {
                println!("[bind] removing existing socket file: {}", opt(&e.path));
            }
            EventKind::RemoveSocketFailed => {
                println!(
                    "[bind] failed to remove existing socket file: {} {}",
                    opt(&e.path),
                    opt(&e.error)
                );
            }
            EventKind::BindFailed => {
                println!("[bind-failed] {} {}", opt(&e.path), opt(&e.error));
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
