//! # OS signal handling.
//!
//! The supervisor subscribes to `HUP`, `INT`, `TERM`, and `QUIT`:
//!
//! - **HUP** → reload (spawn a new generation, drain the old one)
//! - **INT / TERM / QUIT** → shutdown-by-signal
//!
//! Both are dispatched onto their own tasks so the watch loop keeps
//! consuming signals; duplicate requests are absorbed by the reload gate and
//! the shutdown flag. The loop exits when the supervisor token cancels.

use std::sync::Arc;

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};

use crate::core::supervisor::Core;
use crate::error::SupervisorError;
use crate::events::{Event, EventKind};

/// The four subscribed signal streams.
pub(crate) struct SignalStreams {
    hup: tokio::signal::unix::Signal,
    int: tokio::signal::unix::Signal,
    term: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

/// Installs the streams; fails only if the runtime cannot register them.
pub(crate) fn install() -> Result<SignalStreams, SupervisorError> {
    let mk = |kind: SignalKind| signal(kind).map_err(|source| SupervisorError::Signals { source });
    Ok(SignalStreams {
        hup: mk(SignalKind::hangup())?,
        int: mk(SignalKind::interrupt())?,
        term: mk(SignalKind::terminate())?,
        quit: mk(SignalKind::quit())?,
    })
}

/// Consumes signals until the supervisor token cancels.
pub(crate) async fn watch(core: Arc<Core>, mut streams: SignalStreams) {
    loop {
        tokio::select! {
            _ = core.token.cancelled() => return,
            _ = streams.hup.recv() => {
                core.bus.publish(Event::now(EventKind::ReloadRequested));
                let core = Arc::clone(&core);
                tokio::spawn(async move {
                    let _ = Core::reload(&core).await;
                });
            }
            _ = streams.int.recv() => dispatch_shutdown(&core, Signal::SIGINT),
            _ = streams.term.recv() => dispatch_shutdown(&core, Signal::SIGTERM),
            _ = streams.quit.recv() => dispatch_shutdown(&core, Signal::SIGQUIT),
        }
    }
}

fn dispatch_shutdown(core: &Arc<Core>, received: Signal) {
    let core = Arc::clone(core);
    tokio::spawn(async move {
        Core::shutdown_by_signal(&core, received).await;
    });
}
