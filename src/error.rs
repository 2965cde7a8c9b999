//! # Error types used by the supervisor.
//!
//! [`SupervisorError`] covers everything `Supervisor::run` and its entry
//! points can return to the caller:
//!
//! - configuration and boot failures (missing command, bind, pid file),
//! - the shutdown sentinel ([`SupervisorError::ShuttingDown`]),
//! - interrupted programmatic drains.
//!
//! Transient child failures (spawn errors, boot-window exits) are never
//! surfaced here: they are published as events and retried. Advisory I/O
//! failures (status file, signal delivery, env-dir) are published and
//! swallowed.
//!
//! The type provides `as_label` for stable snake_case labels in logs/metrics.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the supervisor itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// No command was configured; there is nothing to supervise.
    #[error("command is required")]
    CommandRequired,

    /// Binding one of the configured listen addresses failed.
    ///
    /// Boot fails as a whole; previously bound listeners are closed.
    #[error("failed to listen to {addr}: {source}")]
    Bind {
        /// The textual address as configured (port, host:port, or path).
        addr: String,
        source: io::Error,
    },

    /// The pid file could not be created or written.
    ///
    /// A pre-existing file yields `source.kind() == AlreadyExists`: another
    /// supervisor instance owns the path.
    #[error("failed to open pid file {}: {source}", path.display())]
    PidFile {
        /// The configured pid-file path.
        path: PathBuf,
        source: io::Error,
    },

    /// The exclusive advisory lock on the pid file could not be taken.
    #[error("failed to lock pid file {}: {errno}", path.display())]
    PidFileLock {
        /// The configured pid-file path.
        path: PathBuf,
        errno: nix::errno::Errno,
    },

    /// Installing the OS signal streams failed.
    #[error("failed to install signal handlers: {source}")]
    Signals { source: io::Error },

    /// A programmatic drain was interrupted by the caller's token.
    ///
    /// Workers have still been cancelled and `close()` has run.
    #[error("shutdown drain interrupted by caller")]
    DrainInterrupted,

    /// Shutdown sentinel: the supervisor is shutting down.
    ///
    /// Propagated out of spawn-and-verify when the shutdown flag is
    /// observed. Boot, reload, and the unexpected-exit handler treat it as
    /// graceful termination, never as an error.
    #[error("supervisor is shutting down")]
    ShuttingDown,
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::CommandRequired => "command_required",
            SupervisorError::Bind { .. } => "bind_failed",
            SupervisorError::PidFile { .. } => "pid_file_failed",
            SupervisorError::PidFileLock { .. } => "pid_file_lock_failed",
            SupervisorError::Signals { .. } => "signal_install_failed",
            SupervisorError::DrainInterrupted => "drain_interrupted",
            SupervisorError::ShuttingDown => "shutting_down",
        }
    }

    /// True for the shutdown sentinel.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, SupervisorError::ShuttingDown)
    }
}
