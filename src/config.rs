//! # Supervisor configuration.
//!
//! [`Config`] describes what to supervise and how: the worker command, the
//! listen addresses handed down to every generation, the boot-watchdog
//! interval, the drain delay between generations, autorestart, relay-signal
//! overrides, and the persistent status/pid files.
//!
//! Front-ends (CLI, embedders) fill this struct directly; there is no flag
//! parsing here.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use genvisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.command = "/usr/bin/my-server".into();
//! cfg.ports = vec!["8080".into()];
//! cfg.interval = Duration::from_secs(1);
//!
//! assert_eq!(cfg.kill_old_delay(), Duration::ZERO);
//! cfg.enable_auto_restart = true;
//! assert_eq!(cfg.kill_old_delay(), Duration::from_secs(5));
//! ```

use std::path::PathBuf;
use std::time::Duration;

use nix::sys::signal::Signal;

/// Configuration for the supervisor and its workers.
#[derive(Clone, Debug)]
pub struct Config {
    /// Worker command to execute.
    pub command: String,
    /// Arguments passed to the worker command.
    pub args: Vec<String>,

    /// TCP addresses to bind (`port` or `host:port`, so they are strings).
    ///
    /// A bare port binds `0.0.0.0:<port>` IPv4-only, for compatibility with
    /// older peer implementations.
    pub ports: Vec<String>,
    /// Filesystem paths to bind as Unix-domain sockets.
    pub paths: Vec<PathBuf>,

    /// Working directory the worker chdirs to before exec (optional).
    pub dir: Option<PathBuf>,

    /// Boot-watchdog window: a worker that survives this long is healthy.
    pub interval: Duration,
    /// Delay between declaring a new generation healthy and signalling the
    /// old one. `None` selects the default: 5s with autorestart enabled,
    /// zero otherwise.
    pub kill_old_delay: Option<Duration>,

    /// Enables periodic automatic reloads.
    pub enable_auto_restart: bool,
    /// Period of the autorestart ticker.
    pub auto_restart_interval: Duration,

    /// Signal relayed to old workers on reload.
    pub signal_on_hup: Signal,
    /// Signal relayed to workers on TERM-initiated shutdown.
    pub signal_on_term: Signal,

    /// If set, the per-worker status file (`<generation>:<pid>` lines).
    pub status_file: Option<PathBuf>,
    /// If set, the supervisor pid file, held under an exclusive lock.
    pub pid_file: Option<PathBuf>,
    /// If set, a directory whose regular files become extra worker
    /// environment variables (filename = name, contents = value).
    pub env_dir: Option<PathBuf>,

    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `interval = 1s`
    /// - `kill_old_delay = None` (derived from autorestart)
    /// - `auto_restart_interval = 360s`, autorestart disabled
    /// - `signal_on_hup = signal_on_term = SIGTERM`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            ports: Vec::new(),
            paths: Vec::new(),
            dir: None,
            interval: Duration::from_secs(1),
            kill_old_delay: None,
            enable_auto_restart: false,
            auto_restart_interval: Duration::from_secs(360),
            signal_on_hup: Signal::SIGTERM,
            signal_on_term: Signal::SIGTERM,
            status_file: None,
            pid_file: None,
            env_dir: None,
            bus_capacity: 1024,
        }
    }
}

impl Config {
    /// Effective boot-watchdog interval. A zero interval falls back to 1s.
    pub fn interval(&self) -> Duration {
        if self.interval > Duration::ZERO {
            self.interval
        } else {
            Duration::from_secs(1)
        }
    }

    /// Effective drain delay before signalling old workers.
    ///
    /// Explicit value wins; otherwise 5s with autorestart enabled (rolling
    /// restarts want a drain window), zero without.
    pub fn kill_old_delay(&self) -> Duration {
        match self.kill_old_delay {
            Some(d) => d,
            None if self.enable_auto_restart => Duration::from_secs(5),
            None => Duration::ZERO,
        }
    }

    /// Effective autorestart period. A zero period falls back to 360s.
    pub fn auto_restart_interval(&self) -> Duration {
        if self.auto_restart_interval > Duration::ZERO {
            self.auto_restart_interval
        } else {
            Duration::from_secs(360)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_old_delay_follows_autorestart() {
        let mut cfg = Config::default();
        assert_eq!(cfg.kill_old_delay(), Duration::ZERO);

        cfg.enable_auto_restart = true;
        assert_eq!(cfg.kill_old_delay(), Duration::from_secs(5));

        cfg.kill_old_delay = Some(Duration::from_millis(250));
        assert_eq!(cfg.kill_old_delay(), Duration::from_millis(250));
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let cfg = Config {
            interval: Duration::ZERO,
            auto_restart_interval: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(cfg.interval(), Duration::from_secs(1));
        assert_eq!(cfg.auto_restart_interval(), Duration::from_secs(360));
    }
}
