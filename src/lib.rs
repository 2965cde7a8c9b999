//! # genvisor
//!
//! **genvisor** is a hot-deploy process supervisor for long-running network
//! services on Unix.
//!
//! It binds listening sockets once in the supervisor process, spawns worker
//! children that inherit them at fixed descriptor slots, and orchestrates
//! graceful generational handover: a reload spawns a new worker on the same
//! sockets, verifies it survives a boot window, then signals the previous
//! generation to drain and exit. Clients never see a closed listening socket
//! across restarts.
//!
//! ## Features
//!
//! | Area              | Description                                                       | Key types / traits            |
//! |-------------------|-------------------------------------------------------------------|-------------------------------|
//! | **Supervision**   | Spawn-and-verify, generational reload, autorestart, shutdown.     | [`Supervisor`]                |
//! | **Inheritance**   | The `SERVER_STARTER_PORT` wire format, for child-side parsing.    | [`inherit`]                   |
//! | **Events**        | Typed lifecycle events on a broadcast bus.                        | [`Event`], [`EventKind`]      |
//! | **Subscribers**   | Non-blocking fan-out to custom handlers (logging, metrics, ...).  | [`Subscribe`], [`LogWriter`]  |
//! | **Errors**        | Typed errors, including the shutdown sentinel.                    | [`SupervisorError`]           |
//! | **Configuration** | Plain struct with documented defaults.                            | [`Config`]                    |
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use genvisor::{Config, LogWriter, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.command = "/usr/bin/my-server".into();
//!     cfg.ports = vec!["8080".into()];
//!     cfg.interval = Duration::from_secs(1);
//!     cfg.status_file = Some("/tmp/my-server.status".into());
//!
//!     // Workers find their sockets via SERVER_STARTER_PORT, e.g.
//!     // "0.0.0.0:8080=3": descriptor 3 is the listener.
//!     let supervisor = Supervisor::new(cfg, vec![Arc::new(LogWriter)]);
//!     supervisor.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! Send the supervisor process `SIGHUP` to roll a new generation, `SIGTERM`
//! (or `SIGINT`/`SIGQUIT`) to shut down; or call [`Supervisor::reload`] and
//! [`Supervisor::shutdown`] directly.
//!
//! ---

mod config;
mod core;
mod error;
mod net;

pub mod events;
pub mod inherit;
pub mod subscribers;

// ---- Public re-exports ----

pub use crate::core::Supervisor;
pub use config::Config;
pub use error::SupervisorError;
pub use events::{Event, EventKind};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
