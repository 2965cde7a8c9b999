//! Supervisor events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the orchestrator, the binder, and
//! the per-worker tasks.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the orchestrator (boot/reload/shutdown), worker reaper
//!   and watch tasks (deaths), the binder (socket-file handling), the state
//!   container (status-file failures).
//! - **Consumers**: the supervisor's fan-out listener, which forwards every
//!   event to the [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
