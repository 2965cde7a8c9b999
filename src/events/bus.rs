//! # Event bus for broadcasting supervisor events.
//!
//! [`Bus`] is a wrapper around [`tokio::sync::broadcast`] that lets the
//! orchestrator, worker tasks, and the binder broadcast [`Event`]s to
//! multiple subscribers simultaneously.
//!
//! ## Key characteristics:
//! - **Broadcast semantics**: all active subscribers receive a clone of each event
//! - **Non-persistent**: events are lost if there are no active subscribers
//! - **Bounded capacity**: old events are dropped when the channel is full
//! - **Multiple subscribers**: any number of receivers can subscribe independently
//!
//! ## Usage:
//! - [`Bus::publish`] broadcasts an event to all current subscribers (non-blocking)
//! - [`Bus::subscribe`] creates a new receiver that will receive all future events
//!
//! The [`Supervisor`](crate::Supervisor) uses this to deliver worker
//! lifecycle events to the subscriber fan-out.

use super::event::Event;
use tokio::sync::broadcast;

/// Broadcast channel for supervisor events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// When capacity is exceeded, the oldest unsent events are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no active subscribers, the event is dropped silently.
    /// This is intentional: the supervisor operates fine without observers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new subscriber that will receive all future events.
    ///
    /// Each call creates an independent receiver; every receiver gets a
    /// clone of every event published after its subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
