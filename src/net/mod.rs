//! Listener plumbing: binding and ownership of the inheritable sockets.

mod binder;

pub(crate) use binder::{bind_all, Listener};
