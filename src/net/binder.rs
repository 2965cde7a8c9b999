//! # Listener binder.
//!
//! Binds the configured TCP and Unix-domain listeners once at boot, in
//! configuration order. That order is load-bearing: the n-th listener lands
//! on descriptor `3 + n` in every worker (see [`crate::inherit`]).
//!
//! Address handling:
//! - a bare integer port binds `0.0.0.0:<port>` IPv4-only (compatibility
//!   with older peer implementations),
//! - `host:port` binds with the resolver's preference,
//! - `address=fd` forms are rejected; listen addresses are bind-only,
//! - a Unix path whose existing filesystem entry is a socket is unlinked
//!   before binding.
//!
//! Any bind failure closes the already-bound listeners and fails boot.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use tokio::net::{TcpListener, UnixListener};

use crate::config::Config;
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};

/// One bound listener, owned by the supervisor for its whole lifetime.
///
/// Dropping a Unix listener unlinks its socket path; this covers both
/// shutdown and the partial-bind failure path.
#[derive(Debug)]
pub(crate) enum Listener {
    Tcp {
        /// Textual address as actually bound (resolved, with real port).
        addr: String,
        socket: TcpListener,
    },
    Unix {
        path: PathBuf,
        socket: UnixListener,
    },
}

impl Listener {
    /// The textual address exported to workers.
    pub(crate) fn addr(&self) -> String {
        match self {
            Listener::Tcp { addr, .. } => addr.clone(),
            Listener::Unix { path, .. } => path.display().to_string(),
        }
    }

    /// The parent-side raw descriptor; duplicated per spawn, never handed
    /// out directly.
    pub(crate) fn raw_fd(&self) -> RawFd {
        match self {
            Listener::Tcp { socket, .. } => socket.as_raw_fd(),
            Listener::Unix { socket, .. } => socket.as_raw_fd(),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Unix { path, .. } = self {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Binds every configured address, TCP first, then Unix paths.
pub(crate) async fn bind_all(cfg: &Config, bus: &Bus) -> Result<Vec<Listener>, SupervisorError> {
    let mut listeners = Vec::with_capacity(cfg.ports.len() + cfg.paths.len());

    for port in &cfg.ports {
        listeners.push(bind_tcp(port, bus).await?);
    }
    for path in &cfg.paths {
        listeners.push(bind_unix(path, bus)?);
    }

    Ok(listeners)
}

async fn bind_tcp(port: &str, bus: &Bus) -> Result<Listener, SupervisorError> {
    if port.contains('=') {
        let source = std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "fd options are not supported",
        );
        return Err(bind_failed(bus, port, source));
    }

    let bound = if let Ok(num) = port.parse::<u16>() {
        // bare port: bind IPv4 only, for compatibility
        TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, num)).await
    } else {
        TcpListener::bind(port).await
    };

    let socket = bound.map_err(|e| bind_failed(bus, port, e))?;
    let addr = socket
        .local_addr()
        .map_err(|e| bind_failed(bus, port, e))?
        .to_string();

    Ok(Listener::Tcp { addr, socket })
}

fn bind_unix(path: &Path, bus: &Bus) -> Result<Listener, SupervisorError> {
    if let Ok(meta) = std::fs::symlink_metadata(path) {
        if meta.file_type().is_socket() {
            bus.publish(
                Event::now(EventKind::RemovingSocketFile).with_path(path.display().to_string()),
            );
            if let Err(e) = std::fs::remove_file(path) {
                bus.publish(
                    Event::now(EventKind::RemoveSocketFailed)
                        .with_path(path.display().to_string())
                        .with_error(e.to_string()),
                );
            }
        }
    }
    let _ = std::fs::remove_file(path);

    let socket =
        UnixListener::bind(path).map_err(|e| bind_failed(bus, &path.display().to_string(), e))?;
    Ok(Listener::Unix {
        path: path.to_path_buf(),
        socket,
    })
}

fn bind_failed(bus: &Bus, addr: &str, source: std::io::Error) -> SupervisorError {
    bus.publish(
        Event::now(EventKind::BindFailed)
            .with_path(addr.to_string())
            .with_error(source.to_string()),
    );
    SupervisorError::Bind {
        addr: addr.to_string(),
        source,
    }
}
