//! The socket registry: maps connection identities to live sockets.
//!
//! An explicit, transport-owned map instead of a process-wide channel
//! attribute: the server attaches a socket when a connection is accepted
//! and detaches it when the driver stops. The tick loop walks the map to
//! deliver `on_update` to every live socket.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{ConnectionId, Socket};

/// All live sockets, keyed by connection ID.
///
/// Cheap to share: the registry itself is `Arc`-wrapped by callers and
/// internally synchronized. The lock is held only for map operations —
/// `sockets()` snapshots the values so ticking never blocks attach or
/// detach.
pub struct SocketRegistry<S: Socket> {
    inner: Mutex<HashMap<ConnectionId, Arc<S>>>,
}

impl<S: Socket> SocketRegistry<S> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a socket for a connection. Returns the previous socket
    /// if the ID was already attached (which indicates an ID reuse bug
    /// upstream — IDs are never recycled while a connection lives).
    pub fn attach(&self, id: ConnectionId, socket: Arc<S>) -> Option<Arc<S>> {
        let previous = self.inner.lock().expect("registry lock").insert(id, socket);
        if previous.is_some() {
            tracing::warn!(%id, "socket attached over an existing one");
        } else {
            tracing::debug!(%id, "socket attached");
        }
        previous
    }

    /// Removes a socket. Returns it if it was present.
    pub fn detach(&self, id: ConnectionId) -> Option<Arc<S>> {
        let removed = self.inner.lock().expect("registry lock").remove(&id);
        if removed.is_some() {
            tracing::debug!(%id, "socket detached");
        }
        removed
    }

    /// Looks up the socket for a connection.
    pub fn get(&self, id: ConnectionId) -> Option<Arc<S>> {
        self.inner.lock().expect("registry lock").get(&id).cloned()
    }

    /// Snapshot of every live socket, for the tick loop.
    pub fn sockets(&self) -> Vec<Arc<S>> {
        self.inner
            .lock()
            .expect("registry lock")
            .values()
            .cloned()
            .collect()
    }

    /// Number of live sockets.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock").len()
    }

    /// `true` if no sockets are attached.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("registry lock").is_empty()
    }
}

impl<S: Socket> Default for SocketRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
