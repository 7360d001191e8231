//! Connection transport for Fieldlink.
//!
//! A [`Connection`] is the per-peer transport object: it owns the send and
//! receive stream ciphers (each seeded by, and advancing with, that
//! direction's sequence counter), a bounded outbound queue, and the
//! teardown signal. A [`Socket`] is whatever sits on top of a connection
//! and receives its lifecycle callbacks — one implementation per concrete
//! session kind, no inheritance chain.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← implements Socket, reacts to packets/ticks
//!     ↕
//! Transport Layer (this crate)  ← frames, ciphers, sequence counters
//!     ↕
//! Packet Layer (below)  ← field-level encode/decode
//! ```
//!
//! # Ordering and exclusivity
//!
//! The send path and the receive path are each serialized by their own
//! mutex, held only around the sequence/cipher step — never around
//! handler logic. The two directions run concurrently with each other.
//! A sequence counter advances exactly once per frame actually sent or
//! decoded; a counter that falls out of step with the peer corrupts the
//! cipher stream permanently, which is why [`NetError::CipherDesync`] is
//! fatal for the connection.

#![allow(async_fn_in_trait)]

mod cipher;
mod connection;
mod error;
mod registry;

pub use cipher::RollingCipher;
pub use connection::{
    Connection, ConnectionConfig, ConnectionDriver, FRAME_HEADER_LEN,
    HELLO_VERSION, parse_header, read_hello, spawn,
};
pub use error::NetError;
pub use registry::SocketRegistry;

use std::fmt;

use fieldlink_packet::Packet;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle hooks for one connected session.
///
/// The connection driver invokes these; implementations must not assume
/// any particular thread, only that:
///
/// - `on_packet` runs once per fully decoded inbound packet, in arrival
///   order, with the receive counter already advanced past the packet;
/// - `on_disconnect` runs exactly once, after the last `on_packet`;
/// - `on_update` is driven by the external tick loop, serialized per
///   socket;
/// - `on_error` reports a transport fault (read, frame, or cipher);
///   whether the connection survives depends on the fault (see
///   [`NetError::is_fatal`]). Handler faults stay inside the handler.
pub trait Socket: Send + Sync + 'static {
    /// Error produced by the packet handler.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Called for every decoded inbound packet, in arrival order.
    async fn on_packet(&self, packet: Packet) -> Result<(), Self::Error>;

    /// Called once when the connection has closed.
    async fn on_disconnect(&self);

    /// Called periodically by the server's tick loop.
    async fn on_update(&self);

    /// Called when the transport or the packet handler faults.
    async fn on_error(&self, error: &NetError);
}
