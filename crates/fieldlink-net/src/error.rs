//! Error types for the transport layer.

/// Errors that can occur on a connection.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The connection is closed; nothing can be sent on it anymore.
    #[error("connection closed")]
    Closed,

    /// A raw socket read or write failed.
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),

    /// The frame tag did not match the expected receive sequence.
    ///
    /// Once the counters disagree the cipher stream is corrupt for the
    /// rest of the connection's life — there is no way to resynchronize,
    /// so the connection must be torn down.
    #[error("cipher desync: expected frame tag {expected:#06x}, got {got:#06x}")]
    CipherDesync {
        /// Tag derived from the local receive sequence.
        expected: u16,
        /// Tag carried by the offending frame.
        got: u16,
    },

    /// A frame claimed a body longer than the transport allows.
    #[error("frame length {0} exceeds maximum")]
    FrameTooLong(usize),

    /// A frame body failed packet-level decoding.
    #[error(transparent)]
    Packet(#[from] fieldlink_packet::PacketError),

    /// The peer sent a malformed hello.
    #[error("bad hello: {0}")]
    BadHello(String),
}

impl NetError {
    /// Whether this fault requires tearing the connection down.
    ///
    /// Cipher desync and I/O failures are unrecoverable; a single
    /// malformed packet body is not — the stream itself is still in sync.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Closed
                | Self::Io(_)
                | Self::CipherDesync { .. }
                | Self::FrameTooLong(_)
                | Self::BadHello(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_desync_is_fatal() {
        assert!(NetError::CipherDesync { expected: 1, got: 2 }.is_fatal());
    }

    #[test]
    fn test_packet_error_is_not_fatal() {
        let err = NetError::Packet(fieldlink_packet::PacketError::MissingOpcode(0));
        assert!(!err.is_fatal());
    }
}
