//! Error types for the packet codec.

/// Errors that can occur while decoding a packet.
///
/// Encoding is infallible — the writer only appends to a growable buffer —
/// so every variant here comes from the read path.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// The packet ended before the requested field could be read.
    #[error("packet truncated: needed {needed} more byte(s) at offset {offset}")]
    Truncated {
        /// Byte offset the reader was at when the read failed.
        offset: usize,
        /// How many bytes the field still required.
        needed: usize,
    },

    /// A length-prefixed string held bytes that were not valid UTF-8.
    #[error("string field at offset {offset} is not valid UTF-8")]
    BadUtf8 {
        /// Byte offset of the string's length prefix.
        offset: usize,
    },

    /// A bool field held a value other than 0 or 1.
    #[error("bool field at offset {offset} holds invalid value {value}")]
    BadBool {
        /// Byte offset of the field.
        offset: usize,
        /// The raw byte that was read.
        value: u8,
    },

    /// The opcode at the head of the packet is not known to this build.
    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),

    /// The packet is too short to even carry an opcode.
    #[error("packet shorter than an opcode ({0} byte(s))")]
    MissingOpcode(usize),
}
