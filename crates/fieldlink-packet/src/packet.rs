//! The finished packet buffer.

use crate::{PacketError, PacketReader};

/// A complete packet: opcode followed by its positional payload.
///
/// Outbound packets are produced by [`PacketWriter::finish`]
/// (crate::PacketWriter::finish); inbound packets are constructed from a
/// decrypted frame body. Either way the buffer is immutable from here on
/// and is dropped as soon as the encode or decode that owns it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    buf: Vec<u8>,
}

impl Packet {
    /// Wraps a received frame body. The first two bytes must be the opcode.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self, PacketError> {
        if buf.len() < 2 {
            return Err(PacketError::MissingOpcode(buf.len()));
        }
        Ok(Self { buf })
    }

    pub(crate) fn from_writer(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// The raw opcode at the head of the packet.
    pub fn opcode_raw(&self) -> u16 {
        u16::from_le_bytes([self.buf[0], self.buf[1]])
    }

    /// The full wire bytes, opcode included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Total length in bytes, opcode included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// `true` only for a packet with an opcode and no payload.
    pub fn is_empty(&self) -> bool {
        self.buf.len() <= 2
    }

    /// A reader positioned past the opcode, at the first payload field.
    pub fn reader(&self) -> PacketReader<'_> {
        PacketReader::with_offset(&self.buf, 2)
    }

    /// Consumes the packet, returning the wire bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
