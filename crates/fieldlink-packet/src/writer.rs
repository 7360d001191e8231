//! Ordered field encoder.

use crate::{Packet, Point, SendOp};

/// Append-only encoder for one outbound packet.
///
/// Opened on a [`SendOp`], filled with `write_*` calls in the exact field
/// order of the packet's layout, then consumed by [`finish`](Self::finish).
/// Single-use by construction: `finish` takes the writer by value, so a
/// buffer can never leak into a second packet.
#[derive(Debug)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    /// Opens a writer for the given operation.
    pub fn new(op: SendOp) -> Self {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&(op as u16).to_le_bytes());
        Self { buf }
    }

    /// Appends a single byte.
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    /// Appends a bool as one byte (0/1).
    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.buf.push(value as u8);
        self
    }

    /// Appends a signed short.
    pub fn write_i16(&mut self, value: i16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Appends a signed int.
    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Appends a signed long.
    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Appends a length-prefixed string: u16 byte length, then raw UTF-8.
    ///
    /// Lengths beyond `u16::MAX` are truncated at a character boundary —
    /// nothing in the protocol carries strings anywhere near that size.
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        let mut bytes = value.as_bytes();
        if bytes.len() > u16::MAX as usize {
            let mut end = u16::MAX as usize;
            while !value.is_char_boundary(end) {
                end -= 1;
            }
            bytes = &value.as_bytes()[..end];
        }
        self.buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Appends a point as x then y, each a signed short.
    pub fn write_point(&mut self, value: Point) -> &mut Self {
        self.write_i16(value.x);
        self.write_i16(value.y)
    }

    /// Appends raw bytes verbatim. Used for pre-encoded sub-blocks.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Bytes written so far, opcode included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// `true` while only the opcode has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.len() <= 2
    }

    /// Seals the writer into an immutable [`Packet`].
    pub fn finish(self) -> Packet {
        Packet::from_writer(self.buf)
    }
}
