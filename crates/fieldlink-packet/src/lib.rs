//! Ordered binary packet codec for Fieldlink.
//!
//! Every packet on the wire is an operation identifier followed by a fixed
//! sequence of positional fields, written and read in strict declaration
//! order. There is no schema on the wire — both sides must agree on the
//! field sequence for each opcode, which is why the encoders in
//! `fieldlink-session` document their layouts field by field.
//!
//! All multi-byte fields are little-endian. Field widths:
//!
//! | Type   | Width            |
//! |--------|------------------|
//! | u8     | 1B               |
//! | bool   | 1B (0/1)         |
//! | i16    | 2B               |
//! | i32    | 4B               |
//! | i64    | 8B               |
//! | string | u16 length + raw |
//! | point  | 2× i16 (x, y)    |
//!
//! A [`PacketWriter`] is opened on a [`SendOp`], filled in order, and
//! consumed by [`PacketWriter::finish`] into an immutable [`Packet`].
//! Writers are single-use — a packet buffer is never reused across
//! encode calls.

mod error;
mod opcode;
mod packet;
mod reader;
mod writer;

pub use error::PacketError;
pub use opcode::{RecvOp, SendOp};
pub use packet::Packet;
pub use reader::PacketReader;
pub use writer::PacketWriter;

use std::fmt;

/// A 2D position as carried on the wire (2× i16).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i16,
    /// Vertical coordinate.
    pub y: i16,
}

impl Point {
    /// Creates a point from raw coordinates.
    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
