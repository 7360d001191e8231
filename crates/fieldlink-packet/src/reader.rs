//! Positional field decoder.

use crate::{PacketError, Point};

/// Reads fields from a packet buffer in strict declaration order.
///
/// The reader borrows the buffer and tracks a cursor; each `read_*`
/// consumes exactly the field's wire width or fails with
/// [`PacketError::Truncated`] without moving the cursor.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Reads from the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reads from `offset` — used to position past the opcode.
    pub fn with_offset(data: &'a [u8], offset: usize) -> Self {
        Self { data, pos: offset }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PacketError> {
        if self.remaining() < len {
            return Err(PacketError::Truncated {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a bool, rejecting anything other than 0 or 1.
    pub fn read_bool(&mut self) -> Result<bool, PacketError> {
        let offset = self.pos;
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(PacketError::BadBool { offset, value }),
        }
    }

    /// Reads an unsigned short. Used for opcodes and length prefixes.
    pub fn read_u16(&mut self) -> Result<u16, PacketError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a signed short.
    pub fn read_i16(&mut self) -> Result<i16, PacketError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads an unsigned int. Used for cipher/mask fields.
    pub fn read_u32(&mut self) -> Result<u32, PacketError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a signed int.
    pub fn read_i32(&mut self) -> Result<i32, PacketError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a signed long.
    pub fn read_i64(&mut self) -> Result<i64, PacketError> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, PacketError> {
        let offset = self.pos;
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| PacketError::BadUtf8 { offset })
    }

    /// Reads a point (x then y, each a signed short).
    pub fn read_point(&mut self) -> Result<Point, PacketError> {
        let x = self.read_i16()?;
        let y = self.read_i16()?;
        Ok(Point { x, y })
    }

    /// Skips `len` bytes of fields the caller does not care about.
    pub fn skip(&mut self, len: usize) -> Result<(), PacketError> {
        self.take(len).map(|_| ())
    }
}
