//! Operation identifiers for outbound and inbound packets.
//!
//! Opcodes are u16 values at the head of every packet. Outbound
//! ([`SendOp`]) and inbound ([`RecvOp`]) spaces are independent — the
//! same numeric value can mean different things in each direction.

use crate::PacketError;

/// Operations the server sends to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SendOp {
    /// A system/notice message shown in the client's chat log.
    Message = 0x0011,
    /// Persistent stat change notification (the stat resync packet).
    StatChanged = 0x001F,
    /// One batch of temporary stats taking effect.
    TemporaryStatSet = 0x0020,
    /// One batch of temporary stats being cleared.
    TemporaryStatReset = 0x0021,
    /// A scripted-conversation step shown as an NPC dialog.
    ScriptMessage = 0x0130,
    /// First placement of the client's own character into a field.
    SetField = 0x007D,
    /// Another user becoming visible in the client's field.
    UserEnterField = 0x00A0,
    /// Another user leaving the client's field.
    UserLeaveField = 0x00A1,
}

/// Operations a client sends to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RecvOp {
    /// Chat line typed by the user.
    UserChat = 0x0031,
    /// Reply to an outstanding scripted-conversation step.
    UserScriptMessageAnswer = 0x0044,
    /// Request to close whatever dialog is currently open.
    UserCloseDialogRequest = 0x0045,
}

impl TryFrom<u16> for RecvOp {
    type Error = PacketError;

    fn try_from(value: u16) -> Result<Self, PacketError> {
        match value {
            0x0031 => Ok(Self::UserChat),
            0x0044 => Ok(Self::UserScriptMessageAnswer),
            0x0045 => Ok(Self::UserCloseDialogRequest),
            other => Err(PacketError::UnknownOpcode(other)),
        }
    }
}
