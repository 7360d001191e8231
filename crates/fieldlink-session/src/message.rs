//! Client-visible chat-log messages.

use fieldlink_packet::PacketWriter;

/// Something that can be rendered into the client's chat log.
///
/// Implementations encode their own body; the caller provides a writer
/// already opened on the message opcode.
pub trait Message: Send + Sync {
    /// Encodes the message body: u8 kind tag, then kind-specific fields.
    fn encode(&self, w: &mut PacketWriter);
}

const KIND_NOTICE: u8 = 0;
const KIND_SYSTEM: u8 = 4;

/// A plain system line (white text).
#[derive(Debug, Clone)]
pub struct SystemMessage {
    text: String,
}

impl SystemMessage {
    /// Wraps the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Message for SystemMessage {
    fn encode(&self, w: &mut PacketWriter) {
        w.write_u8(KIND_SYSTEM).write_string(&self.text);
    }
}

/// A server notice (blue text).
#[derive(Debug, Clone)]
pub struct NoticeMessage {
    text: String,
}

impl NoticeMessage {
    /// Wraps the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Message for NoticeMessage {
    fn encode(&self, w: &mut PacketWriter) {
        w.write_u8(KIND_NOTICE).write_string(&self.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlink_packet::SendOp;

    #[test]
    fn test_system_message_encodes_kind_then_text() {
        let mut w = PacketWriter::new(SendOp::Message);
        SystemMessage::new("hello").encode(&mut w);
        let packet = w.finish();

        let mut r = packet.reader();
        assert_eq!(r.read_u8().unwrap(), KIND_SYSTEM);
        assert_eq!(r.read_string().unwrap(), "hello");
    }

    #[test]
    fn test_notice_message_uses_notice_kind() {
        let mut w = PacketWriter::new(SendOp::Message);
        NoticeMessage::new("maintenance at dawn").encode(&mut w);

        assert_eq!(w.finish().reader().read_u8().unwrap(), KIND_NOTICE);
    }
}
