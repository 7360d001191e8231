//! Error types for the session layer.

use fieldlink_net::NetError;
use fieldlink_packet::PacketError;

/// Errors from session logic and packet handling.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A second conversation was started while one was in flight.
    #[error("a conversation is already active")]
    ConversationAlreadyActive,

    /// The conversation ended (cancelled, disconnected, or faulted)
    /// while a script step was still waiting on it.
    #[error("conversation ended")]
    ConversationEnded,

    /// The client answered a script step with the wrong answer shape.
    #[error("unexpected script answer, expected {expected}")]
    UnexpectedAnswer {
        /// The answer shape the pending step required.
        expected: &'static str,
    },

    /// A gameplay packet arrived before a user was bound to the session.
    #[error("no user bound to this session")]
    NoUser,

    /// Transport failure underneath the session.
    #[error(transparent)]
    Net(#[from] NetError),

    /// Malformed inbound packet payload.
    #[error(transparent)]
    Packet(#[from] PacketError),
}
