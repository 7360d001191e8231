//! The session-layer socket: routes inbound gameplay packets to the
//! bound user and fans lifecycle events into session cleanup.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::SystemTime;

use fieldlink_net::{Connection, NetError, Socket};
use fieldlink_packet::{Packet, PacketReader, RecvOp};
use fieldlink_tick::Updateable;

use crate::{FieldUser, ScriptAnswer, ScriptMessageKind, SessionError};

/// One connected client's session. Created at accept time; the user is
/// bound after authentication/character selection completes.
pub struct GameSession {
    conn: Arc<Connection>,
    user: StdMutex<Option<Arc<FieldUser>>>,
}

impl GameSession {
    /// Wraps an established connection with no user yet.
    pub fn new(conn: Arc<Connection>) -> Self {
        Self {
            conn,
            user: StdMutex::new(None),
        }
    }

    /// The transport this session rides on.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Binds the authenticated user to the session.
    pub fn bind_user(&self, user: Arc<FieldUser>) {
        *self.user.lock().expect("user lock") = Some(user);
    }

    /// The bound user, if any.
    pub fn user(&self) -> Option<Arc<FieldUser>> {
        self.user.lock().expect("user lock").clone()
    }
}

/// Decodes a client's script answer.
///
/// Layout: u8 step kind, bool answered (false = dismissed), then the
/// kind-specific value: nothing for say, bool for yes/no, string for
/// text, i32 for menu.
fn decode_script_answer(
    r: &mut PacketReader<'_>,
) -> Result<ScriptAnswer, SessionError> {
    let kind = ScriptMessageKind::try_from(r.read_u8()?)?;
    if !r.read_bool()? {
        return Ok(ScriptAnswer::EndChat);
    }
    Ok(match kind {
        ScriptMessageKind::Say => ScriptAnswer::Proceed,
        ScriptMessageKind::AskYesNo => ScriptAnswer::YesNo(r.read_bool()?),
        ScriptMessageKind::AskText => ScriptAnswer::Text(r.read_string()?),
        ScriptMessageKind::AskMenu => ScriptAnswer::Menu(r.read_i32()?),
    })
}

impl Socket for GameSession {
    type Error = SessionError;

    async fn on_packet(&self, packet: Packet) -> Result<(), SessionError> {
        let op = RecvOp::try_from(packet.opcode_raw())?;
        let user = self.user().ok_or(SessionError::NoUser)?;
        let mut r = packet.reader();

        match op {
            RecvOp::UserChat => {
                let text = r.read_string()?;
                tracing::info!(user = %user.name(), %text, "chat");
                // TODO: route through field broadcast once fields track
                // membership; until then the line echoes to the sender.
                user.message(&text).await?;
            }
            RecvOp::UserScriptMessageAnswer => {
                user.on_script_answer(decode_script_answer(&mut r)?);
            }
            RecvOp::UserCloseDialogRequest => {
                user.close_dialog();
            }
        }
        Ok(())
    }

    async fn on_disconnect(&self) {
        match self.user() {
            Some(user) => {
                user.cancel_conversation();
                user.close_dialog();
                tracing::info!(user = %user.name(), "session closed");
            }
            None => {
                tracing::debug!(id = %self.conn.id(), "session closed before user bind");
            }
        }
    }

    async fn on_update(&self) {
        if let Some(user) = self.user() {
            user.on_update(SystemTime::now()).await;
        }
    }

    async fn on_error(&self, error: &NetError) {
        tracing::warn!(id = %self.conn.id(), %error, "transport fault");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer_packet(body: &[u8]) -> Packet {
        let mut buf = vec![0x44, 0x00]; // UserScriptMessageAnswer
        buf.extend_from_slice(body);
        Packet::from_bytes(buf).unwrap()
    }

    #[test]
    fn test_decode_answer_dismissed_is_end_chat() {
        let p = answer_packet(&[1, 0]); // ask-yes-no, answered=false
        let answer = decode_script_answer(&mut p.reader()).unwrap();
        assert_eq!(answer, ScriptAnswer::EndChat);
    }

    #[test]
    fn test_decode_answer_yes_no() {
        let p = answer_packet(&[1, 1, 1]);
        let answer = decode_script_answer(&mut p.reader()).unwrap();
        assert_eq!(answer, ScriptAnswer::YesNo(true));
    }

    #[test]
    fn test_decode_answer_text() {
        let p = answer_packet(&[2, 1, 2, 0, b'h', b'i']);
        let answer = decode_script_answer(&mut p.reader()).unwrap();
        assert_eq!(answer, ScriptAnswer::Text("hi".into()));
    }

    #[test]
    fn test_decode_answer_menu() {
        let p = answer_packet(&[3, 1, 5, 0, 0, 0]);
        let answer = decode_script_answer(&mut p.reader()).unwrap();
        assert_eq!(answer, ScriptAnswer::Menu(5));
    }

    #[test]
    fn test_decode_answer_unknown_kind_is_error() {
        let p = answer_packet(&[9, 1]);
        assert!(matches!(
            decode_script_answer(&mut p.reader()),
            Err(SessionError::UnexpectedAnswer { .. })
        ));
    }

    #[test]
    fn test_decode_answer_truncated_value_is_error() {
        let p = answer_packet(&[3, 1, 5, 0]); // menu pick cut short
        assert!(matches!(
            decode_script_answer(&mut p.reader()),
            Err(SessionError::Packet(_))
        ));
    }
}
