//! Scripted NPC conversations.
//!
//! A conversation is a spawned script task that talks to the client in
//! lockstep: each [`Speaker`] step sends one script message and then
//! suspends until the client's answer (or the conversation's end)
//! arrives. The owning user keeps at most one conversation in flight
//! and can abort it at any await point.

use fieldlink_packet::{PacketWriter, SendOp};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

use crate::{FieldUser, SessionError};
use std::sync::Arc;

/// Script step kinds, also the wire tag of the script message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScriptMessageKind {
    /// Plain text with a "next" button.
    Say = 0,
    /// Yes/no question.
    AskYesNo = 1,
    /// Free-text input.
    AskText = 2,
    /// Numbered menu selection.
    AskMenu = 3,
}

impl TryFrom<u8> for ScriptMessageKind {
    type Error = SessionError;

    fn try_from(value: u8) -> Result<Self, SessionError> {
        match value {
            0 => Ok(Self::Say),
            1 => Ok(Self::AskYesNo),
            2 => Ok(Self::AskText),
            3 => Ok(Self::AskMenu),
            _ => Err(SessionError::UnexpectedAnswer {
                expected: "known script message kind",
            }),
        }
    }
}

/// A client's reply to one script step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAnswer {
    /// Acknowledged a [`ScriptMessageKind::Say`] step.
    Proceed,
    /// Answered a yes/no question.
    YesNo(bool),
    /// Submitted free text.
    Text(String),
    /// Picked a menu entry.
    Menu(i32),
    /// Dismissed the dialog; ends the conversation.
    EndChat,
}

/// How a conversation task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationOutcome {
    /// The script ran to completion.
    Completed,
    /// The script returned an error or panicked.
    Faulted,
    /// The conversation was aborted (end-chat, disconnect, or an
    /// explicit cancel).
    Cancelled,
}

/// The user-side record of an in-flight conversation.
pub(crate) struct ConversationContext {
    pub(crate) abort: AbortHandle,
    pub(crate) answers: mpsc::UnboundedSender<ScriptAnswer>,
}

/// Awaitable completion of a started conversation.
#[derive(Debug)]
pub struct ConversationHandle {
    pub(crate) done: oneshot::Receiver<ConversationOutcome>,
}

impl ConversationHandle {
    /// Waits for the conversation to finish. Post-conversation cleanup
    /// (slot release, stat resync) has already run when this returns.
    pub async fn outcome(self) -> ConversationOutcome {
        self.done.await.unwrap_or(ConversationOutcome::Faulted)
    }
}

/// The script's view of its conversation: send a step, await the answer.
///
/// Every step suspends the script until the client replies. A `recv`
/// returning `None` means the conversation ended underneath the script;
/// the step surfaces that as [`SessionError::ConversationEnded`] so the
/// script unwinds through its `?` chain.
pub struct Speaker {
    user: Arc<FieldUser>,
    npc_template: i32,
    answers: mpsc::UnboundedReceiver<ScriptAnswer>,
}

impl Speaker {
    pub(crate) fn new(
        user: Arc<FieldUser>,
        npc_template: i32,
        answers: mpsc::UnboundedReceiver<ScriptAnswer>,
    ) -> Self {
        Self {
            user,
            npc_template,
            answers,
        }
    }

    /// The user this conversation belongs to.
    pub fn user(&self) -> &Arc<FieldUser> {
        &self.user
    }

    /// Shows text with a "next" button and waits for acknowledgement.
    pub async fn say(&mut self, text: &str) -> Result<(), SessionError> {
        match self.step(ScriptMessageKind::Say, |w| {
            w.write_string(text);
        })
        .await?
        {
            ScriptAnswer::Proceed => Ok(()),
            _ => Err(SessionError::UnexpectedAnswer {
                expected: "proceed",
            }),
        }
    }

    /// Asks a yes/no question.
    pub async fn ask_yes_no(&mut self, text: &str) -> Result<bool, SessionError> {
        match self.step(ScriptMessageKind::AskYesNo, |w| {
            w.write_string(text);
        })
        .await?
        {
            ScriptAnswer::YesNo(answer) => Ok(answer),
            _ => Err(SessionError::UnexpectedAnswer { expected: "yes/no" }),
        }
    }

    /// Asks for free text, pre-filling `default`.
    pub async fn ask_text(
        &mut self,
        text: &str,
        default: &str,
    ) -> Result<String, SessionError> {
        match self.step(ScriptMessageKind::AskText, |w| {
            w.write_string(text).write_string(default);
        })
        .await?
        {
            ScriptAnswer::Text(answer) => Ok(answer),
            _ => Err(SessionError::UnexpectedAnswer { expected: "text" }),
        }
    }

    /// Shows a menu (items embedded in `text`) and waits for a pick.
    pub async fn ask_menu(&mut self, text: &str) -> Result<i32, SessionError> {
        match self.step(ScriptMessageKind::AskMenu, |w| {
            w.write_string(text);
        })
        .await?
        {
            ScriptAnswer::Menu(selection) => Ok(selection),
            _ => Err(SessionError::UnexpectedAnswer {
                expected: "menu selection",
            }),
        }
    }

    /// Sends one script message and suspends until the answer.
    ///
    /// Layout: u8 kind, i32 npc template, then kind-specific fields.
    async fn step(
        &mut self,
        kind: ScriptMessageKind,
        body: impl FnOnce(&mut PacketWriter),
    ) -> Result<ScriptAnswer, SessionError> {
        let mut w = PacketWriter::new(SendOp::ScriptMessage);
        w.write_u8(kind as u8).write_i32(self.npc_template);
        body(&mut w);
        self.user.send_packet(&w.finish()).await?;

        self.answers
            .recv()
            .await
            .ok_or(SessionError::ConversationEnded)
    }
}
