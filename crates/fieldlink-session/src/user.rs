//! The per-connection player actor.
//!
//! A [`FieldUser`] owns one character's live state and the packet
//! builders that project it to clients. Interior state lives behind std
//! mutexes with a fixed acquisition order (conversation, character,
//! stats, movement, dialog — any prefix is fine, never a reversal) and
//! no lock is ever held across an await.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::SystemTime;

use fieldlink_net::Connection;
use fieldlink_packet::{Packet, PacketWriter, Point, SendOp};
use fieldlink_tick::Updateable;
use tokio::sync::{mpsc, oneshot};

use crate::conversation::ConversationContext;
use crate::{
    Character, ConversationHandle, ConversationOutcome, Dialog, Field,
    FieldObject, Message, ScriptAnswer, SessionError, Speaker, SystemMessage,
    TemporaryStatMutation, UserStats,
};

/// Identity of the game instance a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameInfo {
    /// Zone (channel) identity within the world.
    pub zone_id: i32,
    /// World identity.
    pub world_id: i32,
}

#[derive(Debug, Default)]
struct Movement {
    position: Point,
    foothold: i16,
}

/// One online player: character state, stat layers, movement, and the
/// conversation/dialog surfaces, all bound to a single connection.
pub struct FieldUser {
    conn: Arc<Connection>,
    game: GameInfo,
    character: StdMutex<Character>,
    stats: StdMutex<UserStats>,
    movement: StdMutex<Movement>,
    move_action: AtomicU8,
    object_id: AtomicI32,
    field: StdMutex<Option<Arc<Field>>>,
    // First SetField must carry the full character payload; later ones
    // carry the lightweight revisit form.
    instantiated: AtomicBool,
    conversation: StdMutex<Option<ConversationContext>>,
    dialog: StdMutex<Option<Arc<dyn Dialog>>>,
}

impl FieldUser {
    /// Binds a character to a connection. Derived stats are valid from
    /// the start.
    pub fn new(conn: Arc<Connection>, game: GameInfo, character: Character) -> Self {
        let mut character = character;
        let mut stats = UserStats::default();
        stats.validate(&mut character);

        Self {
            conn,
            game,
            character: StdMutex::new(character),
            stats: StdMutex::new(stats),
            movement: StdMutex::new(Movement::default()),
            move_action: AtomicU8::new(0),
            object_id: AtomicI32::new(0),
            field: StdMutex::new(None),
            instantiated: AtomicBool::new(false),
            conversation: StdMutex::new(None),
            dialog: StdMutex::new(None),
        }
    }

    /// The transport underneath this user.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// The game instance this user is attached to.
    pub fn game(&self) -> GameInfo {
        self.game
    }

    /// The character's display name.
    pub fn name(&self) -> String {
        self.character.lock().expect("character lock").name.clone()
    }

    /// The character's database identity.
    pub fn character_id(&self) -> i32 {
        self.character.lock().expect("character lock").id
    }

    /// Reads the character under its lock.
    pub fn with_character<R>(&self, f: impl FnOnce(&Character) -> R) -> R {
        f(&self.character.lock().expect("character lock"))
    }

    /// Queues a packet on this user's connection. Inherits the
    /// transport's best-effort contract: a saturated connection drops
    /// the packet without error.
    pub async fn send_packet(&self, packet: &Packet) -> Result<(), SessionError> {
        self.conn.send_packet(packet).await.map_err(SessionError::from)
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Shows a system line in the user's chat log.
    pub async fn message(&self, text: &str) -> Result<(), SessionError> {
        self.message_with(&SystemMessage::new(text)).await
    }

    /// Shows an arbitrary message in the user's chat log.
    pub async fn message_with(&self, message: &dyn Message) -> Result<(), SessionError> {
        let mut w = PacketWriter::new(SendOp::Message);
        message.encode(&mut w);
        self.send_packet(&w.finish()).await
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    /// Mutates character/stat state, revalidates the derived block, and
    /// sends one stat-change notification. `excl_request` acknowledges a
    /// client-side exclusive request (dialogs, conversations) and
    /// releases the client's input lock.
    pub async fn modify_stats<F>(
        &self,
        excl_request: bool,
        mutate: F,
    ) -> Result<(), SessionError>
    where
        F: FnOnce(&mut Character, &mut UserStats),
    {
        {
            let mut character = self.character.lock().expect("character lock");
            let mut stats = self.stats.lock().expect("stats lock");
            mutate(&mut character, &mut stats);
            stats.validate(&mut character);
        }

        // Layout: bool excl ack, i32 changed-stat mask (0 = pure resync).
        let mut w = PacketWriter::new(SendOp::StatChanged);
        w.write_bool(excl_request).write_i32(0);
        self.send_packet(&w.finish()).await
    }

    /// Mutates the temporary stat layer and notifies the client with at
    /// most one reset batch and one set batch, in that order. Kinds
    /// touched in the same call never produce more than one notification
    /// per direction.
    pub async fn modify_temporary_stat<F>(&self, mutate: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut TemporaryStatMutation<'_>),
    {
        use crate::TemporaryStatKind;

        let (reset_packet, set_packet) = {
            let mut character = self.character.lock().expect("character lock");
            let mut stats = self.stats.lock().expect("stats lock");

            let mut mutation = TemporaryStatMutation::new(&mut stats.temporary);
            mutate(&mut mutation);
            let (set_mask, reset_mask) = mutation.masks();

            let reset_packet = (reset_mask != 0).then(|| {
                let mut w = PacketWriter::new(SendOp::TemporaryStatReset);
                w.write_i32(reset_mask as i32);
                w.finish()
            });

            let set_packet = (set_mask != 0).then(|| {
                let mut w = PacketWriter::new(SendOp::TemporaryStatSet);
                w.write_i32(set_mask as i32);
                for kind in TemporaryStatKind::ALL {
                    if set_mask & kind.bit() != 0 {
                        if let Some(entry) = stats.temporary.get(kind) {
                            w.write_i16(entry.value);
                        }
                    }
                }
                w.finish()
            });

            stats.validate(&mut character);
            (reset_packet, set_packet)
        };

        if let Some(packet) = reset_packet {
            self.send_packet(&packet).await?;
        }
        if let Some(packet) = set_packet {
            self.send_packet(&packet).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Conversations
    // -----------------------------------------------------------------------

    /// Starts a scripted conversation. At most one conversation runs per
    /// user; a second start while one is in flight is refused.
    ///
    /// The script runs in its own task and is aborted wholesale on
    /// cancel. Whatever way it ends, cleanup runs exactly once: the slot
    /// is released and a stat resync re-enables the client's input.
    pub fn start_conversation<F, Fut>(
        self: &Arc<Self>,
        npc_template: i32,
        script: F,
    ) -> Result<ConversationHandle, SessionError>
    where
        F: FnOnce(Speaker) -> Fut,
        Fut: Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        let (answer_tx, answer_rx) = mpsc::unbounded_channel();
        let speaker = Speaker::new(Arc::clone(self), npc_template, answer_rx);

        let task = {
            let mut slot = self.conversation.lock().expect("conversation lock");
            if slot.is_some() {
                return Err(SessionError::ConversationAlreadyActive);
            }
            let task = tokio::spawn(script(speaker));
            *slot = Some(ConversationContext {
                abort: task.abort_handle(),
                answers: answer_tx,
            });
            task
        };

        let (done_tx, done_rx) = oneshot::channel();
        let user = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(Ok(())) => ConversationOutcome::Completed,
                Ok(Err(e)) => {
                    tracing::error!(
                        user = %user.name(),
                        error = %e,
                        "conversation script faulted"
                    );
                    ConversationOutcome::Faulted
                }
                Err(join) if join.is_cancelled() => ConversationOutcome::Cancelled,
                Err(join) => {
                    tracing::error!(
                        user = %user.name(),
                        error = %join,
                        "conversation task panicked"
                    );
                    ConversationOutcome::Faulted
                }
            };
            user.finish_conversation().await;
            let _ = done_tx.send(outcome);
        });

        Ok(ConversationHandle { done: done_rx })
    }

    /// Runs a conversation that produces a value, awaiting its result.
    ///
    /// Cancellation or a script fault surfaces as
    /// [`SessionError::ConversationEnded`].
    pub async fn prompt<T, F, Fut>(
        self: &Arc<Self>,
        npc_template: i32,
        script: F,
    ) -> Result<T, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(Speaker) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, SessionError>> + Send + 'static,
    {
        let (value_tx, mut value_rx) = oneshot::channel();
        let handle = self.start_conversation(npc_template, move |speaker| async move {
            let value = script(speaker).await?;
            let _ = value_tx.send(value);
            Ok(())
        })?;

        match handle.outcome().await {
            ConversationOutcome::Completed => value_rx
                .try_recv()
                .map_err(|_| SessionError::ConversationEnded),
            _ => Err(SessionError::ConversationEnded),
        }
    }

    /// Aborts the in-flight conversation, if any. Cleanup runs in the
    /// conversation's supervisor, so the slot may briefly stay occupied
    /// after this returns.
    pub fn cancel_conversation(&self) {
        let slot = self.conversation.lock().expect("conversation lock");
        if let Some(ctx) = slot.as_ref() {
            ctx.abort.abort();
        }
    }

    /// Routes a client answer to the waiting script step. An end-chat
    /// answer cancels the conversation instead.
    pub fn on_script_answer(&self, answer: ScriptAnswer) {
        if matches!(answer, ScriptAnswer::EndChat) {
            self.cancel_conversation();
            return;
        }
        let slot = self.conversation.lock().expect("conversation lock");
        match slot.as_ref() {
            Some(ctx) => {
                let _ = ctx.answers.send(answer);
            }
            None => {
                tracing::debug!(user = %self.name(), "script answer with no conversation");
            }
        }
    }

    /// Exactly-once tail of every conversation: releases the slot and
    /// resyncs stats so the client's input lock lifts.
    async fn finish_conversation(&self) {
        let had = self
            .conversation
            .lock()
            .expect("conversation lock")
            .take()
            .is_some();
        if !had {
            return;
        }
        if let Err(e) = self.modify_stats(true, |_, _| {}).await {
            tracing::debug!(
                user = %self.name(),
                error = %e,
                "post-conversation resync failed"
            );
        }
    }

    // -----------------------------------------------------------------------
    // Dialogs
    // -----------------------------------------------------------------------

    /// Opens (`close == false`) or closes (`close == true`) a dialog.
    ///
    /// Returns whether the request took effect: opening fails when a
    /// dialog is already up or the dialog declines entry. The slot check
    /// is not held across `enter` — inbound handling for one session is
    /// serialized, so no second open can race it.
    pub async fn interact(
        &self,
        dialog: Arc<dyn Dialog>,
        close: bool,
    ) -> Result<bool, SessionError> {
        if close {
            self.close_dialog();
            return Ok(true);
        }
        if self.has_dialog() {
            return Ok(false);
        }
        if !dialog.enter(self).await? {
            return Ok(false);
        }
        *self.dialog.lock().expect("dialog lock") = Some(dialog);
        Ok(true)
    }

    /// Whether a dialog is currently open.
    pub fn has_dialog(&self) -> bool {
        self.dialog.lock().expect("dialog lock").is_some()
    }

    /// Drops the open dialog, if any.
    pub fn close_dialog(&self) {
        self.dialog.lock().expect("dialog lock").take();
    }

    // -----------------------------------------------------------------------
    // Field placement
    // -----------------------------------------------------------------------

    /// Places the user into a field at a position, assigning a fresh
    /// object identity.
    pub fn place_in(&self, field: &Arc<Field>, position: Point) {
        self.object_id
            .store(field.assign_object_id(), Ordering::Release);
        *self.field.lock().expect("field lock") = Some(Arc::clone(field));
        let mut movement = self.movement.lock().expect("movement lock");
        movement.position = position;
        movement.foothold = 0;
    }

    /// Current movement stance byte.
    pub fn move_action(&self) -> u8 {
        self.move_action.load(Ordering::Relaxed)
    }

    /// Updates the movement stance byte.
    pub fn set_move_action(&self, action: u8) {
        self.move_action.store(action, Ordering::Relaxed);
    }

    /// The foothold (ground segment) the user stands on.
    pub fn foothold(&self) -> i16 {
        self.movement.lock().expect("movement lock").foothold
    }

    /// Updates the foothold.
    pub fn set_foothold(&self, foothold: i16) {
        self.movement.lock().expect("movement lock").foothold = foothold;
    }

    // -----------------------------------------------------------------------
    // Field packets
    // -----------------------------------------------------------------------

    /// Builds the packet that places this client into its field.
    ///
    /// The first call carries the full character payload; later calls
    /// (field-to-field moves) carry the lightweight revisit form.
    ///
    /// Layout: i16 client option, i32 zone id, i32 world id,
    /// bool notifier, bool first entry, i16 notifier loop count, then
    /// the first-entry branch (3× i32 0, character data block, i32 0,
    /// 3× i32 0) or the revisit branch (u8 0, i32 field id, u8 portal,
    /// i32 hp, bool chase), then a trailing i64 0.
    pub fn set_field_packet(&self) -> Packet {
        let first_entry = !self.instantiated.swap(true, Ordering::AcqRel);
        let character = self.character.lock().expect("character lock");

        let mut w = PacketWriter::new(SendOp::SetField);
        w.write_i16(0)
            .write_i32(self.game.zone_id)
            .write_i32(self.game.world_id)
            .write_bool(true)
            .write_bool(first_entry)
            .write_i16(0);

        if first_entry {
            w.write_i32(0).write_i32(0).write_i32(0);
            character.encode_data(&mut w);
            w.write_i32(0);
            w.write_i32(0).write_i32(0).write_i32(0);
        } else {
            w.write_u8(0)
                .write_i32(character.field_id)
                .write_u8(character.field_portal)
                .write_i32(character.hp)
                .write_bool(false);
        }

        w.write_i64(0);
        w.finish()
    }
}

impl FieldObject for FieldUser {
    fn object_id(&self) -> i32 {
        self.object_id.load(Ordering::Acquire)
    }

    fn field(&self) -> Option<Arc<Field>> {
        self.field.lock().expect("field lock").clone()
    }

    fn position(&self) -> Point {
        self.movement.lock().expect("movement lock").position
    }

    fn set_position(&self, position: Point) {
        self.movement.lock().expect("movement lock").position = position;
    }

    /// Layout: i32 object id, u8 level, string name, the guild
    /// placeholder block (string, i16, u8, i16, u8), temporary stat
    /// block (u32 mask + i16 values), i16 job, look block, 6× i32 0,
    /// point position, u8 move action, i16 foothold, u8 0, u8 0,
    /// 3× i32 0, u8 0, bool false, ring record block, u8 0, u8 0,
    /// i32 0.
    fn enter_field_packet(&self) -> Packet {
        let character = self.character.lock().expect("character lock");
        let stats = self.stats.lock().expect("stats lock");
        let movement = self.movement.lock().expect("movement lock");

        let mut w = PacketWriter::new(SendOp::UserEnterField);
        w.write_i32(self.object_id())
            .write_u8(character.level)
            .write_string(&character.name)
            // Guild affiliation is not modeled; the placeholder block
            // keeps the layout stable for clients that expect it.
            .write_string("")
            .write_i16(0)
            .write_u8(0)
            .write_i16(0)
            .write_u8(0);
        stats.temporary.encode_for_remote(&mut w);
        w.write_i16(character.job);
        character.encode_look(&mut w);
        for _ in 0..6 {
            w.write_i32(0);
        }
        w.write_point(movement.position)
            .write_u8(self.move_action())
            .write_i16(movement.foothold)
            .write_u8(0)
            .write_u8(0)
            .write_i32(0)
            .write_i32(0)
            .write_i32(0)
            .write_u8(0)
            .write_bool(false);
        character.encode_record(&mut w);
        w.write_u8(0).write_u8(0).write_i32(0);
        w.finish()
    }

    fn leave_field_packet(&self) -> Packet {
        let mut w = PacketWriter::new(SendOp::UserLeaveField);
        w.write_i32(self.object_id());
        w.finish()
    }
}

impl Updateable for FieldUser {
    /// Per-tick maintenance: lapse temporary stats whose expiry second
    /// has passed. All kinds expiring on the same tick collapse into a
    /// single reset notification.
    async fn on_update(&self, now: SystemTime) {
        let expired = {
            let stats = self.stats.lock().expect("stats lock");
            stats.temporary.expired_kinds(now)
        };
        if expired.is_empty() {
            return;
        }

        tracing::debug!(
            user = %self.name(),
            count = expired.len(),
            "temporary stats expired"
        );
        let result = self
            .modify_temporary_stat(|m| {
                for kind in expired {
                    m.reset(kind);
                }
            })
            .await;
        if let Err(e) = result {
            tracing::debug!(user = %self.name(), error = %e, "stat expiry resync failed");
        }
    }
}
