//! Session layer for Fieldlink: the per-connection player actor.
//!
//! A [`GameSession`] implements the transport's socket hooks and owns a
//! [`FieldUser`] once the client has a character. The user actor holds
//! live character state, the layered stat model, field placement, and
//! the two client-surface mechanisms:
//!
//! - **Conversations** ([`FieldUser::start_conversation`]): scripted
//!   NPC dialog driven by a spawned task, one in flight per user,
//!   cancellable at any step.
//! - **Dialogs** ([`FieldUser::interact`]): stateful UI surfaces
//!   (shops, storage) that occupy a single slot until closed.
//!
//! State mutation flows through `modify_*` methods so every change
//! revalidates derived stats and notifies the client exactly once.

mod character;
mod conversation;
mod dialog;
mod error;
mod message;
mod object;
mod socket;
mod stats;
mod user;

pub use character::{CashEquip, Character, CoupleRecord, FriendRecord};
pub use conversation::{
    ConversationHandle, ConversationOutcome, ScriptAnswer, ScriptMessageKind,
    Speaker,
};
pub use dialog::Dialog;
pub use error::SessionError;
pub use message::{Message, NoticeMessage, SystemMessage};
pub use object::{Field, FieldObject};
pub use socket::GameSession;
pub use stats::{
    BasicStat, ForcedStat, TemporaryStat, TemporaryStatEntry, TemporaryStatKind,
    TemporaryStatMutation, UserStats,
};
pub use user::{FieldUser, GameInfo};
