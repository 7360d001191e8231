//! Non-scripted dialogs (shops, storage, trade windows).
//!
//! A dialog differs from a conversation: it has no server-side script
//! task waiting on answers, just an open/closed state the session
//! tracks so the client can only have one surface open at a time.

use futures_util::future::BoxFuture;

use crate::{FieldUser, SessionError};

/// A UI surface the user can have open.
///
/// Boxed futures keep the trait object-safe so heterogeneous dialogs
/// can share the session's single dialog slot.
pub trait Dialog: Send + Sync + 'static {
    /// Opens the dialog against the user, sending whatever packets the
    /// surface needs. Returns `false` to decline opening (for example a
    /// shop out of stock range), in which case the slot stays free.
    fn enter<'a>(
        &'a self,
        user: &'a FieldUser,
    ) -> BoxFuture<'a, Result<bool, SessionError>>;
}
