//! Unified error type for the Fieldlink facade.

use fieldlink_net::NetError;
use fieldlink_provider::ProviderError;
use fieldlink_session::SessionError;

/// Top-level error wrapping every layer's error type.
///
/// Users of the `fieldlink` facade deal with this single type; the
/// `#[from]` impls let `?` lift sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum FieldlinkError {
    /// Listener or stream I/O outside the transport's own handling.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed configuration file.
    #[error(transparent)]
    Config(#[from] serde_json::Error),

    /// Transport-level failure.
    #[error(transparent)]
    Net(#[from] NetError),

    /// Session-level failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Content-provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
