//! # Fieldlink
//!
//! A persistent-connection game server core. The facade ties the layers
//! together:
//!
//! - `fieldlink-packet` — positional binary packet codec
//! - `fieldlink-net` — framed, enciphered TCP transport
//! - `fieldlink-session` — the per-connection player actor
//! - `fieldlink-provider` — read-only game content tree
//! - `fieldlink-tick` — fixed-rate update scheduling
//!
//! A minimal server is a [`ServerConfig`], a [`CharacterSource`], and a
//! call to [`GameServer::run`]:
//!
//! ```rust,no_run
//! use fieldlink::{CharacterSource, GameServer, ServerConfig};
//!
//! # async fn run(source: impl CharacterSource) -> Result<(), fieldlink::FieldlinkError> {
//! fieldlink::init_tracing();
//! let server = GameServer::bind(ServerConfig::default(), source).await?;
//! server.run().await
//! # }
//! ```

#![allow(async_fn_in_trait)]

mod config;
mod error;
mod server;

pub use config::ServerConfig;
pub use error::FieldlinkError;
pub use server::{CharacterSource, GameServer};

// The pieces most servers touch, re-exported so simple deployments
// depend on the facade alone.
pub use fieldlink_net::{Connection, ConnectionId, NetError, Socket, SocketRegistry};
pub use fieldlink_packet::{
    Packet, PacketReader, PacketWriter, Point, RecvOp, SendOp,
};
pub use fieldlink_provider::{
    DataNode, DataProvider, DataValue, InMemoryProvider, ProviderError,
    TemplateCollection,
};
pub use fieldlink_session::{
    Character, ConversationHandle, ConversationOutcome, Dialog, Field,
    FieldObject, FieldUser, GameInfo, GameSession, Message, NoticeMessage,
    ScriptAnswer, SessionError, Speaker, SystemMessage, TemporaryStatKind,
};
pub use fieldlink_tick::{TickConfig, Ticker, Updateable, UpdateLoop};

/// Installs the default tracing subscriber: compact format, filtered by
/// `RUST_LOG` with an `info` fallback. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
