//! The game server: accept loop, session wiring, and the update tick.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use fieldlink_net::{ConnectionConfig, ConnectionId, Socket, SocketRegistry};
use fieldlink_session::{Character, FieldUser, GameInfo, GameSession, SessionError};
use fieldlink_tick::Ticker;
use tokio::net::{TcpListener, TcpStream};

use crate::{FieldlinkError, ServerConfig};

/// Supplies the character a new connection plays as.
///
/// Stands in for the account/character-select flow: production wires
/// this to persistent storage, tests return fixtures.
pub trait CharacterSource: Send + Sync + 'static {
    /// Loads the character for a freshly accepted connection.
    fn character_for(
        &self,
        id: ConnectionId,
    ) -> impl std::future::Future<Output = Result<Character, SessionError>> + Send;
}

/// A running game server instance.
///
/// Owns the listener, the socket registry, and the update ticker. Each
/// accepted connection gets its own task running the transport driver
/// with a [`GameSession`] on top.
pub struct GameServer<S: CharacterSource> {
    listener: TcpListener,
    config: ServerConfig,
    source: Arc<S>,
    registry: Arc<SocketRegistry<GameSession>>,
    next_connection_id: AtomicU64,
}

impl<S: CharacterSource> GameServer<S> {
    /// Binds the listener and prepares the server.
    pub async fn bind(
        config: ServerConfig,
        source: S,
    ) -> Result<Self, FieldlinkError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            zone = config.zone_id,
            world = config.world_id,
            "server bound"
        );
        Ok(Self {
            listener,
            config,
            source: Arc::new(source),
            registry: Arc::new(SocketRegistry::new()),
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// The address the listener actually bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The live-socket registry, shared with the tick loop.
    pub fn registry(&self) -> Arc<SocketRegistry<GameSession>> {
        Arc::clone(&self.registry)
    }

    /// Runs the server: spawns the update tick and accepts connections
    /// until the task is dropped.
    pub async fn run(self) -> Result<(), FieldlinkError> {
        let registry = Arc::clone(&self.registry);
        let mut ticker = Ticker::with_rate(self.config.tick_rate);
        tokio::spawn(async move {
            loop {
                ticker.wait_for_tick().await;
                // Sequential delivery: a socket never sees overlapping
                // updates, and one slow session delays the tick rather
                // than overlapping it.
                for socket in registry.sockets() {
                    socket.on_update().await;
                }
            }
        });

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let id = ConnectionId::new(
                        self.next_connection_id.fetch_add(1, Ordering::Relaxed),
                    );
                    tracing::info!(%id, %peer, "connection accepted");

                    let config = self.config.clone();
                    let source = Arc::clone(&self.source);
                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        let result =
                            handle_connection(stream, id, config, source, registry)
                                .await;
                        if let Err(e) = result {
                            tracing::debug!(%id, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Wires one accepted stream into a full session and drives it to
/// completion.
async fn handle_connection<S: CharacterSource>(
    stream: TcpStream,
    id: ConnectionId,
    config: ServerConfig,
    source: Arc<S>,
    registry: Arc<SocketRegistry<GameSession>>,
) -> Result<(), FieldlinkError> {
    let conn_config =
        ConnectionConfig::generate(config.read_only, config.send_queue_depth);
    let (conn, driver) = fieldlink_net::spawn(stream, id, conn_config).await?;

    let character = source.character_for(id).await?;
    let user = Arc::new(FieldUser::new(
        Arc::clone(&conn),
        GameInfo {
            zone_id: config.zone_id,
            world_id: config.world_id,
        },
        character,
    ));
    let session = Arc::new(GameSession::new(conn));
    session.bind_user(Arc::clone(&user));
    registry.attach(id, Arc::clone(&session));

    // Once attached, every exit path must detach; a failed initial send
    // would otherwise leave a stale session for the tick loop forever.
    let result: Result<(), FieldlinkError> = async {
        user.send_packet(&user.set_field_packet()).await?;
        driver.run(session).await;
        Ok(())
    }
    .await;
    registry.detach(id);
    result
}
