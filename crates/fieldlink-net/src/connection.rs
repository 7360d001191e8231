//! The per-connection transport object and its read-loop driver.
//!
//! Wire framing, outermost layer first:
//!
//! ```text
//! [tag u16][len u16][ciphertext: len bytes]
//! ```
//!
//! `tag` is the clear-text sequence proof from [`RollingCipher::header_tag`];
//! `len` is the ciphertext length. The very first frame on a connection is
//! the plaintext hello (tag 0) carrying the cipher seeds, after which every
//! frame in each direction is encrypted under that direction's rolling key.

use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use fieldlink_packet::Packet;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

use crate::{ConnectionId, NetError, RollingCipher, Socket};

/// Frame header size: tag (u16) + length (u16).
pub const FRAME_HEADER_LEN: usize = 4;

/// Hello/protocol version sent in the plaintext handshake frame.
pub const HELLO_VERSION: i16 = 1;

/// Largest frame body the transport accepts.
const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Per-connection transport settings, fixed at accept time.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Seed for the server→client cipher (the peer's receive cipher).
    pub send_seed: u32,
    /// Seed for the client→server cipher (the peer's send cipher).
    pub recv_seed: u32,
    /// Read-only connections decode normally but suppress every outbound
    /// packet. Used for diagnostic and replay sessions.
    pub read_only: bool,
    /// Depth of the outbound frame queue. A full queue means the
    /// connection is not writable and sends are dropped.
    pub send_queue_depth: usize,
}

impl ConnectionConfig {
    /// Generates fresh random cipher seeds for a newly accepted peer.
    pub fn generate(read_only: bool, send_queue_depth: usize) -> Self {
        let mut rng = rand::rng();
        Self {
            send_seed: rng.random(),
            recv_seed: rng.random(),
            read_only,
            send_queue_depth,
        }
    }
}

/// Identity and cipher state of one network peer.
///
/// Each direction's cipher (sequence counter included) lives behind its
/// own mutex, held only for the counter-update-and-transform step. The
/// two directions never contend with each other.
pub struct Connection {
    id: ConnectionId,
    read_only: bool,
    send: Mutex<RollingCipher>,
    recv: Mutex<RollingCipher>,
    outbound: mpsc::Sender<Vec<u8>>,
    shutdown_tx: StdMutex<Option<oneshot::Sender<()>>>,
    shutdown_rx: StdMutex<Option<oneshot::Receiver<()>>>,
}

impl Connection {
    /// Builds a connection around an outbound frame queue.
    ///
    /// The queue's consumer (the writer task) is the caller's to run —
    /// tests drive it directly with a bare channel receiver.
    pub fn new(
        id: ConnectionId,
        outbound: mpsc::Sender<Vec<u8>>,
        config: &ConnectionConfig,
    ) -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            id,
            read_only: config.read_only,
            send: Mutex::new(RollingCipher::new(config.send_seed)),
            recv: Mutex::new(RollingCipher::new(config.recv_seed)),
            outbound,
            shutdown_tx: StdMutex::new(Some(tx)),
            shutdown_rx: StdMutex::new(Some(rx)),
        }
    }

    /// This connection's identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether outbound effects are suppressed.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Encodes, encrypts, and queues a packet for transmission.
    ///
    /// Best-effort by contract: if the outbound queue is full the packet
    /// is dropped silently — no error, no retry, no log — and the send
    /// sequence does not advance. On a writable connection the sequence
    /// advances exactly once per call. Read-only connections drop
    /// everything before touching the counter.
    pub async fn send_packet(&self, packet: &Packet) -> Result<(), NetError> {
        if self.read_only {
            return Ok(());
        }

        let mut cipher = self.send.lock().await;
        let permit = match self.outbound.try_reserve() {
            Ok(permit) => permit,
            Err(TrySendError::Full(())) => return Ok(()),
            Err(TrySendError::Closed(())) => return Err(NetError::Closed),
        };

        let mut body = packet.as_bytes().to_vec();
        cipher.apply(&mut body);

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
        frame.extend_from_slice(&cipher.header_tag().to_le_bytes());
        frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
        frame.extend_from_slice(&body);

        cipher.advance();
        permit.send(frame);
        Ok(())
    }

    /// Validates and decrypts one inbound frame body.
    ///
    /// The tag must match the tag derived from the local receive
    /// sequence; a mismatch is a permanent desync and the counter is left
    /// untouched (the connection is dead either way). On success the
    /// receive sequence has advanced before the packet is handed to any
    /// handler.
    pub async fn decode_frame(
        &self,
        tag: u16,
        mut body: Vec<u8>,
    ) -> Result<Packet, NetError> {
        let mut cipher = self.recv.lock().await;
        let expected = cipher.header_tag();
        if tag != expected {
            return Err(NetError::CipherDesync { expected, got: tag });
        }
        cipher.apply(&mut body);
        cipher.advance();
        drop(cipher);

        Ok(Packet::from_bytes(body)?)
    }

    /// Current send-direction sequence value.
    pub async fn seq_send(&self) -> u32 {
        self.send.lock().await.seq()
    }

    /// Current receive-direction sequence value.
    pub async fn seq_recv(&self) -> u32 {
        self.recv.lock().await.seq()
    }

    /// Requests asynchronous teardown. Returns immediately; the driver
    /// observes the signal, stops reading, and fires the socket's
    /// `on_disconnect`. Idempotent.
    pub fn disconnect(&self) {
        if let Some(tx) = self.shutdown_tx.lock().expect("shutdown lock").take() {
            tracing::debug!(id = %self.id, "disconnect requested");
            let _ = tx.send(());
        }
    }

    fn take_shutdown_signal(&self) -> Option<oneshot::Receiver<()>> {
        self.shutdown_rx.lock().expect("shutdown lock").take()
    }
}

/// Splits a raw frame header into (tag, body length).
pub fn parse_header(header: [u8; FRAME_HEADER_LEN]) -> (u16, usize) {
    let tag = u16::from_le_bytes([header[0], header[1]]);
    let len = u16::from_le_bytes([header[2], header[3]]) as usize;
    (tag, len)
}

/// Builds the plaintext hello frame carrying the cipher seeds.
///
/// Tag 0, then: version i16, server-send seed u32, server-recv seed u32.
/// The client mirrors the seeds: its receive cipher is built from the
/// server-send seed and its send cipher from the server-recv seed.
fn hello_frame(config: &ConnectionConfig) -> Vec<u8> {
    let mut body = Vec::with_capacity(10);
    body.extend_from_slice(&HELLO_VERSION.to_le_bytes());
    body.extend_from_slice(&config.send_seed.to_le_bytes());
    body.extend_from_slice(&config.recv_seed.to_le_bytes());

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&0u16.to_le_bytes());
    frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
    frame.extend_from_slice(&body);
    frame
}

/// Reads and parses the hello frame from the client side.
///
/// Returns (version, server-send seed, server-recv seed). Used by client
/// implementations and the integration tests.
pub async fn read_hello<R: AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<(i16, u32, u32), NetError> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let (tag, len) = parse_header(header);
    if tag != 0 || len != 10 {
        return Err(NetError::BadHello(format!(
            "tag {tag:#06x}, length {len}"
        )));
    }
    let mut body = [0u8; 10];
    stream.read_exact(&mut body).await?;
    let version = i16::from_le_bytes([body[0], body[1]]);
    let send_seed = u32::from_le_bytes([body[2], body[3], body[4], body[5]]);
    let recv_seed = u32::from_le_bytes([body[6], body[7], body[8], body[9]]);
    Ok((version, send_seed, recv_seed))
}

/// Wraps an accepted TCP stream: sends the hello, spawns the writer task,
/// and returns the connection plus the driver for its read loop.
pub async fn spawn(
    stream: TcpStream,
    id: ConnectionId,
    config: ConnectionConfig,
) -> Result<(Arc<Connection>, ConnectionDriver), NetError> {
    let (read_half, mut write_half) = stream.into_split();

    write_half.write_all(&hello_frame(&config)).await?;

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(config.send_queue_depth.max(1));
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = write_half.write_all(&frame).await {
                tracing::debug!(error = %e, "writer task stopping");
                break;
            }
        }
    });

    let conn = Arc::new(Connection::new(id, tx, &config));
    let driver = ConnectionDriver {
        conn: Arc::clone(&conn),
        read_half,
    };
    Ok((conn, driver))
}

/// Owns a connection's read half and runs its frame loop.
///
/// One driver per connection, consumed by [`run`](Self::run) inside the
/// connection's own task. Packets reach the socket strictly in arrival
/// order because this is the only consumer of the stream.
pub struct ConnectionDriver {
    conn: Arc<Connection>,
    read_half: OwnedReadHalf,
}

impl ConnectionDriver {
    /// Reads frames until EOF, fatal fault, or a `disconnect()` request,
    /// then fires `on_disconnect` exactly once.
    pub async fn run<S: Socket>(mut self, socket: Arc<S>) {
        let mut shutdown = match self.conn.take_shutdown_signal() {
            Some(rx) => rx,
            // A second driver for the same connection is a programming
            // error; refuse to double-deliver lifecycle events.
            None => {
                tracing::error!(id = %self.conn.id, "driver started twice");
                return;
            }
        };

        loop {
            let frame = tokio::select! {
                _ = &mut shutdown => break,
                frame = read_frame(&mut self.read_half) => frame,
            };

            let (tag, body) = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::debug!(id = %self.conn.id, "peer closed cleanly");
                    break;
                }
                Err(e) => {
                    socket.on_error(&e).await;
                    break;
                }
            };

            let packet = match self.conn.decode_frame(tag, body).await {
                Ok(packet) => packet,
                Err(e) => {
                    socket.on_error(&e).await;
                    if e.is_fatal() {
                        break;
                    }
                    continue;
                }
            };

            if let Err(e) = socket.on_packet(packet).await {
                // Handler faults are isolated to the offending packet;
                // the stream itself is still in sync.
                tracing::warn!(id = %self.conn.id, error = %e, "packet handler failed");
            }
        }

        socket.on_disconnect().await;
        tracing::debug!(id = %self.conn.id, "connection driver stopped");
    }
}

/// Reads one frame. `Ok(None)` is a clean EOF at a frame boundary.
async fn read_frame<R: AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<Option<(u16, Vec<u8>)>, NetError> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    match stream.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    }

    let (tag, len) = parse_header(header);
    if len > MAX_FRAME_LEN {
        return Err(NetError::FrameTooLong(len));
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(Some((tag, body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlink_packet::{PacketWriter, SendOp};

    fn config(send_seed: u32, recv_seed: u32) -> ConnectionConfig {
        ConnectionConfig {
            send_seed,
            recv_seed,
            read_only: false,
            send_queue_depth: 8,
        }
    }

    fn packet() -> Packet {
        let mut w = PacketWriter::new(SendOp::Message);
        w.write_string("ping");
        w.finish()
    }

    #[tokio::test]
    async fn test_send_packet_writable_advances_seq_once_per_call() {
        let (tx, mut rx) = mpsc::channel(8);
        let conn = Connection::new(ConnectionId::new(1), tx, &config(100, 200));

        let seq0 = conn.seq_send().await;
        conn.send_packet(&packet()).await.unwrap();
        conn.send_packet(&packet()).await.unwrap();

        assert_eq!(conn.seq_send().await, seq0.wrapping_add(2));
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_send_packet_unwritable_drops_silently_without_seq_advance() {
        // Queue depth 1 with no consumer: the first send fills it, the
        // second hits backpressure.
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new(ConnectionId::new(1), tx, &config(100, 200));

        conn.send_packet(&packet()).await.unwrap();
        let seq_after_first = conn.seq_send().await;

        conn.send_packet(&packet()).await.unwrap();
        assert_eq!(conn.seq_send().await, seq_after_first);
    }

    #[tokio::test]
    async fn test_send_packet_closed_queue_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let conn = Connection::new(ConnectionId::new(1), tx, &config(100, 200));

        assert!(matches!(
            conn.send_packet(&packet()).await,
            Err(NetError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_send_packet_read_only_suppresses_everything() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut cfg = config(100, 200);
        cfg.read_only = true;
        let conn = Connection::new(ConnectionId::new(1), tx, &cfg);

        let seq0 = conn.seq_send().await;
        conn.send_packet(&packet()).await.unwrap();

        assert_eq!(conn.seq_send().await, seq0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_frame_round_trips_between_mirrored_connections() {
        // Server sends with seed S; client receives with seed S.
        let (server_tx, mut server_rx) = mpsc::channel(8);
        let server =
            Connection::new(ConnectionId::new(1), server_tx, &config(111, 222));
        let (client_tx, _client_rx) = mpsc::channel(8);
        let client =
            Connection::new(ConnectionId::new(2), client_tx, &config(222, 111));

        let original = packet();
        server.send_packet(&original).await.unwrap();
        let frame = server_rx.recv().await.unwrap();

        let (tag, len) = parse_header(frame[..4].try_into().unwrap());
        assert_eq!(len, frame.len() - FRAME_HEADER_LEN);

        let decoded = client
            .decode_frame(tag, frame[4..].to_vec())
            .await
            .unwrap();
        assert_eq!(decoded, original);
    }

    #[tokio::test]
    async fn test_decode_frame_advances_recv_seq_before_delivery() {
        let (tx, mut rx) = mpsc::channel(8);
        let server = Connection::new(ConnectionId::new(1), tx, &config(5, 6));
        let (tx2, _rx2) = mpsc::channel(8);
        let client = Connection::new(ConnectionId::new(2), tx2, &config(6, 5));

        server.send_packet(&packet()).await.unwrap();
        let frame = server_rx_frame(&mut rx).await;
        let (tag, _) = parse_header(frame[..4].try_into().unwrap());

        let seq0 = client.seq_recv().await;
        client.decode_frame(tag, frame[4..].to_vec()).await.unwrap();
        assert_eq!(client.seq_recv().await, seq0.wrapping_add(1));
    }

    #[tokio::test]
    async fn test_decode_frame_bad_tag_is_cipher_desync() {
        let (tx, _rx) = mpsc::channel(8);
        let conn = Connection::new(ConnectionId::new(1), tx, &config(1, 2));

        let err = conn
            .decode_frame(0xBEEF, vec![0, 0, 0, 0])
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::CipherDesync { got: 0xBEEF, .. }));
        assert!(err.is_fatal());
        // Counter untouched: desync never half-consumes a frame.
        assert_eq!(conn.seq_recv().await, 2);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (tx, _rx) = mpsc::channel(8);
        let conn = Connection::new(ConnectionId::new(1), tx, &config(1, 2));
        conn.disconnect();
        conn.disconnect(); // second call is a no-op
    }

    async fn server_rx_frame(rx: &mut mpsc::Receiver<Vec<u8>>) -> Vec<u8> {
        rx.recv().await.expect("frame queued")
    }
}
