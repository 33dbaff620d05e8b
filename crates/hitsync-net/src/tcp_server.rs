//! TCP server for accepting client connections and feeding their messages
//! to an [`InboundHandler`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{RwLock, watch};
use tracing::{info, trace, warn};

use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::messages::{Message, Pong, deserialize_message, serialize_message};
use crate::routing::InboundHandler;

/// Unique identifier for a TCP connection within a server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// Atomic generator for monotonically increasing [`ConnectionId`]s.
///
/// Ids are never reused for the lifetime of the generator.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique [`ConnectionId`].
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when the connection map is at capacity.
#[derive(Debug, thiserror::Error)]
#[error("connection limit reached")]
pub struct ConnectionLimitReached;

/// Thread-safe map of active connections keyed by [`ConnectionId`].
///
/// Holding the write half keeps the socket open; removing it closes the
/// client's side once the reader task also ends.
pub struct ConnectionMap {
    inner: RwLock<HashMap<ConnectionId, OwnedWriteHalf>>,
    max_connections: usize,
}

impl ConnectionMap {
    /// Create a new map with the given capacity limit.
    pub fn new(max_connections: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Insert a connection. Returns `Err` if the map is at capacity.
    pub async fn insert(
        &self,
        id: ConnectionId,
        writer: OwnedWriteHalf,
    ) -> Result<(), ConnectionLimitReached> {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_connections {
            return Err(ConnectionLimitReached);
        }
        map.insert(id, writer);
        Ok(())
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, id: &ConnectionId) -> Option<OwnedWriteHalf> {
        self.inner.write().await.remove(id)
    }

    /// Write one frame to a registered connection.
    pub async fn send_frame(
        &self,
        id: &ConnectionId,
        payload: &[u8],
        config: &FrameConfig,
    ) -> Result<(), FrameError> {
        let mut map = self.inner.write().await;
        let writer = map.get_mut(id).ok_or(FrameError::ConnectionClosed)?;
        write_frame(writer, payload, config).await
    }

    /// Return the number of active connections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Return whether the map is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Configuration for [`GameServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to. Default: `0.0.0.0:25565`.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections. Default: 256.
    pub max_connections: usize,
    /// Framing limits applied to every connection.
    pub frame: FrameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 25565)),
            max_connections: 256,
            frame: FrameConfig::default(),
        }
    }
}

/// TCP server that accepts connections, decodes their frames, and forwards
/// each message to the configured [`InboundHandler`] on the connection's own
/// task.
pub struct GameServer {
    config: ServerConfig,
    /// Active connection map (public for test inspection).
    pub connections: Arc<ConnectionMap>,
    id_gen: Arc<IdGenerator>,
    handler: Arc<dyn InboundHandler>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GameServer {
    /// Create a new server with the given configuration and message handler.
    pub fn new(config: ServerConfig, handler: Arc<dyn InboundHandler>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            connections: Arc::new(ConnectionMap::new(config.max_connections)),
            id_gen: Arc::new(IdGenerator::new()),
            config,
            handler,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind to the configured address and run the accept loop.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "listening");
        self.run_with_listener(listener).await
    }

    /// Run the accept loop with a pre-bound listener (useful for tests).
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer_addr) = result?;
                    stream.set_nodelay(true)?;

                    let id = self.id_gen.next_id();
                    let (reader, writer) = stream.into_split();

                    if self.connections.insert(id, writer).await.is_err() {
                        warn!(%peer_addr, limit = self.config.max_connections, "connection limit reached, rejecting");
                        continue;
                    }

                    info!(connection = ?id, %peer_addr, "accepted");

                    let connections = Arc::clone(&self.connections);
                    let handler = Arc::clone(&self.handler);
                    let frame = self.config.frame.clone();
                    let mut task_shutdown = self.shutdown_rx.clone();

                    tokio::spawn(async move {
                        Self::handle_connection(
                            id,
                            reader,
                            &frame,
                            &connections,
                            handler.as_ref(),
                            &mut task_shutdown,
                        )
                        .await;
                        connections.remove(&id).await;
                        handler.on_disconnect(id);
                        info!(connection = ?id, "closed");
                    });
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("listener shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Signal the server to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Per-connection reader loop.
    ///
    /// A frame that fails to decode is logged and skipped; framing errors end
    /// the connection. Pings are answered here and never reach the handler.
    async fn handle_connection(
        id: ConnectionId,
        mut reader: OwnedReadHalf,
        frame: &FrameConfig,
        connections: &ConnectionMap,
        handler: &dyn InboundHandler,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                result = read_frame(&mut reader, frame) => {
                    match result {
                        Ok(payload) if payload.is_empty() => trace!(connection = ?id, "keepalive"),
                        Ok(payload) => match deserialize_message(&payload) {
                            Ok(Message::Ping(ping)) => {
                                let pong = Message::Pong(Pong {
                                    timestamp_ms: ping.timestamp_ms,
                                    sequence: ping.sequence,
                                });
                                let sent = match serialize_message(&pong) {
                                    Ok(bytes) => connections.send_frame(&id, &bytes, frame).await,
                                    Err(e) => {
                                        warn!(connection = ?id, "cannot encode pong: {e}");
                                        Ok(())
                                    }
                                };
                                if let Err(e) = sent {
                                    warn!(connection = ?id, "pong not sent: {e}");
                                    break;
                                }
                            }
                            Ok(message) => handler.on_message(id, message),
                            Err(e) => {
                                warn!(connection = ?id, "skipping undecodable frame: {e}");
                            }
                        },
                        Err(FrameError::ConnectionClosed) => break,
                        Err(e) => {
                            warn!(connection = ?id, "framing error: {e}");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{LoginRequest, Ping};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<(ConnectionId, Message)>>,
        closed: Mutex<Vec<ConnectionId>>,
    }

    impl InboundHandler for Recorder {
        fn on_message(&self, connection: ConnectionId, message: Message) {
            self.messages.lock().unwrap().push((connection, message));
        }

        fn on_disconnect(&self, connection: ConnectionId) {
            self.closed.lock().unwrap().push(connection);
        }
    }

    /// Helper: start a server on an ephemeral port and return the bound address.
    async fn start_test_server(
        max_connections: usize,
    ) -> (SocketAddr, Arc<GameServer>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            max_connections,
            frame: FrameConfig::default(),
        };
        let server = Arc::new(GameServer::new(config, recorder.clone()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let srv = Arc::clone(&server);
        tokio::spawn(async move {
            srv.run_with_listener(listener).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        (addr, server, recorder)
    }

    fn login_frame(name: &str) -> Vec<u8> {
        serialize_message(&Message::LoginRequest(LoginRequest {
            player_name: name.to_string(),
        }))
        .unwrap()
    }

    fn ping_frame(sequence: u32) -> Vec<u8> {
        serialize_message(&Message::Ping(Ping {
            timestamp_ms: 1234,
            sequence,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_frames_reach_handler_in_order() {
        let (addr, _server, recorder) = start_test_server(16).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let config = FrameConfig::default();

        write_frame(&mut stream, &login_frame("first"), &config).await.unwrap();
        write_frame(&mut stream, &login_frame("second"), &config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let messages = recorder.messages.lock().unwrap().clone();
        let names: Vec<String> = messages
            .iter()
            .filter_map(|(_, m)| match m {
                Message::LoginRequest(login) => Some(login.player_name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_ping_answered_with_pong() {
        let (addr, _server, recorder) = start_test_server(16).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let config = FrameConfig::default();

        write_frame(&mut stream, &ping_frame(9), &config).await.unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(1), read_frame(&mut stream, &config))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            deserialize_message(&reply).unwrap(),
            Message::Pong(Pong {
                timestamp_ms: 1234,
                sequence: 9,
            })
        );
        assert!(recorder.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_frame_to_unknown_connection_fails() {
        let map = ConnectionMap::new(4);
        let result = map
            .send_frame(&ConnectionId(77), b"x", &FrameConfig::default())
            .await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_skipped() {
        let (addr, server, recorder) = start_test_server(16).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let config = FrameConfig::default();

        write_frame(&mut stream, &[99, 1, 2, 3], &config).await.unwrap();
        write_frame(&mut stream, &login_frame("after"), &config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(recorder.messages.lock().unwrap().len(), 1);
        assert_eq!(server.connections.len().await, 1);
    }

    #[tokio::test]
    async fn test_disconnect_notifies_handler() {
        let (addr, server, recorder) = start_test_server(16).await;
        let stream = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.connections.len().await, 1);

        drop(stream);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(recorder.closed.lock().unwrap().len(), 1);
        assert!(server.connections.is_empty().await);
    }

    #[tokio::test]
    async fn test_max_connections_enforced() {
        let max = 2;
        let (addr, server, _recorder) = start_test_server(max).await;

        let _c1 = TcpStream::connect(addr).await.unwrap();
        let _c2 = TcpStream::connect(addr).await.unwrap();
        let _c3 = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(server.connections.len().await <= max);
    }

    #[tokio::test]
    async fn test_graceful_shutdown_closes_connections() {
        let (addr, server, recorder) = start_test_server(16).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        server.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "Client should receive EOF after server shutdown");
        assert_eq!(recorder.closed.lock().unwrap().len(), 1);

        // Writing after shutdown must not panic the server side.
        let _ = stream.write_all(&login_frame("late")).await;
    }

    #[test]
    fn test_connection_id_uniqueness() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.next_id();
        let id2 = id_gen.next_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.0 + 1, id2.0);
    }
}
