//! TCP transport: connection management, message framing, wire messages, and
//! the hand-off point to inbound message handlers.

pub mod framing;
pub mod messages;
pub mod routing;
pub mod tcp_server;

pub use framing::{FrameConfig, FrameError, read_frame, write_frame};
pub use messages::{
    BlockPlacement, FACE_SENTINEL, HeldItemChange, LoginRequest, Logout, Message, MessageError,
    PROTOCOL_VERSION, Ping, PlayerPosition, PluginMessage, Pong, RegisterChannels,
    deserialize_message, serialize_message,
};
pub use routing::{InboundHandler, IncomingMessage, MessageHandler, MessageRouter, MessageTag};
pub use tcp_server::{
    ConnectionId, ConnectionLimitReached, ConnectionMap, GameServer, IdGenerator, ServerConfig,
};
