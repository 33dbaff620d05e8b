//! Message routing: inbound hand-off from network tasks and tag-keyed
//! dispatch on the consuming side.
//!
//! Network tasks hand every decoded [`Message`] to an [`InboundHandler`].
//! Whatever the handler lets through is later dispatched on the world thread
//! by a [`MessageRouter`], which maps [`MessageTag`] values to handlers that
//! receive the consumer's state `S`.

use std::collections::HashMap;
use std::time::Instant;

use crate::messages::Message;
use crate::tcp_server::ConnectionId;

// ---------------------------------------------------------------------------
// MessageTag
// ---------------------------------------------------------------------------

/// Unique tag identifying a message type, used as the key for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    /// Client login request.
    LoginRequest,
    /// Logout notification.
    Logout,
    /// Plugin channel registration.
    RegisterChannels,
    /// Plugin channel payload.
    PluginMessage,
    /// Player position update.
    PlayerPosition,
    /// Hotbar slot selection.
    HeldItemChange,
    /// Block placement / use item.
    BlockPlacement,
    /// Heartbeat ping.
    Ping,
    /// Heartbeat pong.
    Pong,
}

impl Message {
    /// Extract the routing tag from a message without consuming it.
    pub fn tag(&self) -> MessageTag {
        match self {
            Message::LoginRequest(_) => MessageTag::LoginRequest,
            Message::Logout(_) => MessageTag::Logout,
            Message::RegisterChannels(_) => MessageTag::RegisterChannels,
            Message::PluginMessage(_) => MessageTag::PluginMessage,
            Message::PlayerPosition(_) => MessageTag::PlayerPosition,
            Message::HeldItemChange(_) => MessageTag::HeldItemChange,
            Message::BlockPlacement(_) => MessageTag::BlockPlacement,
            Message::Ping(_) => MessageTag::Ping,
            Message::Pong(_) => MessageTag::Pong,
        }
    }
}

// ---------------------------------------------------------------------------
// Network-side hand-off
// ---------------------------------------------------------------------------

/// Receives decoded messages on the network task that read them.
///
/// Implementations must not block: they run inside the connection's reader
/// loop.
pub trait InboundHandler: Send + Sync {
    /// A complete message arrived on `connection`.
    fn on_message(&self, connection: ConnectionId, message: Message);

    /// The connection closed (EOF, I/O error, or server shutdown).
    fn on_disconnect(&self, connection: ConnectionId);
}

/// Envelope carrying a message, its source connection, and its arrival time.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// The connection that sent this message.
    pub connection_id: ConnectionId,
    /// The deserialized message.
    pub message: Message,
    /// When the network task received it.
    pub received_at: Instant,
}

impl IncomingMessage {
    /// Wrap a message received now.
    pub fn now(connection_id: ConnectionId, message: Message) -> Self {
        Self {
            connection_id,
            message,
            received_at: Instant::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Consumer-side dispatch
// ---------------------------------------------------------------------------

/// Handler invoked with the consumer's state.
pub trait MessageHandler<S: ?Sized>: Send + Sync {
    /// Process a single message.
    fn handle(&self, connection: ConnectionId, msg: Message, state: &mut S);
}

impl<S: ?Sized, F> MessageHandler<S> for F
where
    F: Fn(ConnectionId, Message, &mut S) + Send + Sync,
{
    fn handle(&self, connection: ConnectionId, msg: Message, state: &mut S) {
        self(connection, msg, state);
    }
}

/// Routes messages to registered handlers by [`MessageTag`].
pub struct MessageRouter<S: ?Sized> {
    handlers: HashMap<MessageTag, Box<dyn MessageHandler<S>>>,
}

impl<S: ?Sized> MessageRouter<S> {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a specific message tag, replacing any previous one.
    pub fn register<H: MessageHandler<S> + 'static>(&mut self, tag: MessageTag, handler: H) {
        self.handlers.insert(tag, Box::new(handler));
    }

    /// Route a message to its handler.
    ///
    /// Returns `true` if a handler was found, `false` if the message was
    /// dropped.
    pub fn route(&self, connection: ConnectionId, msg: Message, state: &mut S) -> bool {
        let tag = msg.tag();
        if let Some(handler) = self.handlers.get(&tag) {
            handler.handle(connection, msg, state);
            true
        } else {
            tracing::trace!("No handler registered for {tag:?}, dropping message");
            false
        }
    }

    /// Iterate over registered tags (useful for startup logging).
    pub fn registered_tags(&self) -> impl Iterator<Item = &MessageTag> {
        self.handlers.keys()
    }
}

impl<S: ?Sized> Default for MessageRouter<S> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::*;

    #[derive(Default)]
    struct Counters {
        pings: u32,
        last_name: String,
        from: Option<ConnectionId>,
    }

    fn ping() -> Message {
        Message::Ping(Ping {
            timestamp_ms: 0,
            sequence: 0,
        })
    }

    #[test]
    fn test_message_routed_to_correct_handler() {
        let mut router = MessageRouter::<Counters>::new();
        router.register(MessageTag::Ping, |conn: ConnectionId, _msg: Message, s: &mut Counters| {
            s.pings += 1;
            s.from = Some(conn);
        });

        let mut state = Counters::default();
        assert!(router.route(ConnectionId(3), ping(), &mut state));
        assert_eq!(state.pings, 1);
        assert_eq!(state.from, Some(ConnectionId(3)));
    }

    #[test]
    fn test_unregistered_tag_dropped() {
        let router = MessageRouter::<Counters>::new();
        let mut state = Counters::default();
        let pong = Message::Pong(Pong {
            timestamp_ms: 0,
            sequence: 0,
        });
        assert!(!router.route(ConnectionId(1), pong, &mut state));
    }

    #[test]
    fn test_handler_receives_payload() {
        let mut router = MessageRouter::<Counters>::new();
        router.register(MessageTag::LoginRequest, |_conn: ConnectionId, msg: Message, s: &mut Counters| {
            if let Message::LoginRequest(req) = msg {
                s.last_name = req.player_name;
            }
        });

        let mut state = Counters::default();
        router.route(
            ConnectionId(1),
            Message::LoginRequest(LoginRequest {
                player_name: "Steve".to_string(),
            }),
            &mut state,
        );
        assert_eq!(state.last_name, "Steve");
        assert_eq!(state.pings, 0);
    }

    #[test]
    fn test_message_tag_extraction() {
        assert_eq!(ping().tag(), MessageTag::Ping);
        assert_eq!(
            Message::BlockPlacement(BlockPlacement::use_item()).tag(),
            MessageTag::BlockPlacement
        );
        assert_eq!(
            Message::PluginMessage(PluginMessage {
                channel: String::new(),
                data: vec![],
            })
            .tag(),
            MessageTag::PluginMessage
        );
    }

    #[test]
    fn test_registered_tags_lists_handlers() {
        let mut router = MessageRouter::<Counters>::new();
        router.register(MessageTag::Ping, |_: ConnectionId, _: Message, _: &mut Counters| {});
        router.register(MessageTag::PlayerPosition, |_: ConnectionId, _: Message, _: &mut Counters| {});
        let mut tags: Vec<_> = router.registered_tags().copied().collect();
        tags.sort_by_key(|t| format!("{t:?}"));
        assert_eq!(tags, vec![MessageTag::Ping, MessageTag::PlayerPosition]);
    }
}
