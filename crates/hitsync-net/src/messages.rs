//! Network message types and serialization.
//!
//! All messages are serialized with [`postcard`] and prefixed with a protocol
//! version byte. Use [`serialize_message`] and [`deserialize_message`] for
//! encoding/decoding.

use serde::{Deserialize, Serialize};

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

/// Face value of a [`BlockPlacement`] meaning "use the held item" rather than
/// "click this block face".
pub const FACE_SENTINEL: u8 = 255;

// ---------------------------------------------------------------------------
// Top-level enum
// ---------------------------------------------------------------------------

/// Top-level client-to-server message. The enum discriminant is the type tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    // --- Session ---
    /// Client requests login with a player name.
    LoginRequest(LoginRequest),
    /// Client is leaving.
    Logout(Logout),
    /// Client announces the plugin channels it speaks.
    RegisterChannels(RegisterChannels),
    /// Opaque payload on a named plugin channel.
    PluginMessage(PluginMessage),

    // --- Player ---
    /// Client sends its position and look angles.
    PlayerPosition(PlayerPosition),
    /// Client selects a hotbar slot.
    HeldItemChange(HeldItemChange),
    /// Client clicks a block face or uses its held item.
    BlockPlacement(BlockPlacement),

    // --- System ---
    /// Heartbeat ping.
    Ping(Ping),
    /// Heartbeat pong.
    Pong(Pong),
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// Client login request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    /// Desired player name.
    pub player_name: String,
}

/// Logout notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Logout {
    /// Reason for disconnection.
    pub reason: String,
}

/// Channel registration (the `register` handshake of plugin channels).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterChannels {
    /// Channel names the client can send and receive on.
    pub channels: Vec<String>,
}

/// A message on a plugin channel. The body is not interpreted by the
/// transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginMessage {
    /// Namespaced channel name, e.g. `hitsync:enrichment`.
    pub channel: String,
    /// Channel-specific bytes.
    pub data: Vec<u8>,
}

/// Feet position and facing of the player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerPosition {
    /// Feet X in blocks.
    pub x: f64,
    /// Feet Y in blocks.
    pub y: f64,
    /// Feet Z in blocks.
    pub z: f64,
    /// Yaw in degrees (0 = south, 90 = west).
    pub yaw: f32,
    /// Pitch in degrees (positive looks down).
    pub pitch: f32,
}

/// Hotbar slot selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeldItemChange {
    /// Slot index, 0..9.
    pub slot: u8,
}

/// Block-placement / use-item packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockPlacement {
    /// Clicked block X (unused when `face` is the sentinel).
    pub x: i32,
    /// Clicked block Y.
    pub y: i32,
    /// Clicked block Z.
    pub z: i32,
    /// Clicked face 0..6, or [`FACE_SENTINEL`].
    pub face: u8,
    /// Cursor position on the face, 0.0..1.0.
    pub cursor_x: f32,
    /// Cursor Y on the face.
    pub cursor_y: f32,
    /// Cursor Z on the face.
    pub cursor_z: f32,
}

impl BlockPlacement {
    /// A "use held item" packet (sentinel face, no target block).
    pub fn use_item() -> Self {
        Self {
            x: -1,
            y: -1,
            z: -1,
            face: FACE_SENTINEL,
            cursor_x: 0.0,
            cursor_y: 0.0,
            cursor_z: 0.0,
        }
    }

    /// Returns `true` if this packet uses the held item instead of clicking a
    /// specific face.
    pub fn is_use_item(&self) -> bool {
        self.face == FACE_SENTINEL
    }
}

/// Heartbeat ping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ping {
    /// Sender timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Sequence number.
    pub sequence: u32,
}

/// Heartbeat pong (response to [`Ping`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pong {
    /// Echoed timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Echoed sequence number.
    pub sequence: u32,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("deserialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`Message`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded Message]`
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload into a [`Message`].
pub fn deserialize_message(data: &[u8]) -> Result<Message, MessageError> {
    let (&version, body) = data.split_first().ok_or(MessageError::EmptyPayload)?;
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }

    Ok(postcard::from_bytes(body)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
