//! Targeting-hint payloads carried on the enrichment plugin channel.
//!
//! A plugin message body is a [`SideChannelEnvelope`]: a type URL naming the
//! inner message plus its encoded bytes. Only
//! [`USE_ITEM_BUCKET_TYPE_URL`] is understood here; envelopes for other
//! message types decode to `Ok(None)` and are ignored by the caller.

use glam::DVec3;
use hitsync_world::{BlockHit, BlockPos, Direction, RayTraceResult};
use serde::{Deserialize, Serialize};

/// Type URL of [`UseItemBucketMessage`].
pub const USE_ITEM_BUCKET_TYPE_URL: &str = "type.hitsync/hitsync.enrichment.v1.UseItemBucketMessage";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Self-describing wrapper for every message on the enrichment channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideChannelEnvelope {
    /// Identifies the encoding of `value`.
    pub type_url: String,
    /// Encoded inner message.
    pub value: Vec<u8>,
}

/// Sent by the client just before a use-item packet for a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UseItemBucketMessage {
    /// What the client's cursor was on.
    pub ray_trace: WireRayTrace,
}

/// Face as it appears in hint payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireDirection {
    /// -Y.
    Down,
    /// +Y.
    Up,
    /// -Z.
    North,
    /// +Z.
    South,
    /// -X.
    West,
    /// +X.
    East,
}

/// Client ray-trace result as it appears in hint payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WireRayTrace {
    /// The client saw nothing in reach.
    Miss,
    /// The client's cursor was on a block face.
    Block {
        /// Block X.
        x: i32,
        /// Block Y.
        y: i32,
        /// Block Z.
        z: i32,
        /// Hit point X.
        hit_x: f64,
        /// Hit point Y.
        hit_y: f64,
        /// Hit point Z.
        hit_z: f64,
        /// Struck face.
        face: WireDirection,
    },
}

impl From<WireDirection> for Direction {
    fn from(face: WireDirection) -> Self {
        match face {
            WireDirection::Down => Direction::Down,
            WireDirection::Up => Direction::Up,
            WireDirection::North => Direction::North,
            WireDirection::South => Direction::South,
            WireDirection::West => Direction::West,
            WireDirection::East => Direction::East,
        }
    }
}

impl From<Direction> for WireDirection {
    fn from(face: Direction) -> Self {
        match face {
            Direction::Down => WireDirection::Down,
            Direction::Up => WireDirection::Up,
            Direction::North => WireDirection::North,
            Direction::South => WireDirection::South,
            Direction::West => WireDirection::West,
            Direction::East => WireDirection::East,
        }
    }
}

/// Coordinates are carried through unchecked; validation happens when the
/// hint is arbitrated.
impl From<WireRayTrace> for RayTraceResult {
    fn from(wire: WireRayTrace) -> Self {
        match wire {
            WireRayTrace::Miss => RayTraceResult::Miss,
            WireRayTrace::Block {
                x,
                y,
                z,
                hit_x,
                hit_y,
                hit_z,
                face,
            } => BlockHit::new(
                BlockPos::new(x, y, z),
                DVec3::new(hit_x, hit_y, hit_z),
                face.into(),
            )
            .into(),
        }
    }
}

impl From<&RayTraceResult> for WireRayTrace {
    fn from(result: &RayTraceResult) -> Self {
        match result {
            RayTraceResult::Miss => WireRayTrace::Miss,
            RayTraceResult::Block(hit) => WireRayTrace::Block {
                x: hit.block.x,
                y: hit.block.y,
                z: hit.block.z,
                hit_x: hit.hit_point.x,
                hit_y: hit.hit_point.y,
                hit_z: hit.hit_point.z,
                face: hit.face.into(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A hint payload could not be decoded. Never surfaced to the connection.
#[derive(Debug, thiserror::Error)]
pub enum HintDecodeError {
    /// The outer envelope is not valid postcard.
    #[error("malformed envelope: {0}")]
    Envelope(#[source] postcard::Error),

    /// The envelope named a known type but its body did not decode.
    #[error("malformed {type_url} body: {source}")]
    Body {
        /// Type URL from the envelope.
        type_url: String,
        /// Underlying error.
        #[source]
        source: postcard::Error,
    },
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Decodes a plugin-message body into a ray-trace hint.
///
/// Returns `Ok(None)` when the envelope carries a message type other than
/// [`UseItemBucketMessage`].
pub fn decode_hint(data: &[u8]) -> Result<Option<RayTraceResult>, HintDecodeError> {
    let envelope: SideChannelEnvelope =
        postcard::from_bytes(data).map_err(HintDecodeError::Envelope)?;
    if envelope.type_url != USE_ITEM_BUCKET_TYPE_URL {
        return Ok(None);
    }
    let message: UseItemBucketMessage =
        postcard::from_bytes(&envelope.value).map_err(|source| HintDecodeError::Body {
            type_url: envelope.type_url.clone(),
            source,
        })?;
    Ok(Some(message.ray_trace.into()))
}

/// Encodes `result` as a use-item-bucket hint, ready to send as a plugin
/// message body.
pub fn encode_hint(result: &RayTraceResult) -> Result<Vec<u8>, postcard::Error> {
    let message = UseItemBucketMessage {
        ray_trace: result.into(),
    };
    encode_envelope(USE_ITEM_BUCKET_TYPE_URL, &postcard::to_allocvec(&message)?)
}

/// Wraps an already-encoded body in an envelope.
pub fn encode_envelope(type_url: &str, value: &[u8]) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_allocvec(&SideChannelEnvelope {
        type_url: type_url.to_string(),
        value: value.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_hint_decodes_to_block_hit() {
        let hit = BlockHit::new(
            BlockPos::new(10, 64, 10),
            DVec3::new(10.5, 65.0, 10.5),
            Direction::Up,
        );
        let bytes = encode_hint(&hit.into()).unwrap();
        assert_eq!(decode_hint(&bytes).unwrap(), Some(RayTraceResult::Block(hit)));
    }

    #[test]
    fn test_miss_hint_decodes_to_miss() {
        let bytes = encode_hint(&RayTraceResult::Miss).unwrap();
        assert_eq!(decode_hint(&bytes).unwrap(), Some(RayTraceResult::Miss));
    }

    #[test]
    fn test_other_type_url_is_ignored() {
        let bytes = encode_envelope("type.hitsync/other.Message", &[1, 2, 3]).unwrap();
        assert_eq!(decode_hint(&bytes).unwrap(), None);
    }

    #[test]
    fn test_garbage_envelope_is_error() {
        let err = decode_hint(&[0xFF, 0xFF, 0xFF]).unwrap_err();
        assert!(matches!(err, HintDecodeError::Envelope(_)));
    }

    #[test]
    fn test_truncated_body_is_error() {
        let bytes = encode_envelope(USE_ITEM_BUCKET_TYPE_URL, &[1]).unwrap();
        let err = decode_hint(&bytes).unwrap_err();
        assert!(matches!(err, HintDecodeError::Body { .. }));
    }

    #[test]
    fn test_out_of_world_coordinates_survive_decoding() {
        let wire = WireRayTrace::Block {
            x: 0,
            y: -40,
            z: 0,
            hit_x: 0.0,
            hit_y: -39.0,
            hit_z: 0.0,
            face: WireDirection::Up,
        };
        let body = postcard::to_allocvec(&UseItemBucketMessage { ray_trace: wire }).unwrap();
        let bytes = encode_envelope(USE_ITEM_BUCKET_TYPE_URL, &body).unwrap();
        let decoded = decode_hint(&bytes).unwrap().unwrap();
        let hit = decoded.block_hit().unwrap();
        assert!(!hit.is_well_formed());
    }
}
