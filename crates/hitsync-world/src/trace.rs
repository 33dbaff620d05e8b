//! Ray-trace results: what an actor's cursor is aimed at.

use glam::DVec3;

use crate::geometry::{BlockPos, Direction};

/// A ray trace that struck a block face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockHit {
    /// The struck block.
    pub block: BlockPos,
    /// Exact entry point in world space.
    pub hit_point: DVec3,
    /// The face the ray entered through.
    pub face: Direction,
}

impl BlockHit {
    /// Creates a block hit.
    pub fn new(block: BlockPos, hit_point: DVec3, face: Direction) -> Self {
        Self {
            block,
            hit_point,
            face,
        }
    }

    /// Returns `true` if the block lies in the world and the hit point is a
    /// finite coordinate. Anything else must be treated as a miss.
    pub fn is_well_formed(&self) -> bool {
        self.block.is_valid() && self.hit_point.is_finite()
    }

    /// The block on the near side of the struck face.
    pub fn adjacent(&self) -> BlockPos {
        self.block.offset(self.face)
    }
}

/// Outcome of a ray trace. Immutable once constructed.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum RayTraceResult {
    /// Nothing within reach.
    #[default]
    Miss,
    /// A block face was struck.
    Block(BlockHit),
}

impl RayTraceResult {
    /// The block hit, if any.
    pub fn block_hit(&self) -> Option<&BlockHit> {
        match self {
            RayTraceResult::Block(hit) => Some(hit),
            RayTraceResult::Miss => None,
        }
    }

    /// Returns `true` for [`RayTraceResult::Miss`].
    pub fn is_miss(&self) -> bool {
        matches!(self, RayTraceResult::Miss)
    }
}

impl From<BlockHit> for RayTraceResult {
    fn from(hit: BlockHit) -> Self {
        RayTraceResult::Block(hit)
    }
}
