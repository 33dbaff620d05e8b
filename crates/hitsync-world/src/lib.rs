//! World-side vocabulary for targeting reconciliation: block coordinates and
//! faces, ray-trace results, the block/fluid/bucket tables, the collaborator
//! traits the reconciliation core calls into, and an in-memory reference host.

pub mod block;
pub mod geometry;
pub mod host;
pub mod item;
pub mod memory;
pub mod raycast;
pub mod trace;

pub use block::{Block, FIZZ, Fluid, FluidProps, ParticleKind, SOURCE_LEVEL, VaporizeEffect};
pub use geometry::{BlockPos, Direction, MAX_HORIZONTAL, WORLD_HEIGHT};
pub use host::{
    ActorId, BucketEvent, HookKind, HookOutcome, InteractionHooks, InventoryAccess, WorldAccess,
    WorldHost,
};
pub use item::{BucketKind, ItemKind, ItemStack};
pub use memory::{Abilities, EffectRecord, HookPolicy, MemoryWorld, Pose};
pub use raycast::{Ray, look_direction, trace_blocks};
pub use trace::{BlockHit, RayTraceResult};
