//! Collaborator interfaces the reconciliation core drives.
//!
//! The core never owns world state. Everything it reads or mutates goes
//! through these three traits, which a host implements once and passes in by
//! `&mut` reference from the world-mutation thread.

use std::fmt;

use crate::block::{Block, VaporizeEffect};
use crate::geometry::{BlockPos, Direction};
use crate::item::{ItemKind, ItemStack};
use crate::trace::{BlockHit, RayTraceResult};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// World-side identity of a connected actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Which cancellable interaction hook fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Generic "actor right-clicked a block" hook.
    PreInteraction,
    /// A bucket is about to collect a fluid.
    BucketFill,
    /// A bucket is about to be emptied.
    BucketEmpty,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::PreInteraction => "pre-interaction",
            HookKind::BucketFill => "bucket-fill",
            HookKind::BucketEmpty => "bucket-empty",
        };
        f.write_str(name)
    }
}

/// Result of firing a hook. Listeners may cancel, or let the action
/// proceed with a (possibly replaced) value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookOutcome<T = ItemStack> {
    /// Continue; carries the value the action should use.
    Proceed(T),
    /// A listener vetoed the action. Terminal.
    Cancelled,
}

impl<T> HookOutcome<T> {
    /// Returns `true` for [`HookOutcome::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HookOutcome::Cancelled)
    }
}

/// Payload handed to the bucket fill/empty hooks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BucketEvent {
    /// Acting actor.
    pub actor: ActorId,
    /// The struck block.
    pub block: BlockPos,
    /// Face of the struck block.
    pub face: Direction,
    /// The bucket stack in hand when the event fired.
    pub held: ItemStack,
    /// The item the actor will end up with if nobody intervenes.
    pub result: ItemStack,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Block reads and writes, permissions, and the server's own ray trace.
pub trait WorldAccess {
    /// Authoritative trace from the actor's eye along its look vector.
    /// `stop_on_fluid` makes fluid sources hittable.
    fn server_ray_trace(&self, actor: ActorId, stop_on_fluid: bool) -> RayTraceResult;

    /// Current block at `pos`; unloaded or out-of-world positions read as air.
    fn block_at(&self, pos: BlockPos) -> Block;

    /// Region-level permission (spawn protection and the like).
    fn is_build_allowed(&self, actor: ActorId, pos: BlockPos) -> bool;

    /// Per-position edit permission for an action through `face`.
    fn can_edit(&self, actor: ActorId, pos: BlockPos, face: Direction) -> bool;

    /// Replace the block at `pos`. Use [`Block::Air`] to clear.
    fn set_block(&mut self, pos: BlockPos, block: Block);

    /// Whether water evaporates when emptied in this world.
    fn vaporizes_water(&self) -> bool;

    /// Play `effect` centred on `pos` instead of placing a fluid.
    fn play_vaporize_effect(&mut self, pos: BlockPos, effect: &VaporizeEffect);
}

/// The actor's hand, ability flags, and statistics.
pub trait InventoryAccess {
    /// Returns `true` if the actor is known to the world.
    fn has_actor(&self, actor: ActorId) -> bool;

    /// The selected stack, `None` for an empty hand or unknown actor.
    fn held_item(&self, actor: ActorId) -> Option<ItemStack>;

    /// Overwrite the selected slot.
    fn set_held_item(&mut self, actor: ActorId, item: Option<ItemStack>);

    /// Actors with instant build keep their items.
    fn is_instant_build(&self, actor: ActorId) -> bool;

    /// Put `item` in the inventory, dropping it at the actor's feet if full.
    fn grant_or_drop(&mut self, actor: ActorId, item: ItemStack);

    /// Count one use of `item`.
    fn record_statistic(&mut self, actor: ActorId, item: ItemKind);

    /// Remove one item from the selected stack and return what is left.
    fn decrement_held_item(&mut self, actor: ActorId) -> Option<ItemStack> {
        let remaining = self.held_item(actor).and_then(ItemStack::decremented);
        self.set_held_item(actor, remaining);
        remaining
    }
}

/// Cancellable interaction events.
pub trait InteractionHooks {
    /// Fired before any bucket logic runs.
    fn fire_pre_interaction(&mut self, actor: ActorId, hit: &BlockHit) -> HookOutcome<()>;

    /// Fired before a fluid source is collected. `Proceed` carries the item
    /// the actor receives.
    fn fire_bucket_fill(&mut self, event: &BucketEvent) -> HookOutcome;

    /// Fired before a bucket is emptied. `Proceed` carries the item left in
    /// hand.
    fn fire_bucket_empty(&mut self, event: &BucketEvent) -> HookOutcome;
}

/// Everything an action needs from its host.
pub trait WorldHost: WorldAccess + InventoryAccess + InteractionHooks {}

impl<T: WorldAccess + InventoryAccess + InteractionHooks + ?Sized> WorldHost for T {}
