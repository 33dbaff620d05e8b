//! In-memory reference host.
//!
//! Blocks live in a sparse hash map (absent means air). Actors are
//! `bevy_ecs` entities carrying their pose, hotbar, abilities, and
//! statistics. Side effects that a real server would send to clients (sounds,
//! particles, dropped items, hook calls) are appended to logs instead so tests
//! can observe them.

use bevy_ecs::prelude::*;
use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::block::{Block, ParticleKind, VaporizeEffect};
use crate::geometry::{BlockPos, Direction};
use crate::host::{
    ActorId, BucketEvent, HookKind, HookOutcome, InteractionHooks, InventoryAccess, WorldAccess,
};
use crate::item::{ItemKind, ItemStack};
use crate::raycast::{Ray, look_direction, trace_blocks};
use crate::trace::{BlockHit, RayTraceResult};

/// Eye height above the actor's feet, in blocks.
pub const EYE_HEIGHT: f64 = 1.62;

/// Default interaction reach, in blocks.
pub const DEFAULT_REACH: f64 = 5.0;

/// Number of hotbar slots.
pub const HOTBAR_SLOTS: usize = 9;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Links an entity to its actor id.
#[derive(Component, Clone, Copy, Debug)]
struct ActorTag(ActorId);

/// Feet position and view angles (degrees).
#[derive(Component, Clone, Copy, Debug, PartialEq, Default)]
pub struct Pose {
    /// Feet position.
    pub position: DVec3,
    /// Yaw in degrees; 0 faces +Z.
    pub yaw: f32,
    /// Pitch in degrees; 90 looks straight down.
    pub pitch: f32,
}

impl Pose {
    /// Creates a pose.
    pub fn new(position: DVec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
        }
    }

    /// Eye position.
    pub fn eye(&self) -> DVec3 {
        self.position + DVec3::new(0.0, EYE_HEIGHT, 0.0)
    }
}

#[derive(Component, Clone, Debug, Default)]
struct Hotbar {
    slots: [Option<ItemStack>; HOTBAR_SLOTS],
    selected: usize,
}

impl Hotbar {
    /// Merge into a matching stack with room, else take the first empty slot.
    fn insert(&mut self, item: ItemStack) -> bool {
        let max = item.kind.max_stack();
        if let Some(stack) = self
            .slots
            .iter_mut()
            .flatten()
            .find(|s| s.kind == item.kind && s.count.saturating_add(item.count) <= max)
        {
            stack.count += item.count;
            return true;
        }
        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) {
            *slot = Some(item);
            return true;
        }
        false
    }
}

/// Per-actor ability flags.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Abilities {
    /// Creative-style building: items are not consumed.
    pub instant_build: bool,
    /// Whether the actor may modify the world at all.
    pub may_build: bool,
}

impl Default for Abilities {
    fn default() -> Self {
        Self {
            instant_build: false,
            may_build: true,
        }
    }
}

#[derive(Component, Clone, Debug, Default)]
struct Statistics {
    item_uses: FxHashMap<ItemKind, u32>,
}

// ---------------------------------------------------------------------------
// Logs and policy
// ---------------------------------------------------------------------------

/// A played vaporize effect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectRecord {
    /// Centre of the effect.
    pub pos: BlockPos,
    /// Sound event name.
    pub sound: &'static str,
    /// Sound volume.
    pub volume: f32,
    /// Pitch after jitter.
    pub pitch: f32,
    /// Particle emitted.
    pub particle: ParticleKind,
    /// Particle count.
    pub particle_count: u32,
}

/// Which hooks cancel, and whether the fill hook swaps the result item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HookPolicy {
    /// Veto every pre-interaction hook.
    pub cancel_pre_interaction: bool,
    /// Veto every bucket-fill hook.
    pub cancel_fill: bool,
    /// Veto every bucket-empty hook.
    pub cancel_empty: bool,
    /// Replace the fill result with this item.
    pub fill_result_override: Option<ItemStack>,
}

// ---------------------------------------------------------------------------
// MemoryWorld
// ---------------------------------------------------------------------------

/// Reference [`WorldHost`](crate::WorldHost) backed by plain memory.
pub struct MemoryWorld {
    ecs: World,
    actors: FxHashMap<ActorId, Entity>,
    blocks: FxHashMap<BlockPos, Block>,
    locked: FxHashSet<BlockPos>,
    spawn: BlockPos,
    spawn_protection_radius: i32,
    vaporizes_water: bool,
    reach: f64,
    hooks: HookPolicy,
    hook_log: Vec<HookKind>,
    effects: Vec<EffectRecord>,
    dropped: Vec<(ActorId, ItemStack)>,
    rng: ChaCha8Rng,
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorld {
    /// Empty world with a fixed effect seed.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Empty world whose effect jitter uses `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            ecs: World::new(),
            actors: FxHashMap::default(),
            blocks: FxHashMap::default(),
            locked: FxHashSet::default(),
            spawn: BlockPos::default(),
            spawn_protection_radius: 0,
            vaporizes_water: false,
            reach: DEFAULT_REACH,
            hooks: HookPolicy::default(),
            hook_log: Vec::new(),
            effects: Vec::new(),
            dropped: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    // -- world settings ------------------------------------------------------

    /// Protect a square of `radius` blocks around `spawn`. Zero disables.
    pub fn set_spawn_protection(&mut self, spawn: BlockPos, radius: i32) {
        self.spawn = spawn;
        self.spawn_protection_radius = radius.max(0);
    }

    /// Centre of spawn protection, and where new actors appear.
    pub fn spawn_point(&self) -> BlockPos {
        self.spawn
    }

    /// Make emptied water evaporate.
    pub fn set_vaporizes_water(&mut self, vaporizes: bool) {
        self.vaporizes_water = vaporizes;
    }

    /// Reach used by the server ray trace.
    pub fn set_reach(&mut self, reach: f64) {
        self.reach = reach;
    }

    /// Replace the hook policy.
    pub fn set_hook_policy(&mut self, policy: HookPolicy) {
        self.hooks = policy;
    }

    /// Deny edits at `pos` regardless of region permissions.
    pub fn lock_block(&mut self, pos: BlockPos) {
        self.locked.insert(pos);
    }

    /// Set every block in the inclusive box `min..=max`.
    pub fn fill(&mut self, min: BlockPos, max: BlockPos, block: Block) {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    self.set_block(BlockPos::new(x, y, z), block);
                }
            }
        }
    }

    /// Number of non-air blocks stored.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    // -- actors --------------------------------------------------------------

    /// Spawn an actor, or reset the pose of an existing one.
    pub fn spawn_actor(&mut self, actor: ActorId, pose: Pose) {
        if let Some(mut existing) = self.component_mut::<Pose>(actor) {
            *existing = pose;
            return;
        }
        let entity = self
            .ecs
            .spawn((
                ActorTag(actor),
                pose,
                Hotbar::default(),
                Abilities::default(),
                Statistics::default(),
            ))
            .id();
        self.actors.insert(actor, entity);
        debug!(%actor, ?entity, "actor spawned");
    }

    /// Remove an actor. Returns `false` if it was unknown.
    pub fn despawn_actor(&mut self, actor: ActorId) -> bool {
        match self.actors.remove(&actor) {
            Some(entity) => self.ecs.despawn(entity),
            None => false,
        }
    }

    /// Number of live actors.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Ids of live actors, checked against their entity tag.
    pub fn actor_ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .actors
            .values()
            .filter_map(|&e| self.ecs.get::<ActorTag>(e).map(|t| t.0))
            .collect();
        ids.sort();
        ids
    }

    /// Current pose.
    pub fn pose(&self, actor: ActorId) -> Option<Pose> {
        self.component::<Pose>(actor).copied()
    }

    /// Update the pose. Returns `false` for an unknown actor.
    pub fn set_pose(&mut self, actor: ActorId, pose: Pose) -> bool {
        match self.component_mut::<Pose>(actor) {
            Some(mut p) => {
                *p = pose;
                true
            }
            None => false,
        }
    }

    /// Select a hotbar slot. Returns `false` for an unknown actor or a slot
    /// outside the hotbar.
    pub fn select_slot(&mut self, actor: ActorId, slot: u8) -> bool {
        let slot = slot as usize;
        if slot >= HOTBAR_SLOTS {
            return false;
        }
        match self.component_mut::<Hotbar>(actor) {
            Some(mut hotbar) => {
                hotbar.selected = slot;
                true
            }
            None => false,
        }
    }

    /// Put `item` in a specific hotbar slot.
    pub fn set_slot(&mut self, actor: ActorId, slot: u8, item: Option<ItemStack>) -> bool {
        let slot = slot as usize;
        if slot >= HOTBAR_SLOTS {
            return false;
        }
        match self.component_mut::<Hotbar>(actor) {
            Some(mut hotbar) => {
                hotbar.slots[slot] = item;
                true
            }
            None => false,
        }
    }

    /// Contents of a hotbar slot.
    pub fn slot(&self, actor: ActorId, slot: u8) -> Option<ItemStack> {
        self.component::<Hotbar>(actor)
            .and_then(|h| h.slots.get(slot as usize).copied().flatten())
    }

    /// Replace the actor's ability flags.
    pub fn set_abilities(&mut self, actor: ActorId, abilities: Abilities) -> bool {
        match self.component_mut::<Abilities>(actor) {
            Some(mut a) => {
                *a = abilities;
                true
            }
            None => false,
        }
    }

    /// How many times `item` was used by `actor`.
    pub fn statistic(&self, actor: ActorId, item: ItemKind) -> u32 {
        self.component::<Statistics>(actor)
            .and_then(|s| s.item_uses.get(&item).copied())
            .unwrap_or(0)
    }

    // -- logs ----------------------------------------------------------------

    /// Hooks fired so far, in order.
    pub fn hook_log(&self) -> &[HookKind] {
        &self.hook_log
    }

    /// Effects played so far.
    pub fn effects(&self) -> &[EffectRecord] {
        &self.effects
    }

    /// Items that did not fit and were dropped.
    pub fn dropped_items(&self) -> &[(ActorId, ItemStack)] {
        &self.dropped
    }

    // -- helpers -------------------------------------------------------------

    fn component<C: Component>(&self, actor: ActorId) -> Option<&C> {
        let entity = *self.actors.get(&actor)?;
        self.ecs.get::<C>(entity)
    }

    fn component_mut<C: Component>(&mut self, actor: ActorId) -> Option<Mut<'_, C>> {
        let entity = *self.actors.get(&actor)?;
        self.ecs.get_mut::<C>(entity)
    }

    fn abilities(&self, actor: ActorId) -> Option<Abilities> {
        self.component::<Abilities>(actor).copied()
    }

    fn in_spawn_protection(&self, pos: BlockPos) -> bool {
        let r = self.spawn_protection_radius;
        r > 0
            && (pos.x - self.spawn.x).abs() <= r
            && (pos.z - self.spawn.z).abs() <= r
    }

    fn fire(&mut self, kind: HookKind, cancel: bool, result: ItemStack) -> HookOutcome {
        self.hook_log.push(kind);
        if cancel {
            debug!(%kind, "hook cancelled");
            HookOutcome::Cancelled
        } else {
            HookOutcome::Proceed(result)
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator impls
// ---------------------------------------------------------------------------

impl WorldAccess for MemoryWorld {
    fn server_ray_trace(&self, actor: ActorId, stop_on_fluid: bool) -> RayTraceResult {
        let Some(pose) = self.pose(actor) else {
            return RayTraceResult::Miss;
        };
        let ray = Ray::new(
            pose.eye(),
            look_direction(pose.yaw, pose.pitch),
            self.reach,
        );
        trace_blocks(&ray, |pos| {
            let block = self.block_at(pos);
            if block.is_liquid() {
                stop_on_fluid && block.is_fluid_source()
            } else {
                !block.is_air()
            }
        })
    }

    fn block_at(&self, pos: BlockPos) -> Block {
        if !pos.is_valid() {
            return Block::Air;
        }
        self.blocks.get(&pos).copied().unwrap_or_default()
    }

    fn is_build_allowed(&self, actor: ActorId, pos: BlockPos) -> bool {
        let Some(abilities) = self.abilities(actor) else {
            return false;
        };
        abilities.may_build && (abilities.instant_build || !self.in_spawn_protection(pos))
    }

    fn can_edit(&self, actor: ActorId, pos: BlockPos, _face: Direction) -> bool {
        !self.locked.contains(&pos) && self.abilities(actor).is_some_and(|a| a.may_build)
    }

    fn set_block(&mut self, pos: BlockPos, block: Block) {
        if !pos.is_valid() {
            warn!(%pos, ?block, "ignoring write outside the world");
            return;
        }
        if block.is_air() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, block);
        }
    }

    fn vaporizes_water(&self) -> bool {
        self.vaporizes_water
    }

    fn play_vaporize_effect(&mut self, pos: BlockPos, effect: &VaporizeEffect) {
        let jitter = self.rng.random::<f32>() - self.rng.random::<f32>();
        self.effects.push(EffectRecord {
            pos,
            sound: effect.sound,
            volume: effect.volume,
            pitch: effect.base_pitch + jitter * effect.pitch_jitter,
            particle: effect.particle,
            particle_count: effect.particle_count,
        });
    }
}

impl InventoryAccess for MemoryWorld {
    fn has_actor(&self, actor: ActorId) -> bool {
        self.actors.contains_key(&actor)
    }

    fn held_item(&self, actor: ActorId) -> Option<ItemStack> {
        self.component::<Hotbar>(actor)
            .and_then(|h| h.slots[h.selected])
    }

    fn set_held_item(&mut self, actor: ActorId, item: Option<ItemStack>) {
        if let Some(mut hotbar) = self.component_mut::<Hotbar>(actor) {
            let selected = hotbar.selected;
            hotbar.slots[selected] = item;
        }
    }

    fn is_instant_build(&self, actor: ActorId) -> bool {
        self.abilities(actor).is_some_and(|a| a.instant_build)
    }

    fn grant_or_drop(&mut self, actor: ActorId, item: ItemStack) {
        let stored = self
            .component_mut::<Hotbar>(actor)
            .is_some_and(|mut h| h.insert(item));
        if !stored {
            debug!(%actor, ?item, "inventory full, dropping");
            self.dropped.push((actor, item));
        }
    }

    fn record_statistic(&mut self, actor: ActorId, item: ItemKind) {
        if let Some(mut stats) = self.component_mut::<Statistics>(actor) {
            *stats.item_uses.entry(item).or_insert(0) += 1;
        }
    }
}

impl InteractionHooks for MemoryWorld {
    fn fire_pre_interaction(&mut self, _actor: ActorId, _hit: &BlockHit) -> HookOutcome<()> {
        self.hook_log.push(HookKind::PreInteraction);
        if self.hooks.cancel_pre_interaction {
            HookOutcome::Cancelled
        } else {
            HookOutcome::Proceed(())
        }
    }

    fn fire_bucket_fill(&mut self, event: &BucketEvent) -> HookOutcome {
        let result = self.hooks.fill_result_override.unwrap_or(event.result);
        self.fire(HookKind::BucketFill, self.hooks.cancel_fill, result)
    }

    fn fire_bucket_empty(&mut self, event: &BucketEvent) -> HookOutcome {
        self.fire(HookKind::BucketEmpty, self.hooks.cancel_empty, event.result)
    }
}
