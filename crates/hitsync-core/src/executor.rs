//! Bucket interaction replay against a resolved target.
//!
//! Runs the same sequence the world would run natively for a bucket use:
//! pre-interaction hook, region permission, then either collecting a fluid
//! source (empty bucket) or emptying into the adjacent block (filled bucket).
//! Every failure returns an [`AbortReason`] before any mutation happens.

use hitsync_world::{
    ActorId, Block, BlockHit, BlockPos, BucketEvent, BucketKind, Fluid, HookKind, HookOutcome,
    ItemStack, SOURCE_LEVEL, WorldHost,
};
use tracing::debug;

use crate::arbitrator::AbortReason;

/// What a completed action did to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// A fluid source was picked up.
    Collected {
        /// Cleared block.
        pos: BlockPos,
        /// Fluid collected.
        fluid: Fluid,
        /// Item produced (normally the filled bucket).
        result: ItemStack,
    },
    /// A fluid source was placed.
    Placed {
        /// Written block.
        pos: BlockPos,
        /// Fluid placed.
        fluid: Fluid,
    },
    /// The fluid evaporated; only an effect was played.
    Vaporized {
        /// Where the fluid would have gone.
        pos: BlockPos,
    },
}

/// Performs one bucket use by `actor` against `hit`.
pub fn execute_bucket_use<H: WorldHost + ?Sized>(
    host: &mut H,
    actor: ActorId,
    hit: &BlockHit,
) -> Result<ExecutionOutcome, AbortReason> {
    if !host.has_actor(actor) {
        return Err(AbortReason::UnknownActor);
    }
    if !hit.is_well_formed() {
        return Err(AbortReason::InvalidTarget);
    }
    let held = host.held_item(actor).ok_or(AbortReason::IneligibleItem)?;
    let bucket = held.kind.bucket().ok_or(AbortReason::IneligibleItem)?;

    if host.fire_pre_interaction(actor, hit).is_cancelled() {
        return Err(AbortReason::Cancelled(HookKind::PreInteraction));
    }
    if !host.is_build_allowed(actor, hit.block) {
        return Err(AbortReason::BuildDenied);
    }

    let outcome = match bucket.fluid() {
        None => collect(host, actor, hit, held),
        Some(fluid) => empty_into(host, actor, hit, held, fluid),
    };
    debug!(%actor, block = %hit.block, face = ?hit.face, bucket = bucket.name(), ?outcome, "bucket use");
    outcome
}

fn collect<H: WorldHost + ?Sized>(
    host: &mut H,
    actor: ActorId,
    hit: &BlockHit,
    held: ItemStack,
) -> Result<ExecutionOutcome, AbortReason> {
    if !host.can_edit(actor, hit.adjacent(), hit.face) {
        return Err(AbortReason::BuildDenied);
    }
    let Some((fluid, SOURCE_LEVEL)) = host.block_at(hit.block).fluid() else {
        return Err(AbortReason::NoEffect);
    };

    let event = BucketEvent {
        actor,
        block: hit.block,
        face: hit.face,
        held,
        result: ItemStack::one(fluid.props().bucket),
    };
    let result = match host.fire_bucket_fill(&event) {
        HookOutcome::Proceed(item) => item,
        HookOutcome::Cancelled => return Err(AbortReason::Cancelled(HookKind::BucketFill)),
    };

    host.set_block(hit.block, Block::Air);
    host.record_statistic(actor, held.kind);

    if !host.is_instant_build(actor) {
        if host.decrement_held_item(actor).is_none() {
            host.set_held_item(actor, Some(result));
        } else {
            host.grant_or_drop(actor, result);
        }
    }

    Ok(ExecutionOutcome::Collected {
        pos: hit.block,
        fluid,
        result,
    })
}

fn empty_into<H: WorldHost + ?Sized>(
    host: &mut H,
    actor: ActorId,
    hit: &BlockHit,
    held: ItemStack,
    fluid: Fluid,
) -> Result<ExecutionOutcome, AbortReason> {
    let place = hit.adjacent();
    if !place.is_valid() {
        return Err(AbortReason::NoEffect);
    }
    if !host.can_edit(actor, place, hit.face) {
        return Err(AbortReason::BuildDenied);
    }

    let event = BucketEvent {
        actor,
        block: hit.block,
        face: hit.face,
        held,
        result: ItemStack::one(BucketKind::Empty),
    };
    let result = match host.fire_bucket_empty(&event) {
        HookOutcome::Proceed(item) => item,
        HookOutcome::Cancelled => return Err(AbortReason::Cancelled(HookKind::BucketEmpty)),
    };

    let existing = host.block_at(place);
    if !existing.is_replaceable() {
        return Err(AbortReason::NoEffect);
    }

    let props = fluid.props();
    let outcome = match props.vaporize {
        Some(effect) if host.vaporizes_water() => {
            host.play_vaporize_effect(place, &effect);
            ExecutionOutcome::Vaporized { pos: place }
        }
        _ => {
            if !existing.is_air() && !existing.is_liquid() {
                host.set_block(place, Block::Air);
            }
            host.set_block(place, props.placed);
            ExecutionOutcome::Placed { pos: place, fluid }
        }
    };

    if !host.is_instant_build(actor) {
        host.record_statistic(actor, held.kind);
        host.set_held_item(actor, Some(result));
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use glam::DVec3;
    use hitsync_world::{
        Abilities, Direction, HookPolicy, InventoryAccess, ItemKind, MemoryWorld, Pose,
        WORLD_HEIGHT, WorldAccess,
    };

    use super::*;

    const ACTOR: ActorId = ActorId(1);

    fn world_holding(item: ItemStack) -> MemoryWorld {
        let mut world = MemoryWorld::new();
        world.spawn_actor(ACTOR, Pose::new(DVec3::new(10.5, 65.0, 12.5), 180.0, 45.0));
        world.set_held_item(ACTOR, Some(item));
        world
    }

    fn top_of(x: i32, y: i32, z: i32) -> BlockHit {
        BlockHit::new(
            BlockPos::new(x, y, z),
            DVec3::new(x as f64 + 0.5, y as f64 + 1.0, z as f64 + 0.5),
            Direction::Up,
        )
    }

    fn instant_build(world: &mut MemoryWorld) {
        world.set_abilities(
            ACTOR,
            Abilities {
                instant_build: true,
                may_build: true,
            },
        );
    }

    #[test]
    fn test_collect_water_source() {
        let mut world = world_holding(ItemStack::one(BucketKind::Empty));
        world.set_block(BlockPos::new(10, 64, 10), Block::WATER_SOURCE);

        let outcome = execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Collected { fluid: Fluid::Water, .. }));
        assert_eq!(world.block_at(BlockPos::new(10, 64, 10)), Block::Air);
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(BucketKind::Water)));
        assert_eq!(world.statistic(ACTOR, ItemKind::Bucket(BucketKind::Empty)), 1);
    }

    #[test]
    fn test_collect_source_on_top_layer() {
        let top = WORLD_HEIGHT - 1;
        let mut world = world_holding(ItemStack::one(BucketKind::Empty));
        world.set_block(BlockPos::new(0, top, 0), Block::WATER_SOURCE);

        let outcome = execute_bucket_use(&mut world, ACTOR, &top_of(0, top, 0)).unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Collected { fluid: Fluid::Water, .. }));
        assert_eq!(world.block_at(BlockPos::new(0, top, 0)), Block::Air);
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(BucketKind::Water)));
    }

    #[test]
    fn test_collect_source_on_bottom_layer_through_down_face() {
        let mut world = world_holding(ItemStack::one(BucketKind::Empty));
        world.set_block(BlockPos::new(0, 0, 0), Block::LAVA_SOURCE);
        let hit = BlockHit::new(BlockPos::new(0, 0, 0), DVec3::new(0.5, 0.0, 0.5), Direction::Down);

        assert!(execute_bucket_use(&mut world, ACTOR, &hit).is_ok());
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(BucketKind::Lava)));
    }

    #[test]
    fn test_place_above_top_layer_has_no_effect() {
        let top = WORLD_HEIGHT - 1;
        let mut world = world_holding(ItemStack::one(BucketKind::Water));
        world.set_block(BlockPos::new(0, top, 0), Block::Stone);

        let err = execute_bucket_use(&mut world, ACTOR, &top_of(0, top, 0)).unwrap_err();
        assert_eq!(err, AbortReason::NoEffect);
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(BucketKind::Water)));
        assert!(!world.hook_log().contains(&HookKind::BucketEmpty));
    }

    #[test]
    fn test_collect_from_stack_grants_filled_bucket() {
        let mut world = world_holding(ItemStack::new(BucketKind::Empty, 3));
        world.set_block(BlockPos::new(10, 64, 10), Block::LAVA_SOURCE);

        execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap();
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::new(BucketKind::Empty, 2)));
        assert_eq!(world.slot(ACTOR, 1), Some(ItemStack::one(BucketKind::Lava)));
    }

    #[test]
    fn test_collect_exempt_actor_keeps_item() {
        let mut world = world_holding(ItemStack::one(BucketKind::Empty));
        instant_build(&mut world);
        world.set_block(BlockPos::new(10, 64, 10), Block::WATER_SOURCE);

        execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap();
        assert_eq!(world.block_at(BlockPos::new(10, 64, 10)), Block::Air);
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(BucketKind::Empty)));
    }

    #[test]
    fn test_collect_flowing_fluid_has_no_effect() {
        let mut world = world_holding(ItemStack::one(BucketKind::Empty));
        world.set_block(BlockPos::new(10, 64, 10), Block::Water { level: 3 });

        let err = execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap_err();
        assert_eq!(err, AbortReason::NoEffect);
        assert_eq!(world.block_at(BlockPos::new(10, 64, 10)), Block::Water { level: 3 });
    }

    #[test]
    fn test_collect_uses_fill_hook_result() {
        let mut world = world_holding(ItemStack::one(BucketKind::Empty));
        world.set_hook_policy(HookPolicy {
            fill_result_override: Some(ItemStack::one(ItemKind::Dirt)),
            ..HookPolicy::default()
        });
        world.set_block(BlockPos::new(10, 64, 10), Block::WATER_SOURCE);

        execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap();
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(ItemKind::Dirt)));
    }

    #[test]
    fn test_place_lava_on_top_face() {
        let mut world = world_holding(ItemStack::one(BucketKind::Lava));
        world.set_block(BlockPos::new(10, 64, 10), Block::Stone);

        let outcome = execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Placed {
                pos: BlockPos::new(10, 65, 10),
                fluid: Fluid::Lava
            }
        );
        assert_eq!(world.block_at(BlockPos::new(10, 65, 10)), Block::LAVA_SOURCE);
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(BucketKind::Empty)));
        assert_eq!(world.statistic(ACTOR, ItemKind::Bucket(BucketKind::Lava)), 1);
    }

    #[test]
    fn test_place_replaces_tall_grass() {
        let mut world = world_holding(ItemStack::one(BucketKind::Water));
        world.set_block(BlockPos::new(10, 64, 10), Block::Dirt);
        world.set_block(BlockPos::new(10, 65, 10), Block::TallGrass);

        execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap();
        assert_eq!(world.block_at(BlockPos::new(10, 65, 10)), Block::WATER_SOURCE);
    }

    #[test]
    fn test_place_into_solid_has_no_effect_and_keeps_bucket() {
        let mut world = world_holding(ItemStack::one(BucketKind::Water));
        world.set_block(BlockPos::new(10, 64, 10), Block::Dirt);
        world.set_block(BlockPos::new(10, 65, 10), Block::Stone);

        let err = execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap_err();
        assert_eq!(err, AbortReason::NoEffect);
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(BucketKind::Water)));
        assert_eq!(world.block_at(BlockPos::new(10, 65, 10)), Block::Stone);
    }

    #[test]
    fn test_water_vaporizes_where_configured() {
        let mut world = world_holding(ItemStack::one(BucketKind::Water));
        world.set_vaporizes_water(true);
        world.set_block(BlockPos::new(10, 64, 10), Block::Stone);

        let outcome = execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap();
        assert_eq!(outcome, ExecutionOutcome::Vaporized { pos: BlockPos::new(10, 65, 10) });
        assert_eq!(world.block_at(BlockPos::new(10, 65, 10)), Block::Air);
        assert_eq!(world.effects().len(), 1);
        assert_eq!(world.effects()[0].sound, "random.fizz");
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(BucketKind::Empty)));
    }

    #[test]
    fn test_lava_never_vaporizes() {
        let mut world = world_holding(ItemStack::one(BucketKind::Lava));
        world.set_vaporizes_water(true);
        world.set_block(BlockPos::new(10, 64, 10), Block::Stone);

        execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap();
        assert_eq!(world.block_at(BlockPos::new(10, 65, 10)), Block::LAVA_SOURCE);
        assert!(world.effects().is_empty());
    }

    #[test]
    fn test_place_exempt_actor_keeps_filled_bucket() {
        let mut world = world_holding(ItemStack::one(BucketKind::Water));
        instant_build(&mut world);
        world.set_block(BlockPos::new(10, 64, 10), Block::Stone);

        execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap();
        assert_eq!(world.block_at(BlockPos::new(10, 65, 10)), Block::WATER_SOURCE);
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(BucketKind::Water)));
        assert_eq!(world.statistic(ACTOR, ItemKind::Bucket(BucketKind::Water)), 0);
    }

    #[test]
    fn test_hook_cancellations_are_terminal() {
        for (policy, hook, held) in [
            (
                HookPolicy {
                    cancel_pre_interaction: true,
                    ..HookPolicy::default()
                },
                HookKind::PreInteraction,
                BucketKind::Empty,
            ),
            (
                HookPolicy {
                    cancel_fill: true,
                    ..HookPolicy::default()
                },
                HookKind::BucketFill,
                BucketKind::Empty,
            ),
            (
                HookPolicy {
                    cancel_empty: true,
                    ..HookPolicy::default()
                },
                HookKind::BucketEmpty,
                BucketKind::Water,
            ),
        ] {
            let mut world = world_holding(ItemStack::one(held));
            world.set_hook_policy(policy);
            world.set_block(BlockPos::new(10, 64, 10), Block::WATER_SOURCE);

            let err = execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap_err();
            assert_eq!(err, AbortReason::Cancelled(hook));
            assert_eq!(world.block_at(BlockPos::new(10, 64, 10)), Block::WATER_SOURCE);
            assert_eq!(world.block_at(BlockPos::new(10, 65, 10)), Block::Air);
            assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(held)));
        }
    }

    #[test]
    fn test_region_protection_denies() {
        let mut world = world_holding(ItemStack::one(BucketKind::Empty));
        world.set_spawn_protection(BlockPos::new(10, 64, 10), 3);
        world.set_block(BlockPos::new(10, 64, 10), Block::WATER_SOURCE);

        let err = execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap_err();
        assert_eq!(err, AbortReason::BuildDenied);
        assert_eq!(world.block_at(BlockPos::new(10, 64, 10)), Block::WATER_SOURCE);
    }

    #[test]
    fn test_locked_adjacent_block_denies_collect() {
        let mut world = world_holding(ItemStack::one(BucketKind::Empty));
        world.set_block(BlockPos::new(10, 64, 10), Block::WATER_SOURCE);
        world.lock_block(BlockPos::new(10, 65, 10));

        let err = execute_bucket_use(&mut world, ACTOR, &top_of(10, 64, 10)).unwrap_err();
        assert_eq!(err, AbortReason::BuildDenied);
        assert_eq!(world.held_item(ACTOR), Some(ItemStack::one(BucketKind::Empty)));
    }

    #[test]
    fn test_non_bucket_and_unknown_actor_abort() {
        let mut world = world_holding(ItemStack::one(ItemKind::Stone));
        let hit = top_of(10, 64, 10);
        assert_eq!(
            execute_bucket_use(&mut world, ACTOR, &hit).unwrap_err(),
            AbortReason::IneligibleItem
        );
        assert_eq!(
            execute_bucket_use(&mut world, ActorId(77), &hit).unwrap_err(),
            AbortReason::UnknownActor
        );
        assert!(!world.hook_log().contains(&HookKind::BucketEmpty));
    }
}
