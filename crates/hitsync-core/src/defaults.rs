//! Default message handling for the in-memory reference host.

use glam::DVec3;
use hitsync_net::{ConnectionId, Message, MessageRouter, MessageTag};
use hitsync_world::{InventoryAccess, ItemStack, MemoryWorld, Pose};
use tracing::{debug, info};

use crate::schedule::actor_for;

/// Builds the handler table the world loop uses for messages the router let
/// through.
///
/// Login spawns the actor at the world spawn point and fills its hotbar from
/// `starter_kit`. Position and held-slot updates are applied as sent. Logout
/// (also synthesized on disconnect) despawns the actor.
pub fn reference_handlers(starter_kit: Vec<ItemStack>) -> MessageRouter<MemoryWorld> {
    let mut router = MessageRouter::<MemoryWorld>::new();

    router.register(
        MessageTag::LoginRequest,
        move |conn: ConnectionId, msg: Message, world: &mut MemoryWorld| {
            let Message::LoginRequest(login) = msg else {
                return;
            };
            let actor = actor_for(conn);
            let spawn = world.spawn_point();
            let feet = DVec3::new(spawn.x as f64 + 0.5, spawn.y as f64, spawn.z as f64 + 0.5);
            world.spawn_actor(actor, Pose::new(feet, 0.0, 0.0));
            for item in &starter_kit {
                world.grant_or_drop(actor, *item);
            }
            info!(?conn, name = %login.player_name, "player joined");
        },
    );

    router.register(
        MessageTag::Logout,
        |conn: ConnectionId, msg: Message, world: &mut MemoryWorld| {
            if world.despawn_actor(actor_for(conn))
                && let Message::Logout(logout) = msg
            {
                info!(?conn, reason = %logout.reason, "player left");
            }
        },
    );

    router.register(
        MessageTag::PlayerPosition,
        |conn: ConnectionId, msg: Message, world: &mut MemoryWorld| {
            if let Message::PlayerPosition(p) = msg {
                let pose = Pose::new(DVec3::new(p.x, p.y, p.z), p.yaw, p.pitch);
                if !world.set_pose(actor_for(conn), pose) {
                    debug!(?conn, "position for unknown actor");
                }
            }
        },
    );

    router.register(
        MessageTag::HeldItemChange,
        |conn: ConnectionId, msg: Message, world: &mut MemoryWorld| {
            if let Message::HeldItemChange(change) = msg
                && !world.select_slot(actor_for(conn), change.slot)
            {
                debug!(?conn, slot = change.slot, "ignoring slot change");
            }
        },
    );

    router
}
