//! The world thread: owns the reference host and drains the mutation queue
//! once per tick.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Receiver;
use hitsync_config::{Config, WorldConfig};
use hitsync_core::{
    HeldItemSnapshot, PendingResultStore, ServerTickSchedule, WorldLoop, WorldTask,
    reference_handlers,
};
use hitsync_world::{Block, BlockPos, BucketKind, ItemKind, ItemStack, MemoryWorld};
use tracing::{debug, error, info, warn};

/// Where players appear on login.
pub const SPAWN: BlockPos = BlockPos::new(0, 64, 0);

const STATUS_INTERVAL_TICKS: u64 = 1200;
const RELOAD_INTERVAL_TICKS: u64 = 100;

/// A stone platform with a water pond east of spawn and a lava pool west of
/// it.
pub fn demo_world(config: &WorldConfig) -> MemoryWorld {
    let mut world = MemoryWorld::new();
    world.fill(BlockPos::new(-16, 60, -16), BlockPos::new(16, 63, 16), Block::Stone);
    world.fill(BlockPos::new(4, 63, -2), BlockPos::new(7, 63, 2), Block::WATER_SOURCE);
    world.fill(BlockPos::new(-7, 63, -2), BlockPos::new(-4, 63, 2), Block::LAVA_SOURCE);
    apply_world_settings(&mut world, config);
    world
}

/// Push the settings that can change while running into `world`.
pub fn apply_world_settings(world: &mut MemoryWorld, config: &WorldConfig) {
    world.set_spawn_protection(SPAWN, config.spawn_protection_radius);
    world.set_vaporizes_water(config.vaporizes_water);
    world.set_reach(config.reach_distance);
}

/// Whether any setting [`apply_world_settings`] pushes has changed.
fn live_settings_differ(current: &WorldConfig, fresh: &WorldConfig) -> bool {
    current.reach_distance != fresh.reach_distance
        || current.vaporizes_water != fresh.vaporizes_water
        || current.spawn_protection_radius != fresh.spawn_protection_radius
}

/// Hotbar contents handed to every player on login.
pub fn starter_kit() -> Vec<ItemStack> {
    vec![
        ItemStack::one(BucketKind::Empty),
        ItemStack::one(BucketKind::Water),
        ItemStack::one(BucketKind::Lava),
        ItemStack::new(ItemKind::Stone, 64),
    ]
}

/// Handle to the running world thread.
pub struct WorldThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl WorldThread {
    /// Spawns the thread. It runs until [`stop`](Self::stop) is called.
    ///
    /// With a `config_dir`, the config file is re-read every few seconds and
    /// world settings are re-applied when it changes. Tick rate and queue
    /// capacity only take effect on restart.
    pub fn spawn(
        config: &Config,
        config_dir: Option<PathBuf>,
        tasks: Receiver<WorldTask>,
        store: Arc<PendingResultStore>,
        held: Arc<HeldItemSnapshot>,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let mut config = config.clone();

        let handle = thread::Builder::new()
            .name("world".to_string())
            .spawn(move || {
                let mut world = demo_world(&config.world);
                let mut world_loop =
                    WorldLoop::new(tasks, store, held, reference_handlers(starter_kit()));
                let tick_rate = config.world.tick_rate;
                let mut schedule = ServerTickSchedule::with_tick_rate(tick_rate);
                info!(
                    tick_rate,
                    blocks = world.block_count(),
                    handled = ?world_loop.handled_tags(),
                    "world thread started"
                );

                let mut last = Instant::now();
                let mut executed = 0u64;
                let mut aborted = 0u64;
                let mut next_status = STATUS_INTERVAL_TICKS;
                let mut next_reload = RELOAD_INTERVAL_TICKS;
                while flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    let ticks = schedule.accumulate(now.duration_since(last).as_secs_f64());
                    last = now;
                    for _ in 0..ticks {
                        for report in world_loop.drain(&mut world) {
                            if report.executed() {
                                executed += 1;
                            } else {
                                aborted += 1;
                            }
                        }
                    }
                    if schedule.total_ticks() >= next_status {
                        next_status = schedule.total_ticks() + STATUS_INTERVAL_TICKS;
                        debug!(
                            actors = world.actor_count(),
                            executed, aborted, "world status"
                        );
                    }
                    let reload_dir = config_dir
                        .as_deref()
                        .filter(|_| schedule.total_ticks() >= next_reload);
                    if let Some(dir) = reload_dir {
                        next_reload = schedule.total_ticks() + RELOAD_INTERVAL_TICKS;
                        match config.reload(dir) {
                            Ok(Some(fresh)) => {
                                if live_settings_differ(&config.world, &fresh.world) {
                                    apply_world_settings(&mut world, &fresh.world);
                                    info!(
                                        reach = fresh.world.reach_distance,
                                        vaporizes_water = fresh.world.vaporizes_water,
                                        spawn_protection = fresh.world.spawn_protection_radius,
                                        "world settings reloaded"
                                    );
                                }
                                if fresh.world.tick_rate != tick_rate {
                                    warn!(
                                        tick_rate = fresh.world.tick_rate,
                                        "tick rate change applies on restart"
                                    );
                                }
                                config = fresh;
                            }
                            Ok(None) => {}
                            Err(e) => warn!("config reload failed, keeping current: {e}"),
                        }
                    }
                    thread::sleep(schedule.until_next_tick());
                }
                info!(
                    ticks = schedule.total_ticks(),
                    executed, aborted, "world thread stopped"
                );
            })?;

        Ok(Self { handle, running })
    }

    /// Signals the thread to exit and waits for it.
    pub fn stop(self) {
        self.running.store(false, Ordering::Release);
        if self.handle.join().is_err() {
            error!("world thread panicked");
        }
    }
}
