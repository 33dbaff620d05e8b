//! Network-side interception of inbound messages.
//!
//! Runs on the connection's reader task, so nothing here may block or touch
//! the world. The router stores targeting hints, decides whether a bucket
//! use-item packet is diverted to arbitration, and forwards everything else
//! unchanged to the world loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use hitsync_net::{
    BlockPlacement, ConnectionId, InboundHandler, IncomingMessage, Message, PluginMessage,
};
use tracing::{debug, info, warn};

use crate::hint::decode_hint;
use crate::pending::PendingResultStore;
use crate::schedule::{ArbitrationTask, WorldMutationQueue, WorldTask, submit_or_warn};
use crate::session::{EnrichedConnections, HeldItemSnapshot};

/// Default plugin channel for targeting hints.
pub const DEFAULT_HINT_CHANNEL: &str = "hitsync:enrichment";

/// Router settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Plugin channel that carries hints.
    pub hint_channel: String,
    /// Only connections that registered `hint_channel` get hints and
    /// arbitration.
    pub require_registration: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            hint_channel: DEFAULT_HINT_CHANNEL.to_string(),
            require_registration: true,
        }
    }
}

/// What happens to a message after the router has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Continue to default handling.
    Pass,
    /// Default handling is skipped; the router scheduled its own work.
    Suppress,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters kept by the router.
#[derive(Debug, Default)]
pub struct RouterStats {
    hints_stored: AtomicU64,
    hints_dropped_decode: AtomicU64,
    hints_ignored: AtomicU64,
    actions_suppressed: AtomicU64,
    actions_passed: AtomicU64,
    enqueue_failures: AtomicU64,
}

/// Point-in-time copy of [`RouterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStatsSnapshot {
    /// Hints decoded and stored.
    pub hints_stored: u64,
    /// Hint payloads that failed to decode.
    pub hints_dropped_decode: u64,
    /// Hint-channel messages skipped (unregistered sender or foreign type).
    pub hints_ignored: u64,
    /// Use-item packets diverted to arbitration.
    pub actions_suppressed: u64,
    /// Bucket use-item packets left to default handling.
    pub actions_passed: u64,
    /// Tasks that could not be queued.
    pub enqueue_failures: u64,
}

impl RouterStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            hints_stored: self.hints_stored.load(Ordering::Relaxed),
            hints_dropped_decode: self.hints_dropped_decode.load(Ordering::Relaxed),
            hints_ignored: self.hints_ignored.load(Ordering::Relaxed),
            actions_suppressed: self.actions_suppressed.load(Ordering::Relaxed),
            actions_passed: self.actions_passed.load(Ordering::Relaxed),
            enqueue_failures: self.enqueue_failures.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// InboundMessageRouter
// ---------------------------------------------------------------------------

/// Classifies inbound messages and hands work to the world loop.
pub struct InboundMessageRouter {
    config: RouterConfig,
    store: Arc<PendingResultStore>,
    queue: WorldMutationQueue,
    held: Arc<HeldItemSnapshot>,
    enriched: EnrichedConnections,
    stats: RouterStats,
    next_sequence: AtomicU64,
}

impl InboundMessageRouter {
    /// Creates a router writing hints to `store` and tasks to `queue`.
    pub fn new(
        config: RouterConfig,
        store: Arc<PendingResultStore>,
        queue: WorldMutationQueue,
        held: Arc<HeldItemSnapshot>,
    ) -> Self {
        Self {
            config,
            store,
            queue,
            held,
            enriched: EnrichedConnections::new(),
            stats: RouterStats::default(),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Inspects one message. Hints are stored, eligible bucket uses are
    /// scheduled for arbitration and suppressed, everything else passes.
    pub fn inspect(&self, connection: ConnectionId, message: &Message) -> Verdict {
        match message {
            Message::RegisterChannels(register) => {
                if register.channels.iter().any(|c| *c == self.config.hint_channel)
                    && self.enriched.mark(connection)
                {
                    info!(?connection, channel = %self.config.hint_channel, "connection enriched");
                }
                Verdict::Pass
            }
            Message::PluginMessage(plugin) if plugin.channel == self.config.hint_channel => {
                self.store_hint(connection, plugin);
                Verdict::Pass
            }
            Message::BlockPlacement(placement) => self.on_block_placement(connection, placement),
            _ => Verdict::Pass,
        }
    }

    /// Purges everything held for a closed connection and tells the world.
    pub fn connection_closed(&self, connection: ConnectionId) {
        self.store.remove(connection);
        self.enriched.forget(connection);
        self.held.forget(connection);
        if !submit_or_warn(&self.queue, WorldTask::Disconnected(connection)) {
            RouterStats::bump(&self.stats.enqueue_failures);
        }
    }

    /// Returns `true` if `connection` gets hints and arbitration.
    pub fn is_enriched(&self, connection: ConnectionId) -> bool {
        !self.config.require_registration || self.enriched.is_enriched(connection)
    }

    /// Current counters.
    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// The active settings.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    fn store_hint(&self, connection: ConnectionId, plugin: &PluginMessage) {
        if !self.is_enriched(connection) {
            debug!(?connection, "hint from unregistered connection ignored");
            RouterStats::bump(&self.stats.hints_ignored);
            return;
        }
        match decode_hint(&plugin.data) {
            Ok(Some(result)) => {
                self.store.put(connection, result);
                RouterStats::bump(&self.stats.hints_stored);
            }
            Ok(None) => RouterStats::bump(&self.stats.hints_ignored),
            Err(e) => {
                warn!(?connection, "dropping hint: {e}");
                RouterStats::bump(&self.stats.hints_dropped_decode);
            }
        }
    }

    fn on_block_placement(&self, connection: ConnectionId, placement: &BlockPlacement) -> Verdict {
        if !placement.is_use_item()
            || !self.is_enriched(connection)
            || !self.held.holds_bucket(connection)
        {
            return Verdict::Pass;
        }
        if !self.store.contains(connection) {
            RouterStats::bump(&self.stats.actions_passed);
            return Verdict::Pass;
        }

        let task = ArbitrationTask {
            connection,
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            scheduled_at: Instant::now(),
        };
        if submit_or_warn(&self.queue, WorldTask::Arbitrate(task)) {
            RouterStats::bump(&self.stats.actions_suppressed);
            Verdict::Suppress
        } else {
            RouterStats::bump(&self.stats.enqueue_failures);
            RouterStats::bump(&self.stats.actions_passed);
            Verdict::Pass
        }
    }
}

impl InboundHandler for InboundMessageRouter {
    fn on_message(&self, connection: ConnectionId, message: Message) {
        if self.inspect(connection, &message) == Verdict::Suppress {
            return;
        }
        let task = WorldTask::Deliver(IncomingMessage::now(connection, message));
        if !submit_or_warn(&self.queue, task) {
            RouterStats::bump(&self.stats.enqueue_failures);
        }
    }

    fn on_disconnect(&self, connection: ConnectionId) {
        self.connection_closed(connection);
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::Receiver;
    use glam::DVec3;
    use hitsync_net::RegisterChannels;
    use hitsync_world::{BlockHit, BlockPos, BucketKind, Direction, ItemKind, RayTraceResult};

    use super::*;
    use crate::hint::{USE_ITEM_BUCKET_TYPE_URL, encode_envelope, encode_hint};

    const CONN: ConnectionId = ConnectionId(5);

    struct Fixture {
        router: InboundMessageRouter,
        store: Arc<PendingResultStore>,
        held: Arc<HeldItemSnapshot>,
        tasks: Receiver<WorldTask>,
    }

    fn fixture_with(config: RouterConfig, capacity: usize) -> Fixture {
        let store = Arc::new(PendingResultStore::new());
        let held = Arc::new(HeldItemSnapshot::new());
        let (queue, tasks) = WorldMutationQueue::bounded(capacity);
        let router = InboundMessageRouter::new(config, Arc::clone(&store), queue, Arc::clone(&held));
        Fixture {
            router,
            store,
            held,
            tasks,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RouterConfig::default(), 64)
    }

    fn register() -> Message {
        Message::RegisterChannels(RegisterChannels {
            channels: vec!["minecraft:brand".to_string(), DEFAULT_HINT_CHANNEL.to_string()],
        })
    }

    fn hint_message(result: &RayTraceResult) -> Message {
        Message::PluginMessage(PluginMessage {
            channel: DEFAULT_HINT_CHANNEL.to_string(),
            data: encode_hint(result).unwrap(),
        })
    }

    fn use_item() -> Message {
        Message::BlockPlacement(BlockPlacement::use_item())
    }

    fn water_hit() -> RayTraceResult {
        BlockHit::new(BlockPos::new(10, 64, 10), DVec3::new(10.5, 65.0, 10.5), Direction::Up).into()
    }

    fn enriched_with_bucket() -> Fixture {
        let f = fixture();
        f.router.on_message(CONN, register());
        f.held.publish(CONN, Some(ItemKind::Bucket(BucketKind::Empty)));
        f
    }

    fn drain(rx: &Receiver<WorldTask>) -> Vec<WorldTask> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_hint_is_stored_and_plugin_message_passes() {
        let f = enriched_with_bucket();
        assert_eq!(f.router.inspect(CONN, &hint_message(&water_hit())), Verdict::Pass);
        assert!(f.store.contains(CONN));
        assert_eq!(f.router.stats().hints_stored, 1);
    }

    #[test]
    fn test_use_item_with_hint_is_suppressed_and_scheduled() {
        let f = enriched_with_bucket();
        f.router.on_message(CONN, hint_message(&water_hit()));
        drain(&f.tasks);

        f.router.on_message(CONN, use_item());
        let tasks = drain(&f.tasks);
        assert_eq!(tasks.len(), 1);
        assert!(matches!(&tasks[0], WorldTask::Arbitrate(t) if t.connection == CONN));
        assert!(f.store.contains(CONN), "router must not consume the hint");
        assert_eq!(f.router.stats().actions_suppressed, 1);
    }

    #[test]
    fn test_use_item_without_hint_passes_unchanged() {
        let f = enriched_with_bucket();
        drain(&f.tasks);
        f.router.on_message(CONN, use_item());
        let tasks = drain(&f.tasks);
        assert!(matches!(&tasks[..], [WorldTask::Deliver(m)] if m.message == use_item()));
        assert_eq!(f.router.stats().actions_passed, 1);
    }

    #[test]
    fn test_face_click_is_never_intercepted() {
        let f = enriched_with_bucket();
        f.router.on_message(CONN, hint_message(&water_hit()));
        let click = Message::BlockPlacement(BlockPlacement {
            face: 1,
            ..BlockPlacement::use_item()
        });
        assert_eq!(f.router.inspect(CONN, &click), Verdict::Pass);
    }

    #[test]
    fn test_non_bucket_item_is_not_intercepted() {
        let f = enriched_with_bucket();
        f.router.on_message(CONN, hint_message(&water_hit()));
        f.held.publish(CONN, Some(ItemKind::Stone));
        assert_eq!(f.router.inspect(CONN, &use_item()), Verdict::Pass);
        f.held.publish(CONN, None);
        assert_eq!(f.router.inspect(CONN, &use_item()), Verdict::Pass);
    }

    #[test]
    fn test_unregistered_connection_never_suppresses() {
        let f = fixture();
        f.held.publish(CONN, Some(ItemKind::Bucket(BucketKind::Water)));
        f.router.on_message(CONN, hint_message(&water_hit()));
        assert!(!f.store.contains(CONN));
        assert_eq!(f.router.inspect(CONN, &use_item()), Verdict::Pass);
        assert_eq!(f.router.stats().hints_ignored, 1);
    }

    #[test]
    fn test_registration_can_be_disabled() {
        let f = fixture_with(
            RouterConfig {
                require_registration: false,
                ..RouterConfig::default()
            },
            8,
        );
        f.held.publish(CONN, Some(ItemKind::Bucket(BucketKind::Empty)));
        f.router.on_message(CONN, hint_message(&water_hit()));
        assert_eq!(f.router.inspect(CONN, &use_item()), Verdict::Suppress);
    }

    #[test]
    fn test_malformed_payload_is_dropped_not_stored() {
        let f = enriched_with_bucket();
        let garbage = Message::PluginMessage(PluginMessage {
            channel: DEFAULT_HINT_CHANNEL.to_string(),
            data: vec![0xFF, 0x00, 0xFF],
        });
        assert_eq!(f.router.inspect(CONN, &garbage), Verdict::Pass);
        assert!(!f.store.contains(CONN));
        assert_eq!(f.router.stats().hints_dropped_decode, 1);
    }

    #[test]
    fn test_foreign_type_url_and_channel_are_ignored() {
        let f = enriched_with_bucket();
        let foreign = Message::PluginMessage(PluginMessage {
            channel: DEFAULT_HINT_CHANNEL.to_string(),
            data: encode_envelope("type.hitsync/other.Message", &[]).unwrap(),
        });
        f.router.inspect(CONN, &foreign);
        let other_channel = Message::PluginMessage(PluginMessage {
            channel: "minecraft:brand".to_string(),
            data: encode_hint(&water_hit()).unwrap(),
        });
        f.router.inspect(CONN, &other_channel);
        assert!(!f.store.contains(CONN));
        assert_eq!(f.router.stats().hints_ignored, 1);
        assert!(USE_ITEM_BUCKET_TYPE_URL.contains("UseItemBucket"));
    }

    #[test]
    fn test_full_queue_degrades_to_pass() {
        let f = fixture_with(RouterConfig::default(), 1);
        f.router.inspect(CONN, &register());
        f.held.publish(CONN, Some(ItemKind::Bucket(BucketKind::Empty)));
        f.router.inspect(CONN, &hint_message(&water_hit()));
        f.router.on_message(CONN, Message::Ping(hitsync_net::Ping {
            timestamp_ms: 0,
            sequence: 0,
        }));

        assert_eq!(f.router.inspect(CONN, &use_item()), Verdict::Pass);
        assert_eq!(f.router.stats().enqueue_failures, 1);
    }

    #[test]
    fn test_disconnect_purges_everything() {
        let f = enriched_with_bucket();
        f.router.on_message(CONN, hint_message(&water_hit()));
        drain(&f.tasks);

        f.router.on_disconnect(CONN);
        assert!(!f.store.contains(CONN));
        assert!(!f.router.is_enriched(CONN));
        assert!(f.held.get(CONN).is_none());
        assert!(matches!(&drain(&f.tasks)[..], [WorldTask::Disconnected(c)] if *c == CONN));
    }

    #[test]
    fn test_sequences_increase() {
        let f = enriched_with_bucket();
        f.router.on_message(CONN, hint_message(&water_hit()));
        f.router.on_message(CONN, use_item());
        f.router.on_message(CONN, use_item());
        let sequences: Vec<u64> = drain(&f.tasks)
            .into_iter()
            .filter_map(|t| match t {
                WorldTask::Arbitrate(task) => Some(task.sequence),
                _ => None,
            })
            .collect();
        assert_eq!(sequences, vec![0, 1]);
    }
}
