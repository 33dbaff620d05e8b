//! Reconciliation of client targeting hints with server-authoritative bucket
//! actions.
//!
//! Clients that registered the enrichment channel send their own ray-trace
//! result just before a use-item packet. The [`InboundMessageRouter`] caches
//! it in the [`PendingResultStore`] and diverts the packet to the
//! [`WorldLoop`], which consumes the hint exactly once, falls back to the
//! server's trace when none is present, and replays the bucket interaction
//! against the host.

pub mod arbitrator;
pub mod defaults;
pub mod executor;
pub mod hint;
pub mod pending;
pub mod router;
pub mod schedule;
pub mod session;


pub use arbitrator::{
    AbortReason, ActionState, ArbitrationDecision, PlacementArbitrator, decide_hint,
    fallback_decision,
};
pub use defaults::reference_handlers;
pub use executor::{ExecutionOutcome, execute_bucket_use};
pub use hint::{
    HintDecodeError, SideChannelEnvelope, USE_ITEM_BUCKET_TYPE_URL, UseItemBucketMessage,
    WireDirection, WireRayTrace, decode_hint, encode_envelope, encode_hint,
};
pub use pending::PendingResultStore;
pub use router::{
    DEFAULT_HINT_CHANNEL, InboundMessageRouter, RouterConfig, RouterStats, RouterStatsSnapshot,
    Verdict,
};
pub use schedule::{
    ActionReport, ActionSource, ArbitrationTask, DEFAULT_TICK_RATE, QueueError,
    ServerTickSchedule, WorldLoop, WorldMutationQueue, WorldTask, actor_for,
};
pub use session::{EnrichedConnections, HeldItemSnapshot};
