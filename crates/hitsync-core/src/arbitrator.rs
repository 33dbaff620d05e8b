//! Target arbitration: client hint, server fallback, or abort.

use std::sync::Arc;

use hitsync_net::ConnectionId;
use hitsync_world::{ActorId, BlockHit, HookKind, RayTraceResult, WorldHost};

use crate::pending::PendingResultStore;

// ---------------------------------------------------------------------------
// Decision types
// ---------------------------------------------------------------------------

/// Why an action ended without touching the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    /// Neither the hint nor the server trace found a block.
    #[error("no target in reach")]
    NoTarget,
    /// The resolved block lies outside the world or has a non-finite hit point.
    #[error("target outside the world or malformed")]
    InvalidTarget,
    /// A permission check refused the edit.
    #[error("build permission denied")]
    BuildDenied,
    /// The target is valid but the bucket has nothing to do there.
    #[error("nothing to collect or no room to place")]
    NoEffect,
    /// A hook listener vetoed the action.
    #[error("cancelled by {0} hook")]
    Cancelled(HookKind),
    /// The actor left before the action ran.
    #[error("actor is not in the world")]
    UnknownActor,
    /// The actor is no longer holding a bucket.
    #[error("held item is not a bucket")]
    IneligibleItem,
}

/// Which target an action will use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArbitrationDecision {
    /// The client's hint, validated.
    UseHint(BlockHit),
    /// The server's own ray trace.
    UseFallback(BlockHit),
    /// No usable target.
    Abort(AbortReason),
}

impl ArbitrationDecision {
    /// The chosen target, if not aborted.
    pub fn target(&self) -> Option<&BlockHit> {
        match self {
            ArbitrationDecision::UseHint(hit) | ArbitrationDecision::UseFallback(hit) => Some(hit),
            ArbitrationDecision::Abort(_) => None,
        }
    }

    /// Returns `true` if the client's hint was used.
    pub fn used_hint(&self) -> bool {
        matches!(self, ArbitrationDecision::UseHint(_))
    }
}

/// Lifecycle of one scheduled action.
///
/// `Scheduled -> Arbitrated -> Executed`, or `Aborted` from either of the
/// first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionState {
    /// Suppressed on the network side and queued for the world loop.
    Scheduled,
    /// A target was chosen.
    Arbitrated,
    /// The interaction ran to completion.
    Executed,
    /// Ended without mutation.
    Aborted,
}

impl ActionState {
    /// Returns `true` for `Executed` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionState::Executed | ActionState::Aborted)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: ActionState) -> bool {
        matches!(
            (self, next),
            (ActionState::Scheduled, ActionState::Arbitrated)
                | (ActionState::Scheduled, ActionState::Aborted)
                | (ActionState::Arbitrated, ActionState::Executed)
                | (ActionState::Arbitrated, ActionState::Aborted)
        )
    }
}

// ---------------------------------------------------------------------------
// PlacementArbitrator
// ---------------------------------------------------------------------------

/// Chooses the target for a scheduled bucket action.
pub struct PlacementArbitrator {
    store: Arc<PendingResultStore>,
}

impl PlacementArbitrator {
    /// Creates an arbitrator consuming hints from `store`.
    pub fn new(store: Arc<PendingResultStore>) -> Self {
        Self { store }
    }

    /// Consumes the connection's hint (exactly once) and decides.
    ///
    /// An absent hint falls back to the host's ray trace. A present hint is
    /// never mixed with the fallback: a `Miss` hint aborts.
    pub fn arbitrate<H: WorldHost + ?Sized>(
        &self,
        connection: ConnectionId,
        actor: ActorId,
        host: &H,
    ) -> ArbitrationDecision {
        match self.store.take_if_present(connection) {
            Some(hint) => decide_hint(hint),
            None => fallback_decision(host, actor),
        }
    }
}

/// Validates a client hint.
pub fn decide_hint(hint: RayTraceResult) -> ArbitrationDecision {
    match hint {
        RayTraceResult::Miss => ArbitrationDecision::Abort(AbortReason::NoTarget),
        RayTraceResult::Block(hit) => match validate(hit) {
            Ok(hit) => ArbitrationDecision::UseHint(hit),
            Err(reason) => ArbitrationDecision::Abort(reason),
        },
    }
}

/// Decision from the host's own ray trace.
///
/// Empty buckets stop on fluid sources; filled buckets look through fluids.
/// Pure with respect to host state: identical world and actor state give the
/// same decision.
pub fn fallback_decision<H: WorldHost + ?Sized>(host: &H, actor: ActorId) -> ArbitrationDecision {
    if !host.has_actor(actor) {
        return ArbitrationDecision::Abort(AbortReason::UnknownActor);
    }
    let Some(bucket) = host.held_item(actor).and_then(|stack| stack.kind.bucket()) else {
        return ArbitrationDecision::Abort(AbortReason::IneligibleItem);
    };
    match host.server_ray_trace(actor, bucket.is_empty()) {
        RayTraceResult::Miss => ArbitrationDecision::Abort(AbortReason::NoTarget),
        RayTraceResult::Block(hit) => match validate(hit) {
            Ok(hit) => ArbitrationDecision::UseFallback(hit),
            Err(reason) => ArbitrationDecision::Abort(reason),
        },
    }
}

fn validate(hit: BlockHit) -> Result<BlockHit, AbortReason> {
    if hit.is_well_formed() {
        Ok(hit)
    } else {
        Err(AbortReason::InvalidTarget)
    }
}
