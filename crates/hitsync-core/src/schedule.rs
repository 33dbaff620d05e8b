//! The world-mutation domain: task queue, single-consumer loop, and tick
//! pacing.
//!
//! Network tasks never touch the world. They submit [`WorldTask`]s to a
//! bounded [`WorldMutationQueue`] and return immediately. One thread owns the
//! host and drains the queue through a [`WorldLoop`], so every world read and
//! write happens in submission order on that thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use hitsync_net::{ConnectionId, IncomingMessage, Logout, Message, MessageRouter, MessageTag};
use hitsync_world::{ActorId, WorldHost};
use tracing::{debug, trace, warn};

use crate::arbitrator::{
    AbortReason, ActionState, ArbitrationDecision, PlacementArbitrator, fallback_decision,
};
use crate::executor::{ExecutionOutcome, execute_bucket_use};
use crate::pending::PendingResultStore;
use crate::session::HeldItemSnapshot;

/// Default tick rate in Hz.
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Maps a connection to the actor it controls.
pub fn actor_for(connection: ConnectionId) -> ActorId {
    ActorId(connection.0)
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// A bucket use suppressed on the network side, waiting for arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbitrationTask {
    /// Originating connection.
    pub connection: ConnectionId,
    /// Router-assigned sequence number, unique per process.
    pub sequence: u64,
    /// When the router scheduled the task.
    pub scheduled_at: Instant,
}

/// Work for the world-mutation thread.
#[derive(Debug, Clone)]
pub enum WorldTask {
    /// Resolve and run a suppressed bucket use.
    Arbitrate(ArbitrationTask),
    /// A message the router let through for default handling.
    Deliver(IncomingMessage),
    /// The connection closed.
    Disconnected(ConnectionId),
}

impl WorldTask {
    /// The connection the task belongs to.
    pub fn connection(&self) -> ConnectionId {
        match self {
            WorldTask::Arbitrate(task) => task.connection,
            WorldTask::Deliver(incoming) => incoming.connection_id,
            WorldTask::Disconnected(connection) => *connection,
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Submission failures. The task is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue is at capacity.
    #[error("world task queue is full")]
    Full,
    /// The world loop has gone away.
    #[error("world task queue is closed")]
    Closed,
}

/// Producer side of the world task queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WorldMutationQueue {
    sender: Sender<WorldTask>,
}

impl WorldMutationQueue {
    /// Creates a queue holding at most `capacity` tasks, returning the
    /// producer handle and the receiver to give to a [`WorldLoop`].
    pub fn bounded(capacity: usize) -> (Self, Receiver<WorldTask>) {
        let (sender, receiver) = bounded(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueue without blocking.
    pub fn try_submit(&self, task: WorldTask) -> Result<(), QueueError> {
        self.sender.try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Disconnected(_) => QueueError::Closed,
        })
    }

    /// Number of tasks waiting.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    /// Returns `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// How an action reached the world loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSource {
    /// Suppressed by the router and scheduled for arbitration.
    Scheduled {
        /// Task sequence number.
        sequence: u64,
        /// Time spent in the queue.
        queued_for: Duration,
    },
    /// Delivered unchanged; resolved with the server trace only.
    Default {
        /// Time since the network task received the packet.
        queued_for: Duration,
    },
}

impl ActionSource {
    /// Time between arrival on the network side and processing.
    pub fn queued_for(&self) -> Duration {
        match *self {
            ActionSource::Scheduled { queued_for, .. } | ActionSource::Default { queued_for } => {
                queued_for
            }
        }
    }

    /// Returns `true` for actions that took the default path.
    pub fn is_default(&self) -> bool {
        matches!(self, ActionSource::Default { .. })
    }
}

/// Result of one bucket action processed by the world loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionReport {
    /// Originating connection.
    pub connection: ConnectionId,
    /// How the action arrived.
    pub source: ActionSource,
    /// Target chosen.
    pub decision: ArbitrationDecision,
    /// Final state; always terminal.
    pub state: ActionState,
    /// What happened.
    pub outcome: Result<ExecutionOutcome, AbortReason>,
}

impl ActionReport {
    /// Returns `true` if the action mutated the world or played an effect.
    pub fn executed(&self) -> bool {
        self.state == ActionState::Executed
    }
}

// ---------------------------------------------------------------------------
// WorldLoop
// ---------------------------------------------------------------------------

/// Single consumer of the world task queue.
///
/// `handlers` receives every delivered message that is not a bucket use,
/// and a synthetic [`Logout`] when a connection closes.
pub struct WorldLoop<H: WorldHost> {
    tasks: Receiver<WorldTask>,
    arbitrator: PlacementArbitrator,
    held: Arc<HeldItemSnapshot>,
    handlers: MessageRouter<H>,
}

impl<H: WorldHost> WorldLoop<H> {
    /// Creates a loop draining `tasks`, consuming hints from `store`.
    pub fn new(
        tasks: Receiver<WorldTask>,
        store: Arc<PendingResultStore>,
        held: Arc<HeldItemSnapshot>,
        handlers: MessageRouter<H>,
    ) -> Self {
        Self {
            tasks,
            arbitrator: PlacementArbitrator::new(store),
            held,
            handlers,
        }
    }

    /// Message kinds the handler table accepts, sorted.
    pub fn handled_tags(&self) -> Vec<MessageTag> {
        let mut tags: Vec<MessageTag> = self.handlers.registered_tags().copied().collect();
        tags.sort_by_key(|tag| format!("{tag:?}"));
        tags
    }

    /// Number of tasks waiting.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Processes every task queued at the time of the call, in submission
    /// order. Tasks submitted while draining wait for the next call.
    pub fn drain(&mut self, host: &mut H) -> Vec<ActionReport> {
        let mut reports = Vec::new();
        for _ in 0..self.tasks.len() {
            match self.tasks.try_recv() {
                Ok(task) => {
                    if let Some(report) = self.process(task, host) {
                        reports.push(report);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        reports
    }

    /// Processes a single task.
    pub fn process(&mut self, task: WorldTask, host: &mut H) -> Option<ActionReport> {
        let connection = task.connection();
        let report = match task {
            WorldTask::Arbitrate(task) => Some(self.run_scheduled(task, host)),
            WorldTask::Deliver(incoming) => self.deliver(incoming, host),
            WorldTask::Disconnected(connection) => {
                let logout = Message::Logout(Logout {
                    reason: "connection closed".to_string(),
                });
                self.handlers.route(connection, logout, host);
                self.held.forget(connection);
                return None;
            }
        };
        self.held.publish(
            connection,
            host.held_item(actor_for(connection)).map(|stack| stack.kind),
        );
        report
    }

    fn run_scheduled(&self, task: ArbitrationTask, host: &mut H) -> ActionReport {
        let actor = actor_for(task.connection);
        let decision = self.arbitrator.arbitrate(task.connection, actor, &*host);
        let source = ActionSource::Scheduled {
            sequence: task.sequence,
            queued_for: task.scheduled_at.elapsed(),
        };
        complete(task.connection, source, decision, host)
    }

    fn deliver(&self, incoming: IncomingMessage, host: &mut H) -> Option<ActionReport> {
        let connection = incoming.connection_id;
        if let Message::BlockPlacement(placement) = &incoming.message
            && placement.is_use_item()
            && host
                .held_item(actor_for(connection))
                .is_some_and(|stack| stack.kind.bucket().is_some())
        {
            let decision = fallback_decision(&*host, actor_for(connection));
            let source = ActionSource::Default {
                queued_for: incoming.received_at.elapsed(),
            };
            return Some(complete(connection, source, decision, host));
        }
        if !self.handlers.route(connection, incoming.message, host) {
            trace!(?connection, "delivered message had no default handler");
        }
        None
    }
}

fn complete<H: WorldHost + ?Sized>(
    connection: ConnectionId,
    source: ActionSource,
    decision: ArbitrationDecision,
    host: &mut H,
) -> ActionReport {
    let (state, outcome) = match decision {
        ArbitrationDecision::Abort(reason) => (ActionState::Aborted, Err(reason)),
        ArbitrationDecision::UseHint(hit) | ArbitrationDecision::UseFallback(hit) => {
            match execute_bucket_use(host, actor_for(connection), &hit) {
                Ok(outcome) => (ActionState::Executed, Ok(outcome)),
                Err(reason) => (ActionState::Aborted, Err(reason)),
            }
        }
    };
    match &outcome {
        Ok(done) => debug!(?connection, ?source, ?decision, ?done, "action executed"),
        Err(reason) => debug!(?connection, ?source, ?decision, %reason, "action aborted"),
    }
    ActionReport {
        connection,
        source,
        decision,
        state,
        outcome,
    }
}

// ---------------------------------------------------------------------------
// ServerTickSchedule
// ---------------------------------------------------------------------------

/// Fixed-rate tick scheduler for the world loop.
///
/// Accumulates real elapsed time and yields discrete ticks.
pub struct ServerTickSchedule {
    accumulator_secs: f64,
    tick_duration_secs: f64,
    total_ticks: u64,
}

impl ServerTickSchedule {
    /// Creates a schedule at [`DEFAULT_TICK_RATE`].
    pub fn new() -> Self {
        Self::with_tick_rate(DEFAULT_TICK_RATE)
    }

    /// Creates a schedule with a custom tick rate. Zero is treated as 1 Hz.
    pub fn with_tick_rate(hz: u32) -> Self {
        Self {
            accumulator_secs: 0.0,
            tick_duration_secs: 1.0 / hz.max(1) as f64,
            total_ticks: 0,
        }
    }

    /// Accumulates elapsed time and returns the number of ticks to process.
    pub fn accumulate(&mut self, dt_secs: f64) -> u32 {
        self.accumulator_secs += dt_secs;
        let mut ticks = 0u32;
        while self.accumulator_secs >= self.tick_duration_secs {
            self.accumulator_secs -= self.tick_duration_secs;
            self.total_ticks += 1;
            ticks += 1;
        }
        ticks
    }

    /// Time left until the next tick is due.
    pub fn until_next_tick(&self) -> Duration {
        Duration::from_secs_f64((self.tick_duration_secs - self.accumulator_secs).max(0.0))
    }

    /// Total ticks yielded since creation.
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Tick duration in seconds.
    pub fn tick_duration_secs(&self) -> f64 {
        self.tick_duration_secs
    }
}

impl Default for ServerTickSchedule {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs and swallows a failed submission. Returns `true` on success.
pub(crate) fn submit_or_warn(queue: &WorldMutationQueue, task: WorldTask) -> bool {
    let connection = task.connection();
    match queue.try_submit(task) {
        Ok(()) => true,
        Err(e) => {
            warn!(?connection, "dropping world task: {e}");
            false
        }
    }
}
