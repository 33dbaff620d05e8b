//! Per-connection cache of the most recent client targeting hint.

use dashmap::DashMap;
use hitsync_net::ConnectionId;
use hitsync_world::RayTraceResult;

/// Concurrent `ConnectionId -> RayTraceResult` map holding at most one
/// unconsumed hint per connection.
///
/// Every operation is linearizable per key. Keys live in separate shards, so
/// hints for different connections never contend on a single lock.
#[derive(Debug, Default)]
pub struct PendingResultStore {
    entries: DashMap<ConnectionId, RayTraceResult>,
}

impl PendingResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `result` for `connection`, replacing any unconsumed hint.
    pub fn put(&self, connection: ConnectionId, result: RayTraceResult) {
        self.entries.insert(connection, result);
    }

    /// Atomically removes and returns the hint for `connection`.
    ///
    /// This is the only way a hint is consumed. Two concurrent callers for
    /// the same connection cannot both observe the same entry.
    pub fn take_if_present(&self, connection: ConnectionId) -> Option<RayTraceResult> {
        self.entries.remove(&connection).map(|(_, result)| result)
    }

    /// Drops any hint for `connection`. Idempotent.
    pub fn remove(&self, connection: ConnectionId) {
        self.entries.remove(&connection);
    }

    /// Returns `true` if a hint is waiting. Does not consume it.
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.entries.contains_key(&connection)
    }

    /// Number of connections with a waiting hint.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no hints are waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
