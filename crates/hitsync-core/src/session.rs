//! Per-connection state shared with network tasks.
//!
//! Network tasks cannot touch the world, so anything the router needs to
//! know about an actor is published here by the world loop and read back
//! without locking the world.

use dashmap::{DashMap, DashSet};
use hitsync_net::ConnectionId;
use hitsync_world::ItemKind;

/// Read-mostly view of what each connection's actor is holding.
///
/// Written by the world loop after every task that touches an actor. Reads
/// may be one task stale; the executor always re-reads the authoritative
/// held item before acting.
#[derive(Debug, Default)]
pub struct HeldItemSnapshot {
    items: DashMap<ConnectionId, ItemKind>,
}

impl HeldItemSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the held item; `None` clears the entry.
    pub fn publish(&self, connection: ConnectionId, held: Option<ItemKind>) {
        match held {
            Some(kind) => {
                self.items.insert(connection, kind);
            }
            None => {
                self.items.remove(&connection);
            }
        }
    }

    /// Last published held item.
    pub fn get(&self, connection: ConnectionId) -> Option<ItemKind> {
        self.items.get(&connection).map(|entry| *entry)
    }

    /// Returns `true` if the last published held item is any bucket.
    pub fn holds_bucket(&self, connection: ConnectionId) -> bool {
        self.get(connection).and_then(ItemKind::bucket).is_some()
    }

    /// Drop the entry for a closed connection.
    pub fn forget(&self, connection: ConnectionId) {
        self.items.remove(&connection);
    }

    /// Number of connections with a published item.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is published.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Connections that registered the enrichment channel.
#[derive(Debug, Default)]
pub struct EnrichedConnections {
    connections: DashSet<ConnectionId>,
}

impl EnrichedConnections {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `connection` as able to send hints. Returns `true` if newly added.
    pub fn mark(&self, connection: ConnectionId) -> bool {
        self.connections.insert(connection)
    }

    /// Returns `true` if `connection` registered the channel.
    pub fn is_enriched(&self, connection: ConnectionId) -> bool {
        self.connections.contains(&connection)
    }

    /// Forget a closed connection.
    pub fn forget(&self, connection: ConnectionId) {
        self.connections.remove(&connection);
    }

    /// Number of enriched connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if no connection is enriched.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use hitsync_world::BucketKind;

    use super::*;

    #[test]
    fn test_publish_and_clear() {
        let snapshot = HeldItemSnapshot::new();
        let conn = ConnectionId(1);
        snapshot.publish(conn, Some(ItemKind::Bucket(BucketKind::Water)));
        assert!(snapshot.holds_bucket(conn));

        snapshot.publish(conn, Some(ItemKind::Stone));
        assert!(!snapshot.holds_bucket(conn));
        assert_eq!(snapshot.get(conn), Some(ItemKind::Stone));

        snapshot.publish(conn, None);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_forget_is_idempotent() {
        let snapshot = HeldItemSnapshot::new();
        snapshot.publish(ConnectionId(2), Some(ItemKind::Dirt));
        snapshot.forget(ConnectionId(2));
        snapshot.forget(ConnectionId(2));
        assert_eq!(snapshot.len(), 0);
    }

    #[test]
    fn test_enrichment_marking() {
        let enriched = EnrichedConnections::new();
        assert!(enriched.mark(ConnectionId(3)));
        assert!(!enriched.mark(ConnectionId(3)));
        assert!(enriched.is_enriched(ConnectionId(3)));
        enriched.forget(ConnectionId(3));
        assert!(!enriched.is_enriched(ConnectionId(3)));
        assert!(enriched.is_empty());
    }
}
