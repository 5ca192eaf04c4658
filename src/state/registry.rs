//! Session registry.
//!
//! Maps an account id to the set of live connections currently authenticated
//! as it. This map is the only record of "who gets notified": connections
//! do not keep a second copy of their memberships.
//!
//! A connection may authenticate as a different account on a later message
//! (token renewal). It is then added under the new account and kept under the
//! old one until it closes, so one connection can sit in several live-sets.

use crate::db::UserId;
use crate::protocol::Event;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Ephemeral, random per-connection id.
pub type ConnectionId = Uuid;

/// Outbound queue of one connection.
pub type Outbox = mpsc::Sender<Arc<Event>>;

/// Per-account live connection sets.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    live: DashMap<UserId, HashMap<ConnectionId, Outbox>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to an account's live-set.
    ///
    /// Idempotent; the first registration for an account creates its set.
    /// Returns `true` if the connection was not already present.
    pub fn register(&self, identity: UserId, conn: ConnectionId, outbox: &Outbox) -> bool {
        let mut set = self.live.entry(identity).or_default();
        if set.contains_key(&conn) {
            return false;
        }
        set.insert(conn, outbox.clone());
        true
    }

    /// Remove a connection from every live-set it is in.
    ///
    /// Unknown connections are a no-op. Returns how many sets it was removed from.
    ///
    /// Connections do not track their memberships, so this is one pass over
    /// every live-set, write-locking each shard in turn. Sets left empty are
    /// dropped in the same pass.
    pub fn unregister(&self, conn: ConnectionId) -> usize {
        let mut removed = 0;
        self.live.retain(|_, set| {
            if set.remove(&conn).is_some() {
                removed += 1;
            }
            !set.is_empty()
        });
        removed
    }

    /// Call `f` for each live connection of `identity`.
    ///
    /// Does nothing for an account with no live-set, and never creates one.
    /// The outboxes are cloned first so no shard lock is held while `f` runs.
    pub fn for_each_live<F>(&self, identity: UserId, mut f: F)
    where
        F: FnMut(ConnectionId, &Outbox),
    {
        let snapshot: Vec<(ConnectionId, Outbox)> = match self.live.get(&identity) {
            Some(set) => set.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
            None => return,
        };
        for (id, tx) in &snapshot {
            f(*id, tx);
        }
    }

    /// Number of live connections for `identity`.
    #[cfg(test)]
    pub fn live_count(&self, identity: UserId) -> usize {
        self.live.get(&identity).map_or(0, |set| set.len())
    }

    /// Whether `conn` is in `identity`'s live-set.
    #[cfg(test)]
    pub fn is_registered(&self, identity: UserId, conn: ConnectionId) -> bool {
        self.live
            .get(&identity)
            .is_some_and(|set| set.contains_key(&conn))
    }

    /// Number of accounts with at least one live connection.
    #[cfg(test)]
    pub fn identity_count(&self) -> usize {
        self.live.len()
    }
}
