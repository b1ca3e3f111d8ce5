//! The Connection Registry - process-local connection bookkeeping.
//!
//! Maps live connections to usernames and rooms so the bus listener can fan
//! events out to the sockets this process happens to hold. Never the source
//! of truth for cluster-wide membership; that lives in the shared directory,
//! and this cache is allowed to lag it briefly while a join is in flight.
//!
//! All maps sit behind one mutex. Lock holders only mutate or snapshot the
//! maps; socket writes happen after release, against cloned senders.

use crate::state::ConnId;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

/// Outbound line queue of a connection. The socket itself is written only by
/// the owning connection task; everyone else enqueues through this handle.
pub type Outbound = mpsc::Sender<String>;

#[derive(Default)]
struct RegistryInner {
    user_by_conn: HashMap<ConnId, String>,
    conn_by_user: HashMap<String, ConnId>,
    room_conns: HashMap<String, HashSet<ConnId>>,
    outbound: HashMap<ConnId, Outbound>,
}

/// Process-local registry of live connections.
pub struct ConnRegistry {
    default_room: String,
    inner: Mutex<RegistryInner>,
}

impl ConnRegistry {
    pub fn new(default_room: impl Into<String>) -> Self {
        Self {
            default_room: default_room.into(),
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Register a freshly authenticated connection and place it in the
    /// default room's local set.
    pub fn register(&self, conn: ConnId, username: &str, tx: Outbound) {
        let mut inner = self.inner.lock();
        inner.user_by_conn.insert(conn, username.to_string());
        inner.conn_by_user.insert(username.to_string(), conn);
        inner.outbound.insert(conn, tx);
        inner
            .room_conns
            .entry(self.default_room.clone())
            .or_default()
            .insert(conn);
    }

    /// Move a connection between room sets. Removal is a no-op when the
    /// connection is not in `from`.
    pub fn move_local(&self, conn: ConnId, from: &str, to: &str) {
        let mut inner = self.inner.lock();
        let now_empty = match inner.room_conns.get_mut(from) {
            Some(set) => {
                set.remove(&conn);
                set.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.room_conns.remove(from);
        }
        inner.room_conns.entry(to.to_string()).or_default().insert(conn);
    }

    /// Remove a connection from every map and every room set it might be in.
    pub fn deregister(&self, conn: ConnId) {
        let mut inner = self.inner.lock();
        if let Some(username) = inner.user_by_conn.remove(&conn) {
            // Only drop the reverse mapping if it still points at this
            // connection; a re-login may have claimed the name already.
            if inner.conn_by_user.get(&username) == Some(&conn) {
                inner.conn_by_user.remove(&username);
            }
        }
        inner.outbound.remove(&conn);
        inner.room_conns.retain(|_, set| {
            set.remove(&conn);
            !set.is_empty()
        });
    }

    /// Resolve a username to its outbound queue, for direct delivery.
    pub fn lookup_by_username(&self, username: &str) -> Option<Outbound> {
        let inner = self.inner.lock();
        let conn = inner.conn_by_user.get(username)?;
        inner.outbound.get(conn).cloned()
    }

    /// Snapshot of the connections currently in a room on this process.
    ///
    /// Returns `(conn, username, outbound)` triples; delivery runs against
    /// the snapshot after the lock is released, and one failed send must not
    /// abort the rest.
    pub fn local_members(&self, room: &str) -> Vec<(ConnId, String, Outbound)> {
        let inner = self.inner.lock();
        let Some(set) = inner.room_conns.get(room) else {
            return Vec::new();
        };
        set.iter()
            .filter_map(|conn| {
                let username = inner.user_by_conn.get(conn)?;
                let tx = inner.outbound.get(conn)?;
                Some((*conn, username.clone(), tx.clone()))
            })
            .collect()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.inner.lock().user_by_conn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
