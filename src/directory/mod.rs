//! Shared directory abstraction.
//!
//! The directory is the cluster-wide authoritative record of sessions, room
//! membership, user→room assignments, and subscriber sets. Every server
//! process talks to the same store; its atomic set/hash operations are the
//! only cross-process coordination this system relies on.

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryDirectory;
pub use self::redis::RedisDirectory;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Cluster-wide authoritative chat state.
///
/// Operations are synchronous round-trips to the backing store and may block
/// on it; callers must not hold the connection registry lock across them.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Whether a session record exists for this username, anywhere in the
    /// cluster.
    async fn session_exists(&self, username: &str) -> Result<bool, DirectoryError>;

    /// Record an active session for this username.
    ///
    /// This and [`session_exists`](Self::session_exists) are deliberately two
    /// separate operations: two concurrent logins for the same name can both
    /// pass the existence check before either writes. The window is a known,
    /// accepted limitation of the protocol.
    async fn create_session(&self, username: &str) -> Result<(), DirectoryError>;

    /// Remove the session record, if any.
    async fn remove_session(&self, username: &str) -> Result<(), DirectoryError>;

    /// The room this user is currently assigned to, if recorded.
    async fn user_room(&self, username: &str) -> Result<Option<String>, DirectoryError>;

    /// Assign the user to a room.
    async fn set_user_room(&self, username: &str, room: &str) -> Result<(), DirectoryError>;

    /// Drop the user→room assignment.
    async fn clear_user_room(&self, username: &str) -> Result<(), DirectoryError>;

    /// Add a user to a room's member set.
    async fn room_add(&self, room: &str, username: &str) -> Result<(), DirectoryError>;

    /// Remove a user from a room's member set. Rooms with no members cease
    /// to exist.
    async fn room_remove(&self, room: &str, username: &str) -> Result<(), DirectoryError>;

    /// Current members of a room across the whole cluster.
    async fn room_members(&self, room: &str) -> Result<HashSet<String>, DirectoryError>;

    /// All rooms with their member counts.
    async fn list_rooms(&self) -> Result<Vec<(String, usize)>, DirectoryError>;

    /// Record `subscriber` as subscribed to `publisher`. Idempotent.
    async fn subscribe(&self, publisher: &str, subscriber: &str) -> Result<(), DirectoryError>;

    /// Remove the relation. Returns whether it existed.
    async fn unsubscribe(&self, publisher: &str, subscriber: &str)
    -> Result<bool, DirectoryError>;

    /// Everyone subscribed to `publisher`.
    async fn subscribers(&self, publisher: &str) -> Result<HashSet<String>, DirectoryError>;
}
