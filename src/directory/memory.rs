//! In-process directory backend.
//!
//! Mirrors the redis key semantics on concurrent maps. With this backend the
//! "cluster" is a single process; used by tests and single-node deployments.

use super::{Directory, DirectoryError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;

/// Directory backend over in-process concurrent maps.
#[derive(Default)]
pub struct MemoryDirectory {
    sessions: DashMap<String, String>,
    user_rooms: DashMap<String, String>,
    rooms: DashMap<String, HashSet<String>>,
    subs: DashMap<String, HashSet<String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn session_exists(&self, username: &str) -> Result<bool, DirectoryError> {
        Ok(self.sessions.contains_key(username))
    }

    async fn create_session(&self, username: &str) -> Result<(), DirectoryError> {
        let stamp = chrono::Utc::now().to_rfc3339();
        self.sessions.insert(username.to_string(), stamp);
        Ok(())
    }

    async fn remove_session(&self, username: &str) -> Result<(), DirectoryError> {
        self.sessions.remove(username);
        Ok(())
    }

    async fn user_room(&self, username: &str) -> Result<Option<String>, DirectoryError> {
        Ok(self.user_rooms.get(username).map(|r| r.value().clone()))
    }

    async fn set_user_room(&self, username: &str, room: &str) -> Result<(), DirectoryError> {
        self.user_rooms.insert(username.to_string(), room.to_string());
        Ok(())
    }

    async fn clear_user_room(&self, username: &str) -> Result<(), DirectoryError> {
        self.user_rooms.remove(username);
        Ok(())
    }

    async fn room_add(&self, room: &str, username: &str) -> Result<(), DirectoryError> {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(username.to_string());
        Ok(())
    }

    async fn room_remove(&self, room: &str, username: &str) -> Result<(), DirectoryError> {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(username);
        }
        // Match redis: a set with no members does not exist.
        self.rooms.remove_if(room, |_, members| members.is_empty());
        Ok(())
    }

    async fn room_members(&self, room: &str) -> Result<HashSet<String>, DirectoryError> {
        Ok(self
            .rooms
            .get(room)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }

    async fn list_rooms(&self) -> Result<Vec<(String, usize)>, DirectoryError> {
        Ok(self
            .rooms
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect())
    }

    async fn subscribe(&self, publisher: &str, subscriber: &str) -> Result<(), DirectoryError> {
        self.subs
            .entry(publisher.to_string())
            .or_default()
            .insert(subscriber.to_string());
        Ok(())
    }

    async fn unsubscribe(
        &self,
        publisher: &str,
        subscriber: &str,
    ) -> Result<bool, DirectoryError> {
        let removed = self
            .subs
            .get_mut(publisher)
            .map(|mut set| set.remove(subscriber))
            .unwrap_or(false);
        self.subs.remove_if(publisher, |_, set| set.is_empty());
        Ok(removed)
    }

    async fn subscribers(&self, publisher: &str) -> Result<HashSet<String>, DirectoryError> {
        Ok(self
            .subs
            .get(publisher)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }
}
