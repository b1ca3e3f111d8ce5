//! Redis-backed shared directory.
//!
//! Key schema, shared by every server process:
//! - `sessions`     hash: username -> login timestamp
//! - `user:room`    hash: username -> current room
//! - `room:<name>`  set of member usernames
//! - `subs:<name>`  set of usernames subscribed to `<name>`

use super::{Directory, DirectoryError};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::collections::HashSet;

const SESSIONS_KEY: &str = "sessions";
const USER_ROOM_KEY: &str = "user:room";
const ROOM_PREFIX: &str = "room:";
const SUBS_PREFIX: &str = "subs:";

/// Directory backend over a multiplexed async Redis connection.
pub struct RedisDirectory {
    conn: MultiplexedConnection,
}

impl RedisDirectory {
    /// Connect to the Redis instance at `url`.
    pub async fn connect(url: &str) -> Result<Self, DirectoryError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { conn })
    }

    /// Cheap clone of the multiplexed connection for one command pipeline.
    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    fn room_key(room: &str) -> String {
        format!("{ROOM_PREFIX}{room}")
    }

    fn subs_key(username: &str) -> String {
        format!("{SUBS_PREFIX}{username}")
    }
}

#[async_trait]
impl Directory for RedisDirectory {
    async fn session_exists(&self, username: &str) -> Result<bool, DirectoryError> {
        let exists: bool = self.conn().hexists(SESSIONS_KEY, username).await?;
        Ok(exists)
    }

    async fn create_session(&self, username: &str) -> Result<(), DirectoryError> {
        let stamp = chrono::Utc::now().to_rfc3339();
        let _: () = self.conn().hset(SESSIONS_KEY, username, stamp).await?;
        Ok(())
    }

    async fn remove_session(&self, username: &str) -> Result<(), DirectoryError> {
        let _: () = self.conn().hdel(SESSIONS_KEY, username).await?;
        Ok(())
    }

    async fn user_room(&self, username: &str) -> Result<Option<String>, DirectoryError> {
        let room: Option<String> = self.conn().hget(USER_ROOM_KEY, username).await?;
        Ok(room)
    }

    async fn set_user_room(&self, username: &str, room: &str) -> Result<(), DirectoryError> {
        let _: () = self.conn().hset(USER_ROOM_KEY, username, room).await?;
        Ok(())
    }

    async fn clear_user_room(&self, username: &str) -> Result<(), DirectoryError> {
        let _: () = self.conn().hdel(USER_ROOM_KEY, username).await?;
        Ok(())
    }

    async fn room_add(&self, room: &str, username: &str) -> Result<(), DirectoryError> {
        let _: () = self.conn().sadd(Self::room_key(room), username).await?;
        Ok(())
    }

    async fn room_remove(&self, room: &str, username: &str) -> Result<(), DirectoryError> {
        // Redis drops a set key once its last member is removed, which is
        // exactly the "empty rooms cease to exist" rule.
        let _: () = self.conn().srem(Self::room_key(room), username).await?;
        Ok(())
    }

    async fn room_members(&self, room: &str) -> Result<HashSet<String>, DirectoryError> {
        let members: HashSet<String> = self.conn().smembers(Self::room_key(room)).await?;
        Ok(members)
    }

    async fn list_rooms(&self) -> Result<Vec<(String, usize)>, DirectoryError> {
        let mut conn = self.conn();
        let keys: Vec<String> = conn.keys(format!("{ROOM_PREFIX}*")).await?;
        let mut rooms = Vec::with_capacity(keys.len());
        for key in keys {
            let count: usize = conn.scard(&key).await?;
            let name = key.strip_prefix(ROOM_PREFIX).unwrap_or(&key).to_string();
            rooms.push((name, count));
        }
        Ok(rooms)
    }

    async fn subscribe(&self, publisher: &str, subscriber: &str) -> Result<(), DirectoryError> {
        let _: () = self
            .conn()
            .sadd(Self::subs_key(publisher), subscriber)
            .await?;
        Ok(())
    }

    async fn unsubscribe(
        &self,
        publisher: &str,
        subscriber: &str,
    ) -> Result<bool, DirectoryError> {
        let removed: i64 = self
            .conn()
            .srem(Self::subs_key(publisher), subscriber)
            .await?;
        Ok(removed > 0)
    }

    async fn subscribers(&self, publisher: &str) -> Result<HashSet<String>, DirectoryError> {
        let subs: HashSet<String> = self.conn().smembers(Self::subs_key(publisher)).await?;
        Ok(subs)
    }
}
