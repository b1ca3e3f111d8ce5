//! Event bus abstraction and the routing event type.
//!
//! One logical pub/sub channel carries every routing event between all server
//! processes, the publisher's own process included. Events are decoded once,
//! at the subscription boundary; everything downstream matches on the closed
//! [`RoutingEvent`] enum.

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

pub mod listener;
pub mod memory;
pub mod redis;

pub use self::memory::MemoryBus;
pub use self::redis::RedisBus;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The unit of cross-process communication, carried as JSON on the bus.
///
/// Delivery is at-most-once per locally matching connection per event; there
/// is no ordering guarantee between events published by different processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingEvent {
    /// Broadcast to every connection in a room.
    RoomMsg {
        room: String,
        sender: Option<String>,
        content: String,
        /// Skip connections registered to `sender`; the acting connection
        /// already received a direct confirmation and must not see the same
        /// logical message twice.
        #[serde(default)]
        exclude_sender: bool,
    },
    /// Targeted delivery to wherever one user's connection lives.
    DirectMsg {
        target_user: String,
        content: String,
    },
}

impl RoutingEvent {
    /// Room broadcast from `sender` that skips the sender's own connections.
    pub fn room_excluding(
        room: impl Into<String>,
        sender: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::RoomMsg {
            room: room.into(),
            sender: Some(sender.into()),
            content: content.into(),
            exclude_sender: true,
        }
    }

    pub fn direct(target_user: impl Into<String>, content: impl Into<String>) -> Self {
        Self::DirectMsg {
            target_user: target_user.into(),
            content: content.into(),
        }
    }

    /// Static event kind label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomMsg { .. } => "room_msg",
            Self::DirectMsg { .. } => "direct_msg",
        }
    }
}

/// Stream of decoded routing events, in bus arrival order. Ends when the
/// underlying subscription drops; the listener resubscribes.
pub type BusStream = Pin<Box<dyn Stream<Item = RoutingEvent> + Send>>;

/// Publish/subscribe channel shared by all server processes.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one event to every subscribed process, this one included.
    async fn publish(&self, event: &RoutingEvent) -> Result<(), BusError>;

    /// Open a subscription yielding events in arrival order. Undecodable
    /// payloads are logged and skipped inside the stream, never surfaced.
    async fn subscribe(&self) -> Result<BusStream, BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_msg_wire_format() {
        let event = RoutingEvent::room_excluding("dev", "a", "a: hello");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "room_msg");
        assert_eq!(json["room"], "dev");
        assert_eq!(json["sender"], "a");
        assert_eq!(json["content"], "a: hello");
        assert_eq!(json["exclude_sender"], true);
    }

    #[test]
    fn test_direct_msg_wire_format() {
        let event = RoutingEvent::direct("b", "[Sub] a: hello");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "direct_msg");
        assert_eq!(json["target_user"], "b");
        assert_eq!(json["content"], "[Sub] a: hello");
    }

    #[test]
    fn test_decode_without_exclude_flag_defaults_false() {
        let json = r#"{"type":"room_msg","room":"lobby","sender":null,"content":"x"}"#;
        let event: RoutingEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            RoutingEvent::RoomMsg {
                room: "lobby".to_string(),
                sender: None,
                content: "x".to_string(),
                exclude_sender: false,
            }
        );
    }

    #[test]
    fn test_round_trip() {
        let event = RoutingEvent::direct("b", "hi");
        let json = serde_json::to_string(&event).unwrap();
        let back: RoutingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
