//! Redis pub/sub event bus.

use super::{BusError, BusStream, EventBus, RoutingEvent};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::warn;

/// Event bus over one Redis pub/sub channel.
///
/// Publishing uses a multiplexed connection; each subscription opens its own
/// dedicated pub/sub connection, as redis requires.
pub struct RedisBus {
    client: redis::Client,
    conn: MultiplexedConnection,
    channel: String,
}

impl RedisBus {
    /// Connect to the Redis instance at `url`, publishing on `channel`.
    pub async fn connect(url: &str, channel: impl Into<String>) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self {
            client,
            conn,
            channel: channel.into(),
        })
    }
}

#[async_trait]
impl EventBus for RedisBus {
    async fn publish(&self, event: &RoutingEvent) -> Result<(), BusError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();
        let _: () = conn.publish(&self.channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<BusStream, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "Non-text payload on bus channel; skipping");
                    return None;
                }
            };
            match serde_json::from_str::<RoutingEvent>(&payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, payload = %payload, "Undecodable routing event; skipping");
                    None
                }
            }
        });
        Ok(Box::pin(stream))
    }
}
