//! In-process event bus over a broadcast channel.
//!
//! Single-process stand-in for the redis bus: publishers and the local bus
//! listener see the same arrival order, and publishing with no subscriber is
//! not an error.

use super::{BusError, BusStream, EventBus, RoutingEvent};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

const CHANNEL_CAPACITY: usize = 256;

/// Event bus backed by `tokio::sync::broadcast`.
pub struct MemoryBus {
    tx: broadcast::Sender<RoutingEvent>,
}

impl MemoryBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, event: &RoutingEvent) -> Result<(), BusError> {
        // No receivers is fine; the event is simply unobserved.
        let _ = self.tx.send(event.clone());
        Ok(())
    }

    async fn subscribe(&self) -> Result<BusStream, BusError> {
        let rx = self.tx.subscribe();
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Bus subscriber lagged; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}
