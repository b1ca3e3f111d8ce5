//! The bus listener - delivery backbone of a server process.
//!
//! One task per process drains the event bus subscription for the process
//! lifetime and fans each event out to locally registered connections. The
//! task survives every transient failure: a dropped subscription or a failed
//! resubscribe is logged and retried, never fatal.

use crate::bus::RoutingEvent;
use crate::metrics;
use crate::state::{ConnRegistry, Hub};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(2);

/// Spawn the per-process bus listener task.
pub fn spawn(hub: Arc<Hub>) -> JoinHandle<()> {
    tokio::spawn(run(hub))
}

async fn run(hub: Arc<Hub>) {
    loop {
        match hub.bus.subscribe().await {
            Ok(mut stream) => {
                info!("Bus subscription established");
                while let Some(event) = stream.next().await {
                    metrics::record_event_dispatched();
                    deliver(&hub.registry, &event);
                }
                warn!("Bus subscription ended; resubscribing");
            }
            Err(e) => {
                warn!(error = %e, "Bus subscribe failed; retrying");
            }
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

/// Fan one event out to the matching connections this process holds.
///
/// The registry snapshot is taken first; sends run against it without the
/// lock. A full or closed queue means a dead or drowning connection - the
/// delivery is dropped and its reader loop will clean the connection up.
pub fn deliver(registry: &ConnRegistry, event: &RoutingEvent) {
    match event {
        RoutingEvent::RoomMsg {
            room,
            sender,
            content,
            exclude_sender,
        } => {
            let members = registry.local_members(room);
            metrics::record_fanout(members.len());
            for (conn, username, tx) in members {
                if *exclude_sender && sender.as_deref() == Some(username.as_str()) {
                    continue;
                }
                if tx.try_send(content.clone()).is_err() {
                    metrics::record_delivery_failure();
                    debug!(conn, room = %room, user = %username, "Dropped room delivery");
                }
            }
        }
        RoutingEvent::DirectMsg {
            target_user,
            content,
        } => {
            let Some(tx) = registry.lookup_by_username(target_user) else {
                return;
            };
            if tx.try_send(content.clone()).is_err() {
                metrics::record_delivery_failure();
                debug!(user = %target_user, "Dropped direct delivery");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registry_with(users: &[(u64, &str)]) -> (ConnRegistry, Vec<mpsc::Receiver<String>>) {
        let registry = ConnRegistry::new("lobby");
        let mut receivers = Vec::new();
        for (conn, user) in users {
            let (tx, rx) = mpsc::channel(8);
            registry.register(*conn, user, tx);
            receivers.push(rx);
        }
        (registry, receivers)
    }

    #[test]
    fn test_room_delivery_excludes_sender() {
        let (registry, mut rxs) = registry_with(&[(1, "a"), (2, "b")]);

        deliver(
            &registry,
            &RoutingEvent::room_excluding("lobby", "a", "a: hi"),
        );

        // Sender "a" gets nothing; "b" gets the line.
        assert!(rxs[0].try_recv().is_err());
        assert_eq!(rxs[1].try_recv().unwrap(), "a: hi");
    }

    #[test]
    fn test_room_delivery_without_exclusion_reaches_all() {
        let (registry, mut rxs) = registry_with(&[(1, "a"), (2, "b")]);

        deliver(
            &registry,
            &RoutingEvent::RoomMsg {
                room: "lobby".to_string(),
                sender: None,
                content: "notice".to_string(),
                exclude_sender: false,
            },
        );

        assert_eq!(rxs[0].try_recv().unwrap(), "notice");
        assert_eq!(rxs[1].try_recv().unwrap(), "notice");
    }

    #[test]
    fn test_direct_delivery_targets_one_user() {
        let (registry, mut rxs) = registry_with(&[(1, "a"), (2, "b")]);

        deliver(&registry, &RoutingEvent::direct("b", "[Sub] a: hi"));

        assert!(rxs[0].try_recv().is_err());
        assert_eq!(rxs[1].try_recv().unwrap(), "[Sub] a: hi");
    }

    #[test]
    fn test_direct_delivery_to_absent_user_is_noop() {
        let (registry, _rxs) = registry_with(&[(1, "a")]);
        deliver(&registry, &RoutingEvent::direct("z", "hi"));
    }

    #[test]
    fn test_one_dead_connection_does_not_abort_fanout() {
        let registry = ConnRegistry::new("lobby");
        let (tx_dead, rx_dead) = mpsc::channel(8);
        let (tx_live, mut rx_live) = mpsc::channel(8);
        registry.register(1, "a", tx_dead);
        registry.register(2, "b", tx_live);
        drop(rx_dead);

        deliver(
            &registry,
            &RoutingEvent::RoomMsg {
                room: "lobby".to_string(),
                sender: None,
                content: "still here".to_string(),
                exclude_sender: false,
            },
        );

        assert_eq!(rx_live.try_recv().unwrap(), "still here");
    }

    #[test]
    fn test_delivery_to_empty_room_is_noop() {
        let (registry, _rxs) = registry_with(&[(1, "a")]);
        deliver(
            &registry,
            &RoutingEvent::room_excluding("ghost-town", "a", "hello?"),
        );
    }
}
