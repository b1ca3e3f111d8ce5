//! The Hub - shared handles every task works through.

use crate::auth::CredentialStore;
use crate::bus::EventBus;
use crate::directory::Directory;
use crate::state::{ConnIdGenerator, ConnRegistry};
use std::sync::Arc;

/// Central shared state container, cloned behind an `Arc` into the gateway,
/// every connection task, and the bus listener.
pub struct Hub {
    /// This server's name, for logging.
    pub server_name: String,

    /// Room a connection lands in after login and after `/leave`.
    pub default_room: String,

    /// Process-local connection registry.
    pub registry: ConnRegistry,

    /// Cluster-wide authoritative state.
    pub directory: Arc<dyn Directory>,

    /// Cross-process routing events.
    pub bus: Arc<dyn EventBus>,

    /// Login credential verification.
    pub credentials: Arc<dyn CredentialStore>,

    /// Connection id generator for new connections.
    pub conn_ids: ConnIdGenerator,
}

impl Hub {
    pub fn new(
        server_name: impl Into<String>,
        default_room: impl Into<String>,
        directory: Arc<dyn Directory>,
        bus: Arc<dyn EventBus>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let default_room = default_room.into();
        Self {
            server_name: server_name.into(),
            registry: ConnRegistry::new(default_room.clone()),
            default_room,
            directory,
            bus,
            credentials,
            conn_ids: ConnIdGenerator::new(),
        }
    }
}
