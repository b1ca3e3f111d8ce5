//! Test server management.
//!
//! Spawns an in-process chatterd instance on an ephemeral port, wired to
//! memory backends so tests need no external redis. The hub handle stays
//! available for asserting on directory and registry state.

use chatterd::auth::StaticCredentials;
use chatterd::bus::{self, EventBus, MemoryBus};
use chatterd::config::UserEntry;
use chatterd::directory::{Directory, MemoryDirectory};
use chatterd::network::Gateway;
use chatterd::state::Hub;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Known test users; all share the password "1".
pub const TEST_USERS: [&str; 5] = ["a", "b", "c", "d", "e"];

/// An in-process test server instance.
pub struct TestServer {
    addr: SocketAddr,
    pub hub: Arc<Hub>,
}

impl TestServer {
    /// Spawn a new test server with memory backends.
    pub async fn spawn() -> anyhow::Result<Self> {
        let users: Vec<UserEntry> = TEST_USERS
            .iter()
            .map(|name| UserEntry {
                name: name.to_string(),
                // Minimum bcrypt cost keeps the suite fast.
                password_hash: bcrypt::hash("1", 4).expect("bcrypt hash"),
            })
            .collect();

        let directory: Arc<dyn Directory> = Arc::new(MemoryDirectory::new());
        let event_bus: Arc<dyn EventBus> = Arc::new(MemoryBus::new());
        let credentials = Arc::new(StaticCredentials::from_config(&users));
        let hub = Arc::new(Hub::new(
            "test.server",
            "lobby",
            directory,
            event_bus,
            credentials,
        ));

        bus::listener::spawn(Arc::clone(&hub));
        // Let the listener establish its subscription before any client can
        // publish an announcement.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let gateway = Gateway::bind("127.0.0.1:0".parse()?, None, Arc::clone(&hub)).await?;
        let addr = gateway.local_addr()?;
        tokio::spawn(async move {
            let _ = gateway.run().await;
        });

        Ok(Self { addr, hub })
    }

    /// Address of the plaintext listener.
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Open a raw, not-yet-authenticated connection.
    pub async fn connect(&self) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(self.addr).await
    }

    /// Connect and complete the login exchange for a test user, absorbing
    /// the welcome and default-room join lines.
    pub async fn login(&self, username: &str) -> anyhow::Result<super::client::TestClient> {
        let mut client = self.connect().await?;
        client.send_line(&format!("LOGIN {username} 1")).await?;
        client.expect_containing("Login successful").await?;
        client.expect_containing("You joined").await?;
        Ok(client)
    }
}
