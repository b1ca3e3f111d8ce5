//! chatterd - multi-process chat routing daemon.

use anyhow::Context as _;
use chatterd::auth::StaticCredentials;
use chatterd::bus::{self, EventBus, MemoryBus, RedisBus};
use chatterd::config::Config;
use chatterd::directory::{Directory, MemoryDirectory, RedisDirectory};
use chatterd::network::Gateway;
use chatterd::state::Hub;
use chatterd::{http, metrics};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        listen = %config.server.listen,
        default_room = %config.server.default_room,
        "Starting chatterd"
    );

    if config.users.is_empty() {
        warn!("No users configured; every login will be rejected");
    }

    // Shared directory backend.
    let directory: Arc<dyn Directory> = match config.directory.backend.as_str() {
        "redis" => {
            info!(url = %config.directory.url, "Connecting shared directory");
            Arc::new(
                RedisDirectory::connect(&config.directory.url)
                    .await
                    .context("connecting redis directory")?,
            )
        }
        other => {
            info!(backend = %other, "Directory backend is process-local; cluster state will not be shared");
            Arc::new(MemoryDirectory::new())
        }
    };

    // Event bus backend.
    let event_bus: Arc<dyn EventBus> = match config.bus.backend.as_str() {
        "redis" => {
            info!(url = %config.bus.url, channel = %config.bus.channel, "Connecting event bus");
            Arc::new(
                RedisBus::connect(&config.bus.url, config.bus.channel.clone())
                    .await
                    .context("connecting redis event bus")?,
            )
        }
        other => {
            info!(backend = %other, "Event bus is process-local; routing events stay in this process");
            Arc::new(MemoryBus::new())
        }
    };

    let credentials = Arc::new(StaticCredentials::from_config(&config.users));
    info!(users = credentials.len(), "Credential store loaded");

    let hub = Arc::new(Hub::new(
        config.server.name.clone(),
        config.server.default_room.clone(),
        directory,
        event_bus,
        credentials,
    ));

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        tokio::spawn(http::run_metrics_server(metrics_port));
        info!(port = metrics_port, "Metrics endpoint started");
    }

    // Delivery backbone: one listener per process, for the process lifetime.
    bus::listener::spawn(Arc::clone(&hub));
    info!("Bus listener started");

    let gateway = Gateway::bind(config.server.listen, config.tls.clone(), hub).await?;
    gateway.run().await
}
