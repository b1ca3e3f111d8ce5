//! HTTP endpoint for Prometheus scraping.

use axum::{Router, routing::get};
use std::net::SocketAddr;
use tracing::{error, info};

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Serve `GET /metrics` on `0.0.0.0:port`. Long-running; spawn it in the
/// background. Bind or serve failures are logged, not fatal to the server.
pub async fn run_metrics_server(port: u16) {
    let app = Router::new().route("/metrics", get(metrics_handler));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind metrics endpoint");
            return;
        }
    };
    info!(%addr, "Metrics endpoint listening");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Metrics endpoint error");
    }
}
