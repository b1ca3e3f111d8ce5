//! Gateway - TCP/TLS listener that accepts incoming connections.
//!
//! The Gateway binds to sockets and spawns a Connection task for each
//! incoming client. Supports both plaintext and TLS connections; TLS exists
//! so deployments can terminate encryption in-process, but the chat core
//! only ever sees a byte stream.

use crate::config::TlsConfig;
use crate::network::Connection;
use crate::state::Hub;
use rustls_pemfile::{certs, pkcs8_private_keys};
use std::io::{BufReader, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::{error, info, instrument, warn};

/// The Gateway accepts incoming TCP/TLS connections and spawns handlers.
pub struct Gateway {
    plaintext_listener: TcpListener,
    tls_listener: Option<(TcpListener, TlsAcceptor)>,
    hub: Arc<Hub>,
}

impl Gateway {
    /// Bind the gateway to the specified addresses.
    pub async fn bind(
        addr: SocketAddr,
        tls_config: Option<TlsConfig>,
        hub: Arc<Hub>,
    ) -> anyhow::Result<Self> {
        let plaintext_listener = TcpListener::bind(addr).await?;
        info!(%addr, "Plaintext listener bound");

        let tls_listener = if let Some(tls_cfg) = tls_config {
            let tls_acceptor = Self::load_tls(&tls_cfg)?;
            let listener = TcpListener::bind(tls_cfg.address).await?;
            info!(address = %tls_cfg.address, "TLS listener bound");
            Some((listener, tls_acceptor))
        } else {
            None
        };

        Ok(Self {
            plaintext_listener,
            tls_listener,
            hub,
        })
    }

    /// The bound plaintext address (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.plaintext_listener.local_addr()
    }

    /// Load TLS certificates and create a TlsAcceptor.
    fn load_tls(config: &TlsConfig) -> anyhow::Result<TlsAcceptor> {
        let cert_file = std::fs::read(&config.cert_path)?;
        let cert_reader = &mut BufReader::new(Cursor::new(cert_file));
        let certs: Vec<CertificateDer> = certs(cert_reader).collect::<Result<Vec<_>, _>>()?;

        if certs.is_empty() {
            anyhow::bail!("No certificates found in {}", config.cert_path);
        }

        let key_file = std::fs::read(&config.key_path)?;
        let key_reader = &mut BufReader::new(Cursor::new(key_file));
        let mut keys: Vec<PrivateKeyDer> = pkcs8_private_keys(key_reader)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(PrivateKeyDer::from)
            .collect();

        if keys.is_empty() {
            anyhow::bail!("No private keys found in {}", config.key_path);
        }

        let key = keys.remove(0);
        let tls_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(TlsAcceptor::from(Arc::new(tls_config)))
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        let hub = Arc::clone(&self.hub);

        if let Some((tls_listener, tls_acceptor)) = self.tls_listener {
            let hub_tls = Arc::clone(&hub);

            tokio::spawn(async move {
                loop {
                    match tls_listener.accept().await {
                        Ok((stream, addr)) => {
                            info!(%addr, "TLS connection accepted");
                            let hub = Arc::clone(&hub_tls);
                            let conn_id = hub.conn_ids.next();
                            let acceptor = tls_acceptor.clone();

                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        let connection =
                                            Connection::new(conn_id, tls_stream, addr, hub);
                                        if let Err(e) = connection.run().await {
                                            error!(conn_id, %addr, error = %e, "TLS connection error");
                                        }
                                        info!(conn_id, %addr, "TLS connection closed");
                                    }
                                    Err(e) => {
                                        warn!(%addr, error = %e, "TLS handshake failed");
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept TLS connection");
                        }
                    }
                }
            });
        }

        loop {
            match self.plaintext_listener.accept().await {
                Ok((stream, addr)) => {
                    info!(%addr, "Connection accepted");
                    let hub = Arc::clone(&hub);
                    let conn_id = hub.conn_ids.next();

                    tokio::spawn(async move {
                        let connection = Connection::new(conn_id, stream, addr, hub);
                        if let Err(e) = connection.run().await {
                            error!(conn_id, %addr, error = %e, "Connection error");
                        }
                        info!(conn_id, %addr, "Connection closed");
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}
