//! Connection - handles an individual client connection.
//!
//! Each Connection runs in its own tokio task in two phases:
//!
//! 1. Handshake: exactly one `LOGIN <username> <password>` line, verified
//!    against the credential store and de-duplicated against the shared
//!    directory. Any rejection replies and closes; there is no retry.
//! 2. Unified loop: `tokio::select!` over framed line input (driving the
//!    command processor) and the connection's outbound queue (replies from
//!    handlers plus routed deliveries from the bus listener).
//!
//! On exit the full cleanup path runs: shared directory records first, then
//! the departure announcement, then the local registry purge.

use crate::bus::RoutingEvent;
use crate::directory::DirectoryError;
use crate::error::{HandshakeFailure, HandshakeRejection};
use crate::handlers::{self, Context};
use crate::metrics;
use crate::state::{ConnId, Hub, Outbound};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, instrument, warn};

const MAX_LINE_LENGTH: usize = 1024;
const OUTGOING_QUEUE: usize = 64;

/// A client connection handler, generic over the byte stream so plaintext
/// and TLS connections share one code path.
pub struct Connection<S> {
    conn_id: ConnId,
    addr: SocketAddr,
    hub: Arc<Hub>,
    framed: Framed<S, LinesCodec>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(conn_id: ConnId, stream: S, addr: SocketAddr, hub: Arc<Hub>) -> Self {
        Self {
            conn_id,
            addr,
            hub,
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
        }
    }

    /// Run the connection to completion.
    #[instrument(skip(self), fields(conn_id = %self.conn_id, addr = %self.addr), name = "connection")]
    pub async fn run(mut self) -> anyhow::Result<()> {
        // Phase 1: handshake.
        let Some(username) = self.handshake().await else {
            return Ok(());
        };

        // Outbound queue: handlers and the bus listener enqueue, only this
        // task writes the socket.
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<String>(OUTGOING_QUEUE);

        if let Err(e) = self.admit(&username, &outgoing_tx).await {
            error!(error = %e, "Directory unreachable during registration");
            self.rollback_admit(&username).await;
            return Ok(());
        }
        metrics::client_connected();
        info!(
            server = %self.hub.server_name,
            user = %username,
            "Client authenticated"
        );

        // Phase 2: unified loop.
        loop {
            tokio::select! {
                result = self.framed.next() => match result {
                    Some(Ok(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        // Resolve the current room once per command so the
                        // processor never re-reads it mid-flight.
                        let current_room = match self.hub.directory.user_room(&username).await {
                            Ok(Some(room)) => room,
                            Ok(None) => self.hub.default_room.clone(),
                            Err(e) => {
                                warn!(error = %e, "Directory unreachable; command dropped");
                                continue;
                            }
                        };
                        let ctx = Context {
                            hub: &self.hub,
                            conn_id: self.conn_id,
                            username: &username,
                            reply: &outgoing_tx,
                        };
                        if let Err(e) = handlers::dispatch(&ctx, &current_room, line).await {
                            warn!(error = %e, code = e.error_code(), "Command failed");
                        }
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "Read error");
                        break;
                    }
                    None => {
                        info!("Client disconnected");
                        break;
                    }
                },
                Some(line) = outgoing_rx.recv() => {
                    if let Err(e) = self.framed.send(line).await {
                        debug!(error = %e, "Write error");
                        break;
                    }
                }
            }
        }

        self.cleanup(&username).await;
        metrics::client_disconnected();
        Ok(())
    }

    /// Read and answer the one-shot login exchange. Returns the authenticated
    /// username, or `None` when the connection must close.
    async fn handshake(&mut self) -> Option<String> {
        let line = match self.framed.next().await {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                debug!(error = %e, "Read error during handshake");
                return None;
            }
            None => {
                info!("Client disconnected during handshake");
                return None;
            }
        };

        match self.authenticate(line.trim()).await {
            Ok(username) => {
                let welcome = format!("Login successful. Welcome {username}!");
                if let Err(e) = self.framed.send(welcome).await {
                    warn!(error = %e, "Write error during handshake");
                    // The session record was just created; take it back so
                    // the name is not locked out until a manual purge.
                    let _ = self.hub.directory.remove_session(&username).await;
                    return None;
                }
                Some(username)
            }
            Err(HandshakeFailure::Rejected(rejection)) => {
                metrics::record_login_rejection(rejection.error_code());
                info!(reason = rejection.error_code(), "Login rejected");
                let _ = self.framed.send(rejection.reply_line().to_string()).await;
                None
            }
            Err(HandshakeFailure::Directory(e)) => {
                error!(error = %e, "Directory unreachable during handshake");
                None
            }
        }
    }

    /// Validate the login line against the credential store, then claim the
    /// session in the shared directory.
    async fn authenticate(&self, line: &str) -> Result<String, HandshakeFailure> {
        let Some((username, password)) = parse_login(line) else {
            return Err(HandshakeRejection::MalformedLogin.into());
        };
        // Unknown users and wrong passwords are indistinguishable on the wire.
        if !self.hub.credentials.verify(username, password) {
            return Err(HandshakeRejection::InvalidCredentials.into());
        }
        // Existence check and session write are separate round-trips; two
        // concurrent logins can race through the gap (see Directory docs).
        if self.hub.directory.session_exists(username).await? {
            return Err(HandshakeRejection::DuplicateSession.into());
        }
        self.hub.directory.create_session(username).await?;
        Ok(username.to_string())
    }

    /// Enter the default room: shared directory first, then the local
    /// registry, then the arrival announcement and the direct welcome.
    async fn admit(
        &mut self,
        username: &str,
        outgoing_tx: &Outbound,
    ) -> Result<(), DirectoryError> {
        let room = self.hub.default_room.clone();
        self.hub.directory.set_user_room(username, &room).await?;
        self.hub.directory.room_add(&room, username).await?;

        self.hub
            .registry
            .register(self.conn_id, username, outgoing_tx.clone());

        let announcement = RoutingEvent::room_excluding(
            room.as_str(),
            username,
            format!("🟢 {username} joined {room}"),
        );
        metrics::record_event_published(announcement.kind());
        if let Err(e) = self.hub.bus.publish(&announcement).await {
            warn!(error = %e, "Failed to publish join announcement");
        }
        let _ = outgoing_tx.try_send(format!("🟢 You joined {room}"));
        Ok(())
    }

    /// Best-effort undo of a partially applied admission.
    async fn rollback_admit(&self, username: &str) {
        let room = self.hub.default_room.clone();
        let _ = self.hub.directory.room_remove(&room, username).await;
        let _ = self.hub.directory.clear_user_room(username).await;
        let _ = self.hub.directory.remove_session(username).await;
        self.hub.registry.deregister(self.conn_id);
    }

    /// Full disconnect cleanup. Every step is best-effort: an unreachable
    /// directory must never leave stale entries in the local registry.
    async fn cleanup(&self, username: &str) {
        let directory = &self.hub.directory;

        let current_room = match directory.user_room(username).await {
            Ok(room) => room,
            Err(e) => {
                warn!(error = %e, "Directory unreachable during cleanup");
                None
            }
        };

        if let Err(e) = directory.remove_session(username).await {
            warn!(error = %e, "Failed to remove session record");
        }

        if let Some(room) = current_room {
            if let Err(e) = directory.room_remove(&room, username).await {
                warn!(error = %e, room = %room, "Failed to remove room membership");
            }
            if let Err(e) = directory.clear_user_room(username).await {
                warn!(error = %e, "Failed to clear room assignment");
            }
            let departure = RoutingEvent::room_excluding(
                room.as_str(),
                username,
                format!("🔴 {username} left"),
            );
            metrics::record_event_published(departure.kind());
            if let Err(e) = self.hub.bus.publish(&departure).await {
                warn!(error = %e, "Failed to publish departure");
            }
        }

        self.hub.registry.deregister(self.conn_id);
    }
}

/// Parse a `LOGIN <username> <password>` line. The password is the entire
/// remainder, spaces included.
fn parse_login(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("LOGIN"), Some(username), Some(password))
            if !username.is_empty() && !password.is_empty() =>
        {
            Some((username, password))
        }
        _ => None,
    }
}
