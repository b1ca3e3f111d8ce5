//! Line-based test client.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// A test client speaking the newline-delimited wire protocol.
pub struct TestClient {
    framed: Framed<TcpStream, LinesCodec>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new()),
        })
    }

    pub async fn send_line(&mut self, line: &str) -> anyhow::Result<()> {
        self.framed.send(line.to_string()).await?;
        Ok(())
    }

    /// Receive the next line, failing after a 2s timeout.
    pub async fn recv_line(&mut self) -> anyhow::Result<String> {
        match tokio::time::timeout(RECV_TIMEOUT, self.framed.next()).await {
            Ok(Some(Ok(line))) => Ok(line),
            Ok(Some(Err(e))) => anyhow::bail!("read error: {e}"),
            Ok(None) => anyhow::bail!("connection closed"),
            Err(_) => anyhow::bail!("timed out waiting for a line"),
        }
    }

    /// Receive a line only if one arrives within `dur`. `None` means silence,
    /// for must-not-receive assertions.
    pub async fn recv_within(&mut self, dur: Duration) -> Option<String> {
        match tokio::time::timeout(dur, self.framed.next()).await {
            Ok(Some(Ok(line))) => Some(line),
            _ => None,
        }
    }

    /// Read lines until one contains `needle`, returning it.
    pub async fn expect_containing(&mut self, needle: &str) -> anyhow::Result<String> {
        for _ in 0..16 {
            let line = self.recv_line().await?;
            if line.contains(needle) {
                return Ok(line);
            }
        }
        anyhow::bail!("no line containing {needle:?} arrived")
    }

    /// Whether the server has closed the stream.
    pub async fn assert_closed(&mut self) -> anyhow::Result<()> {
        match tokio::time::timeout(RECV_TIMEOUT, self.framed.next()).await {
            Ok(None) => Ok(()),
            Ok(Some(Ok(line))) => anyhow::bail!("expected close, got line {line:?}"),
            Ok(Some(Err(_))) => Ok(()),
            Err(_) => anyhow::bail!("expected close, connection still open"),
        }
    }
}
