//! Transport layer for Oracle connections
//!
//! A transport moves raw bytes. Framing, buffering and the packet state machine
//! live in the session; the transport only reads exact lengths, writes whole
//! buffers and, for TLS, re-runs the handshake when the server asks for it.

mod tcp;
pub mod tls;

pub use tcp::TcpTransport;
pub use tls::{TlsConfig, TlsTransport};

use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::error::Result;

/// Trait for transport implementations
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Write the whole buffer and flush
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Fill `buf` completely
    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Re-run the TLS handshake over the existing socket
    async fn renegotiate(&mut self) -> Result<()> {
        Ok(())
    }

    /// Check if the transport is TLS
    fn is_tls(&self) -> bool {
        false
    }

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn shutdown(&mut self) -> Result<()>;
}

/// Dial `host:port` and wrap the socket in TLS when configured
pub async fn open(
    config: &ConnectionConfig,
    host: &str,
    port: u16,
) -> Result<Box<dyn Transport>> {
    let addr = format!("{}:{}", host, port);
    let stream = tcp::dial(&addr, config.connect_timeout).await?;
    match &config.tls {
        Some(tls) => {
            let transport = TlsTransport::handshake(stream, host, tls).await?;
            Ok(Box::new(transport))
        }
        None => Ok(Box::new(TcpTransport::new(stream))),
    }
}

/// Map a read error so that EOF looks like a closed connection
pub(crate) fn map_read_error(e: std::io::Error) -> crate::error::Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        crate::error::Error::ConnectionClosed
    } else {
        crate::error::Error::Io(e)
    }
}

/// Run a future under an optional deadline
pub(crate) async fn with_deadline<T, F>(deadline: Option<Duration>, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| crate::error::Error::Timeout(limit))?,
        None => fut.await,
    }
}
