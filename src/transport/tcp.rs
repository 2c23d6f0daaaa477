//! Plain TCP transport

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result};

use super::{map_read_error, Transport};

/// Open a TCP connection with a connect deadline and Nagle disabled
pub(crate) async fn dial(addr: &str, connect_timeout: Duration) -> Result<TcpStream> {
    let stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Timeout(connect_timeout))?
        .map_err(Error::Io)?;
    stream.set_nodelay(true).map_err(Error::Io)?;
    Ok(stream)
}

/// TCP transport for Oracle connections
pub struct TcpTransport {
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Wrap an already connected stream
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Connect to the specified address
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self> {
        Ok(Self::new(dial(addr, connect_timeout).await?))
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(Error::ConnectionClosed)
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream_mut()?;
        stream.write_all(data).await.map_err(Error::Io)?;
        stream.flush().await.map_err(Error::Io)?;
        Ok(())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let stream = self.stream_mut()?;
        stream.read_exact(buf).await.map_err(map_read_error)?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await.map_err(Error::Io)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_transport_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let mut transport = TcpTransport::connect(&addr, Duration::from_secs(5)).await.unwrap();
        assert!(transport.is_connected());
        transport.write_all(&[1, 2, 3, 4]).await.unwrap();
        let mut echo = [0u8; 4];
        transport.read_exact(&mut echo).await.unwrap();
        assert_eq!(echo, [1, 2, 3, 4]);
        server.await.unwrap();

        let mut more = [0u8; 1];
        assert!(matches!(
            transport.read_exact(&mut more).await,
            Err(Error::ConnectionClosed)
        ));
        transport.shutdown().await.unwrap();
        assert!(!transport.is_connected());
    }
}
