//! TCP transport for serial-over-network bridges (ser2net and similar)

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{error::*, StreamTransport, Subscription, Transport, DEFAULT_CHUNK_CAPACITY};

/// TCP transport to a sensor behind a raw serial bridge
pub struct TcpTransport {
    addr: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    link: Option<StreamTransport<TcpStream>>,
    connect_timeout: Duration,
    chunk_capacity: usize,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket_addr: None,
            link: None,
            connect_timeout: Duration::from_secs(5),
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how many undelivered chunks a subscription may fall behind
    pub fn with_chunk_capacity(mut self, capacity: usize) -> Self {
        self.chunk_capacity = capacity;
        self
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }

        let addr_str = format!("{}:{}", self.addr, self.port);

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
            .collect();

        let addr = addrs
            .first()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))?;

        self.socket_addr = Some(*addr);
        Ok(*addr)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;

        // Frames are small, send them immediately
        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);

        let mut link = StreamTransport::new(stream)
            .with_label(addr.to_string())
            .with_chunk_capacity(self.chunk_capacity);
        link.open().await?;

        self.link = Some(link);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut link) = self.link.take() {
            debug!("Disconnecting from {}...", self.describe());
            link.close().await?;
        }

        self.socket_addr = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.is_open())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let link = self.link.as_mut().ok_or(Error::NotOpen)?;
        link.write(data).await
    }

    fn subscribe(&self) -> Result<Subscription> {
        let link = self.link.as_ref().ok_or(Error::NotOpen)?;
        link.subscribe()
    }

    fn describe(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("TCP transport dropped while still connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_transport_create() {
        let transport = TcpTransport::new("192.168.1.201", 2000);
        assert!(!transport.is_open());
        assert_eq!(transport.describe(), "192.168.1.201:2000");
    }

    #[tokio::test]
    async fn test_tcp_transport_invalid_address() {
        let mut transport = TcpTransport::new("invalid..address", 2000)
            .with_connect_timeout(Duration::from_millis(100));

        let result = transport.open().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_tcp_transport_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let bridge = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(&[0xEF, 0x01]).await.unwrap();
            socket
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        transport.open().await.unwrap();
        let mut sub = transport.subscribe().unwrap();
        transport.write(&[0x01]).await.unwrap();
        let _socket = bridge.await.unwrap();

        let mut received = Vec::new();
        while received.len() < 2 {
            received.extend_from_slice(&sub.recv().await.unwrap());
        }
        assert_eq!(received, vec![0xEF, 0x01]);

        transport.close().await.unwrap();
        assert!(!transport.is_open());
    }
}
