//! Transport layer for the fingerprint sensor protocol
//!
//! The sensor link is a half-duplex byte pipe: the host writes a command
//! frame and the module's reply arrives in chunks with no alignment to frame
//! boundaries. Transports push every inbound chunk to whoever holds a
//! [`Subscription`] at that moment.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Error, Result};
pub use stream::StreamTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::warn;

/// Default number of undelivered chunks kept per subscription
pub const DEFAULT_CHUNK_CAPACITY: usize = 64;

/// Transport trait for different link types
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the link and start delivering inbound chunks
    async fn open(&mut self) -> Result<()>;

    /// Close the link
    async fn close(&mut self) -> Result<()>;

    /// Check if open
    fn is_open(&self) -> bool;

    /// Send raw bytes
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Receive every chunk delivered from now until the subscription is dropped
    fn subscribe(&self) -> Result<Subscription>;

    /// Human readable link description
    fn describe(&self) -> String;
}

/// Handle on the inbound chunk stream
///
/// Only chunks delivered after the subscription was taken are seen; dropping
/// it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Bytes>,
}

impl Subscription {
    /// Wrap a broadcast receiver
    pub fn new(rx: broadcast::Receiver<Bytes>) -> Self {
        Self { rx }
    }

    /// Wait for the next chunk
    ///
    /// Returns `None` once the link has shut down.
    pub async fn recv(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await {
                Ok(chunk) => return Some(chunk),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscription lagged, skipped {} chunks", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_receives_after_subscribe() {
        let (tx, _) = broadcast::channel(4);
        let _ = tx.send(Bytes::from_static(b"early"));

        let mut sub = Subscription::new(tx.subscribe());
        tx.send(Bytes::from_static(b"late")).unwrap();

        assert_eq!(sub.recv().await, Some(Bytes::from_static(b"late")));
    }

    #[tokio::test]
    async fn test_subscription_closed() {
        let (tx, rx) = broadcast::channel::<Bytes>(4);
        let mut sub = Subscription::new(rx);
        drop(tx);

        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_subscription_skips_lagged_chunks() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = Subscription::new(rx);

        for i in 0..4u8 {
            tx.send(Bytes::from(vec![i])).unwrap();
        }

        assert_eq!(sub.recv().await, Some(Bytes::from(vec![2])));
        assert_eq!(sub.recv().await, Some(Bytes::from(vec![3])));
    }
}
