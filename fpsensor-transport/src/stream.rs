//! Transport over any async byte stream
//!
//! The environment opens and configures the physical link (a serial port, a
//! pseudo terminal, an in-memory duplex) and hands the stream over. Opening
//! the transport splits it and spawns a reader task that broadcasts every
//! inbound chunk to current subscribers.

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{error::*, Subscription, Transport, DEFAULT_CHUNK_CAPACITY};

/// Stream transport for sensor modules
///
/// # Examples
///
/// ```
/// use fpsensor_transport::{StreamTransport, Transport};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> fpsensor_transport::Result<()> {
/// let (host, _module) = tokio::io::duplex(256);
/// let mut transport = StreamTransport::new(host).with_label("duplex");
///
/// transport.open().await?;
/// assert!(transport.is_open());
/// transport.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct StreamTransport<S> {
    label: String,
    stream: Option<S>,
    writer: Option<WriteHalf<S>>,
    reader: Option<JoinHandle<()>>,
    chunks: broadcast::Sender<bytes::Bytes>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Create new stream transport
    pub fn new(stream: S) -> Self {
        let (chunks, _) = broadcast::channel(DEFAULT_CHUNK_CAPACITY);

        Self {
            label: "stream".to_string(),
            stream: Some(stream),
            writer: None,
            reader: None,
            chunks,
        }
    }

    /// Set description used in logs
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set how many undelivered chunks a subscription may fall behind
    pub fn with_chunk_capacity(mut self, capacity: usize) -> Self {
        let (chunks, _) = broadcast::channel(capacity.max(1));
        self.chunks = chunks;
        self
    }

    fn reader_alive(&self) -> bool {
        self.reader.as_ref().is_some_and(|task| !task.is_finished())
    }
}

async fn read_loop<S>(mut reader: ReadHalf<S>, chunks: broadcast::Sender<bytes::Bytes>, label: String)
where
    S: AsyncRead + Send,
{
    let mut buf = BytesMut::with_capacity(1024);

    loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                debug!("{} closed by remote", label);
                break;
            }
            Ok(n) => {
                let chunk = buf.split().freeze();
                trace!("Received {} bytes: {:02X?}", n, &chunk[..n.min(32)]);

                // No subscriber means no exchange is outstanding
                let _ = chunks.send(chunk);
            }
            Err(e) => {
                warn!("Read error on {}: {}", label, e);
                break;
            }
        }

        if buf.capacity() < 64 {
            buf.reserve(1024);
        }
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static,
{
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        let stream = self.stream.take().ok_or(Error::ConnectionClosed)?;
        let (reader, writer) = tokio::io::split(stream);

        debug!("Opening {}...", self.label);

        let task = tokio::spawn(read_loop(reader, self.chunks.clone(), self.label.clone()));

        self.writer = Some(writer);
        self.reader = Some(task);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(task) = self.reader.take() {
            task.abort();
        }

        if let Some(mut writer) = self.writer.take() {
            debug!("Closing {}...", self.label);

            // Graceful shutdown
            let _ = writer.shutdown().await;
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::NotOpen)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(32)]);

        writer.write_all(data).await?;
        writer.flush().await?;

        Ok(())
    }

    fn subscribe(&self) -> Result<Subscription> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        if !self.reader_alive() {
            return Err(Error::ConnectionClosed);
        }

        Ok(Subscription::new(self.chunks.subscribe()))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

impl<S> Drop for StreamTransport<S> {
    fn drop(&mut self) {
        if let Some(task) = self.reader.take() {
            task.abort();
        }
        if self.writer.is_some() {
            warn!("Stream transport {} dropped while still open", self.label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_stream_transport_create() {
        let (host, _module) = tokio::io::duplex(64);
        let transport = StreamTransport::new(host);
        assert!(!transport.is_open());
        assert!(matches!(transport.subscribe(), Err(Error::NotOpen)));
    }

    #[tokio::test]
    async fn test_write_reaches_module() {
        let (host, mut module) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(host);
        transport.open().await.unwrap();

        transport.write(&[0xEF, 0x01]).await.unwrap();

        let mut buf = [0u8; 2];
        module.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xEF, 0x01]);

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_receives_chunks() {
        let (host, mut module) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(host);
        transport.open().await.unwrap();

        let mut sub = transport.subscribe().unwrap();
        module.write_all(&[1, 2, 3]).await.unwrap();

        assert_eq!(sub.recv().await, Some(Bytes::from_static(&[1, 2, 3])));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_twice() {
        let (host, _module) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(host);
        transport.open().await.unwrap();

        assert!(matches!(transport.open().await, Err(Error::AlreadyOpen)));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_when_closed() {
        let (host, _module) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(host);

        assert!(matches!(transport.write(&[0x00]).await, Err(Error::NotOpen)));
    }

    #[tokio::test]
    async fn test_reopen_after_close() {
        let (host, _module) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(host);
        transport.open().await.unwrap();
        transport.close().await.unwrap();

        assert!(matches!(transport.open().await, Err(Error::ConnectionClosed)));
    }
}
