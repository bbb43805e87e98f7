//! High-level sensor interface

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

use fpsensor_core::{
    DeviceState, Frame, Instruction, Reply, ReplyCollector, StateSnapshot,
};
use fpsensor_transport::{TcpTransport, Transport};

use crate::{
    checkpoint::SearchMatch,
    config::SensorConfig,
    error::{Error, Result},
};

/// Transport and reply collector, locked together for one exchange
struct Link {
    transport: Box<dyn Transport>,
    collector: ReplyCollector,
}

/// Fingerprint sensor module
///
/// High-level interface for one module on one half-duplex link. The link is
/// locked for the whole "write command, await reply" exchange, so concurrent
/// calls on the same sensor are serialized.
///
/// # Examples
///
/// ```no_run
/// use fpsensor::Sensor;
///
/// #[tokio::main]
/// async fn main() -> fpsensor::Result<()> {
///     let sensor = Sensor::tcp("192.168.1.50", 2000);
///
///     sensor.connect().await?;
///     println!("Templates stored: {}", sensor.template_count().await?);
///
///     sensor.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Sensor {
    link: Mutex<Link>,
    state: DeviceState,
    config: SensorConfig,
    connected: AtomicBool,
}

impl Sensor {
    /// Create a sensor on an already constructed transport
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(transport, SensorConfig::default())
    }

    /// Create a sensor with explicit settings
    pub fn with_config(transport: impl Transport + 'static, config: SensorConfig) -> Self {
        let collector =
            ReplyCollector::new().with_checksum_verification(config.verify_checksum);

        Self {
            link: Mutex::new(Link {
                transport: Box::new(transport),
                collector,
            }),
            state: DeviceState::new(config.address, config.password),
            config,
            connected: AtomicBool::new(false),
        }
    }

    /// Create a sensor behind a serial-over-TCP bridge
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(TcpTransport::new(host, port))
    }

    /// Get settings
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Get shared device state
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Get a copy of the device state
    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Connect to the module
    ///
    /// Opens the transport and performs the password handshake. If the
    /// module does not answer or rejects the password, the transport is
    /// closed again.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut link = self.link.lock().await;
            info!("Connecting to {}...", link.transport.describe());

            if !link.transport.is_open() {
                link.transport.open().await?;
            }
        }

        match self.verify_password().await {
            Ok(()) => {
                self.connected.store(true, Ordering::Release);
                info!("Module ready");
                Ok(())
            }
            Err(e) => {
                warn!("Module not found: {}", e);

                let mut link = self.link.lock().await;
                if let Err(close_err) = link.transport.close().await {
                    warn!("Error while closing: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Disconnect from the module
    pub async fn disconnect(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        if !link.transport.is_open() {
            return Err(Error::NotConnected);
        }

        info!("Disconnecting from {}...", link.transport.describe());
        link.transport.close().await?;
        self.connected.store(false, Ordering::Release);

        info!("Disconnected");
        Ok(())
    }

    /// Capture a finger image
    pub async fn capture_image(&self) -> Result<()> {
        self.command(Instruction::capture_image()).await.map(drop)
    }

    /// Extract features from the captured image into `slot` (1 or 2)
    pub async fn extract_features(&self, slot: u8) -> Result<()> {
        self.command(Instruction::extract_features(slot)).await.map(drop)
    }

    /// Combine both slots into a model
    pub async fn register_model(&self) -> Result<()> {
        self.command(Instruction::register_model()).await.map(drop)
    }

    /// Store the model in slot 1 at library page `id`
    pub async fn store_model(&self, id: u16) -> Result<()> {
        self.command(Instruction::store_model(id)).await.map(drop)
    }

    /// Load library page `id` into slot 1
    pub async fn load_model(&self, id: u16) -> Result<()> {
        self.command(Instruction::load_model(id)).await.map(drop)
    }

    /// Upload the model in slot 1
    pub async fn upload_model(&self) -> Result<Bytes> {
        let reply = self.command(Instruction::upload_model()).await?;
        debug!(len = reply.data.len(), "Template uploaded");
        Ok(reply.data)
    }

    /// Load library page `id` and upload it
    pub async fn read_template(&self, id: u16) -> Result<Bytes> {
        self.load_model(id).await?;
        self.upload_model().await
    }

    /// Delete library page `id`
    pub async fn delete_model(&self, id: u16) -> Result<()> {
        self.command(Instruction::delete_model(id)).await?;
        info!(id, "Fingerprint deleted");
        Ok(())
    }

    /// Clear the whole library
    pub async fn empty_database(&self) -> Result<()> {
        warn!("Clearing finger library...");
        self.command(Instruction::empty_database()).await.map(drop)
    }

    /// Handshake with the configured password
    pub async fn verify_password(&self) -> Result<()> {
        let password = self.state.password();
        self.command(Instruction::verify_password(password)).await.map(drop)
    }

    /// Search slot 1 against the library
    ///
    /// Match id and confidence in the device state are reset before sending
    /// and only written on success.
    pub async fn fast_search(&self) -> Result<SearchMatch> {
        self.state.reset_match();

        let reply = self.command(Instruction::fast_search()).await?;
        let (id, confidence) = match (reply.field_u16(0), reply.field_u16(2)) {
            (Some(id), Some(confidence)) => (id, confidence),
            _ => return Err(missing_fields(&reply)),
        };

        self.state.record_match(id, confidence);
        debug!(id, confidence, "Search matched");

        Ok(SearchMatch { id, confidence })
    }

    /// Read the number of stored templates
    ///
    /// The template count in the device state is reset before sending and
    /// only written on success.
    pub async fn template_count(&self) -> Result<u16> {
        self.state.reset_template_count();

        let reply = self.command(Instruction::template_count()).await?;
        let count = reply.field_u16(0).ok_or_else(|| missing_fields(&reply))?;

        self.state.record_template_count(count);
        Ok(count)
    }

    // Helper methods

    async fn command(&self, instruction: Instruction) -> Result<Reply> {
        let opcode = instruction.opcode;
        let reply = self.exchange(instruction).await?;

        if !reply.status.is_ok() {
            debug!(%opcode, status = %reply.status, "Command failed");
            return Err(Error::Device {
                opcode,
                status: reply.status,
            });
        }

        Ok(reply)
    }

    async fn exchange(&self, instruction: Instruction) -> Result<Reply> {
        let timeout = self.config.timeout_for(instruction.opcode);
        let frame = Frame::command(self.state.address(), instruction.payload())?;

        let mut guard = self.link.lock().await;
        let link = &mut *guard;

        // A cancelled exchange may have left the collector listening
        link.collector.reset();

        let mut subscription = link.transport.subscribe()?;
        link.collector.begin(instruction.reply, timeout)?;

        debug!(opcode = %instruction.opcode, "Sending command");
        trace!("Sending: {:?}", frame);
        link.transport.write(&frame.encode()).await?;

        let deadline = Instant::now() + timeout;
        let result = loop {
            match timeout_at(deadline, subscription.recv()).await {
                Err(_) => break link.collector.expire(),
                Ok(Some(chunk)) => {
                    if let Some(result) = link.collector.push(&chunk) {
                        break result;
                    }
                }
                Ok(None) => {
                    link.collector.reset();
                    return Err(fpsensor_transport::Error::ConnectionClosed.into());
                }
            }
        };
        link.collector.reset();

        let reply = result.inspect_err(|e| {
            if e.is_framing() {
                warn!(opcode = %instruction.opcode, "Reply rejected: {}", e);
            }
        })?;
        trace!(status = %reply.status, fields = reply.fields.len(), "Received reply");
        Ok(reply)
    }
}

fn missing_fields(reply: &Reply) -> Error {
    Error::Core(fpsensor_core::Error::BadPacket(format!(
        "reply fields too short: {} bytes",
        reply.fields.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ack, FakeModule, Step};
    use async_trait::async_trait;
    use fpsensor_core::{Opcode, PacketType, Status};
    use fpsensor_transport::Subscription;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::time::Duration;
    use tokio::sync::broadcast;

    mockall::mock! {
        pub Link {}

        #[async_trait]
        impl Transport for Link {
            async fn open(&mut self) -> fpsensor_transport::Result<()>;
            async fn close(&mut self) -> fpsensor_transport::Result<()>;
            fn is_open(&self) -> bool;
            async fn write(&mut self, data: &[u8]) -> fpsensor_transport::Result<()>;
            fn subscribe(&self) -> fpsensor_transport::Result<Subscription>;
            fn describe(&self) -> String;
        }
    }

    fn idle_subscription() -> fpsensor_transport::Result<Subscription> {
        let (_tx, rx) = broadcast::channel(1);
        Ok(Subscription::new(rx))
    }

    #[tokio::test]
    async fn test_sensor_create() {
        let sensor = Sensor::tcp("192.168.1.50", 2000);
        assert!(!sensor.is_connected());
        assert_eq!(sensor.snapshot(), StateSnapshot::default());
    }

    #[tokio::test]
    async fn test_disconnect_without_connection() {
        let sensor = Sensor::tcp("192.168.1.50", 2000);

        let err = sensor.disconnect().await.unwrap_err();

        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_connect_verifies_password() {
        let module = FakeModule::spawn(vec![Step::Reply(ack(&[0x00]))]);
        let sensor = module.sensor(SensorConfig::default().with_password(0x0102_0304)).await;

        sensor.connect().await.unwrap();

        assert!(sensor.is_connected());
        assert_eq!(
            module.commands()[0].as_ref(),
            &[0x13, 0x01, 0x02, 0x03, 0x04]
        );

        sensor.disconnect().await.unwrap();
        assert!(!sensor.is_connected());
    }

    #[tokio::test]
    async fn test_connect_wrong_password() {
        let module = FakeModule::spawn(vec![Step::Reply(ack(&[0x13]))]);
        let sensor = module.sensor(SensorConfig::default()).await;

        let err = sensor.connect().await.unwrap_err();

        assert_eq!(err.status(), Some(Status::WrongPassword));
        assert!(!sensor.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_closes_transport() {
        let mut transport = MockLink::new();
        transport.expect_describe().return_const("mock".to_string());
        transport.expect_is_open().return_const(false);
        transport.expect_open().times(1).returning(|| Ok(()));
        transport.expect_subscribe().returning(idle_subscription);
        transport.expect_write().returning(|_| {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged").into())
        });
        transport.expect_close().times(1).returning(|| Ok(()));

        let sensor = Sensor::new(transport);
        let err = sensor.connect().await.unwrap_err();

        assert!(matches!(err, Error::Transport(fpsensor_transport::Error::Io(_))));
        assert!(!sensor.is_connected());
    }

    #[tokio::test]
    async fn test_store_model_frame() {
        let module = FakeModule::spawn(vec![Step::Reply(ack(&[0x00]))]);
        let sensor = module.sensor(SensorConfig::default()).await;

        sensor.store_model(5).await.unwrap();

        let frames = module.frames();
        let raw = frames[0].as_ref();
        assert_eq!(&raw[9..13], &[0x06, 0x01, 0x00, 0x05]);
        assert_eq!(&raw[7..9], &[0x00, 0x06]);
        assert_eq!(&raw[13..15], &[0x00, 0x13]);
    }

    #[tokio::test]
    async fn test_frames_use_configured_address() {
        let module = FakeModule::spawn(vec![Step::Reply(ack(&[0x00]))]);
        let sensor = module.sensor(SensorConfig::default().with_address(0x1234_5678)).await;

        sensor.capture_image().await.unwrap();

        assert_eq!(&module.frames()[0][2..6], &[0x12, 0x34, 0x56, 0x78]);
    }

    #[tokio::test]
    async fn test_device_status_is_surfaced() {
        let module = FakeModule::spawn(vec![Step::Reply(ack(&[0x02]))]);
        let sensor = module.sensor(SensorConfig::default()).await;

        let err = sensor.capture_image().await.unwrap_err();

        assert!(matches!(
            err,
            Error::Device {
                opcode: Opcode::GenImg,
                status: Status::NoFinger
            }
        ));
    }

    #[tokio::test]
    async fn test_fast_search_records_match() {
        let module = FakeModule::spawn(vec![Step::Reply(ack(&[0x00, 0x00, 0x2A, 0x01, 0x10]))]);
        let sensor = module.sensor(SensorConfig::default()).await;

        let found = sensor.fast_search().await.unwrap();

        assert_eq!(found, SearchMatch { id: 0x002A, confidence: 0x0110 });
        assert_eq!(sensor.state().match_id(), Some(0x002A));
        assert_eq!(sensor.state().confidence(), Some(0x0110));
    }

    #[tokio::test]
    async fn test_fast_search_failure_leaves_sentinel() {
        let module = FakeModule::spawn(vec![
            Step::Reply(ack(&[0x00, 0x00, 0x03, 0x00, 0x50])),
            Step::Reply(ack(&[0x09, 0x00, 0x00, 0x00, 0x00])),
        ]);
        let sensor = module.sensor(SensorConfig::default()).await;

        sensor.fast_search().await.unwrap();
        let err = sensor.fast_search().await.unwrap_err();

        assert_eq!(err.status(), Some(Status::NotFound));
        assert_eq!(sensor.state().match_id(), None);
        assert_eq!(sensor.snapshot().confidence, 0xFFFF);
    }

    #[tokio::test]
    async fn test_template_count() {
        let module = FakeModule::spawn(vec![Step::Reply(ack(&[0x00, 0x00, 0x07]))]);
        let sensor = module.sensor(SensorConfig::default()).await;

        assert_eq!(sensor.template_count().await.unwrap(), 7);
        assert_eq!(sensor.state().template_count(), Some(7));
    }

    #[tokio::test]
    async fn test_reply_split_across_chunks() {
        let raw = ack(&[0x00, 0x00, 0x07]);
        let chunks = raw.chunks(4).map(|c| c.to_vec()).collect();
        let module = FakeModule::spawn(vec![Step::Chunks(chunks)]);
        let sensor = module.sensor(SensorConfig::default()).await;

        assert_eq!(sensor.template_count().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_timeout_without_reply() {
        let module = FakeModule::spawn(vec![Step::Silent]);
        let sensor = module
            .sensor(SensorConfig::default().with_reply_timeout(Duration::from_millis(30)))
            .await;

        let err = sensor.template_count().await.unwrap_err();

        assert!(matches!(
            err,
            Error::Core(fpsensor_core::Error::TimedOut { millis: 30 })
        ));
        assert_eq!(sensor.state().template_count(), None);
    }

    #[tokio::test]
    async fn test_partial_reply_is_bad_packet() {
        let raw = ack(&[0x00]);
        let module = FakeModule::spawn(vec![Step::Chunks(vec![raw[..5].to_vec()])]);
        let sensor = module
            .sensor(SensorConfig::default().with_reply_timeout(Duration::from_millis(30)))
            .await;

        let err = sensor.capture_image().await.unwrap_err();

        assert!(matches!(err, Error::Core(fpsensor_core::Error::BadPacket(_))));
    }

    #[tokio::test]
    async fn test_data_packet_is_unexpected_reply() {
        let raw = crate::testing::frame(PacketType::Data, &[0x00]);
        let module = FakeModule::spawn(vec![Step::Reply(raw)]);
        let sensor = module.sensor(SensorConfig::default()).await;

        let err = sensor.register_model().await.unwrap_err();

        assert!(matches!(
            err,
            Error::Core(fpsensor_core::Error::UnexpectedReply { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_template() {
        let mut upload = ack(&[0x00]);
        upload.extend(crate::testing::frame(PacketType::Data, &[0xAA, 0xBB]));
        upload.extend(crate::testing::frame(PacketType::EndData, &[0xCC]));

        let module = FakeModule::spawn(vec![Step::Reply(ack(&[0x00])), Step::Reply(upload)]);
        let sensor = module.sensor(SensorConfig::default()).await;

        let template = sensor.read_template(3).await.unwrap();

        assert_eq!(template.as_ref(), &[0xAA, 0xBB, 0xCC]);
        let commands = module.commands();
        assert_eq!(commands[0].as_ref(), &[0x07, 0x01, 0x00, 0x03]);
        assert_eq!(commands[1].as_ref(), &[0x08, 0x01]);
    }

    #[tokio::test]
    async fn test_delete_and_empty() {
        let module = FakeModule::spawn(vec![
            Step::Reply(ack(&[0x00])),
            Step::Reply(ack(&[0x11])),
        ]);
        let sensor = module.sensor(SensorConfig::default()).await;

        sensor.delete_model(0x0102).await.unwrap();
        let err = sensor.empty_database().await.unwrap_err();

        assert_eq!(err.status(), Some(Status::ClearFailure));
        assert_eq!(module.commands()[0].as_ref(), &[0x0C, 0x01, 0x02, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_transport_error() {
        let mut transport = MockLink::new();
        transport.expect_subscribe().returning(idle_subscription);
        transport.expect_write().returning(|_| Err(fpsensor_transport::Error::NotOpen));

        let sensor = Sensor::new(transport);
        let err = sensor.capture_image().await.unwrap_err();

        assert!(matches!(err, Error::Transport(fpsensor_transport::Error::NotOpen)));
    }

    #[tokio::test]
    async fn test_concurrent_commands_are_serialized() {
        let module = FakeModule::spawn(vec![
            Step::Reply(ack(&[0x00])),
            Step::Reply(ack(&[0x00, 0x00, 0x04])),
        ]);
        let sensor = module.sensor(SensorConfig::default()).await;

        let (capture, count) = tokio::join!(sensor.capture_image(), sensor.template_count());

        assert!(capture.is_ok());
        assert_eq!(count.unwrap(), 4);
        assert_eq!(module.commands().len(), 2);
    }
}
