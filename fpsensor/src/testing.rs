//! In-memory module answering scripted replies

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use fpsensor_core::{Frame, PacketType};
use fpsensor_transport::{StreamTransport, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use crate::{Sensor, SensorConfig};

/// What the module does after receiving the next command
pub(crate) enum Step {
    /// Write these bytes in one go
    Reply(Vec<u8>),

    /// Write these chunks one at a time
    Chunks(Vec<Vec<u8>>),

    /// Never answer
    Silent,
}

pub(crate) fn frame(packet_type: PacketType, payload: &[u8]) -> Vec<u8> {
    Frame::new(0xFFFF_FFFF, packet_type, payload.to_vec())
        .unwrap()
        .encode()
        .to_vec()
}

pub(crate) fn ack(payload: &[u8]) -> Vec<u8> {
    frame(PacketType::Ack, payload)
}

pub(crate) struct FakeModule {
    host: Mutex<Option<DuplexStream>>,
    frames: Arc<Mutex<Vec<Bytes>>>,
    _task: JoinHandle<()>,
}

impl FakeModule {
    pub(crate) fn spawn(steps: Vec<Step>) -> Self {
        let (host, device) = tokio::io::duplex(4096);
        let frames = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(serve(device, steps.into(), frames.clone()));

        Self {
            host: Mutex::new(Some(host)),
            frames,
            _task: task,
        }
    }

    /// Build an open sensor wired to this module
    pub(crate) async fn sensor(&self, config: SensorConfig) -> Sensor {
        let host = self.host.lock().unwrap().take().expect("sensor already built");
        let mut transport = StreamTransport::new(host).with_label("fake-module");
        transport.open().await.unwrap();

        Sensor::with_config(transport, config)
    }

    /// Raw command frames received so far
    pub(crate) fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().unwrap().clone()
    }

    /// Payloads of the command frames received so far
    pub(crate) fn commands(&self) -> Vec<Bytes> {
        self.frames()
            .iter()
            .map(|raw| Frame::decode(raw).unwrap().payload)
            .collect()
    }

    /// Instruction codes received so far
    pub(crate) fn opcodes(&self) -> Vec<u8> {
        self.commands().iter().map(|payload| payload[0]).collect()
    }
}

async fn serve(mut device: DuplexStream, mut steps: VecDeque<Step>, frames: Arc<Mutex<Vec<Bytes>>>) {
    let mut buf = BytesMut::new();

    loop {
        let total = loop {
            match Frame::frame_len(&buf) {
                Ok(Some(total)) if buf.len() >= total => break total,
                Ok(_) => {}
                Err(_) => return,
            }
            match device.read_buf(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        };

        let raw = buf.split_to(total).freeze();
        frames.lock().unwrap().push(raw);

        match steps.pop_front() {
            Some(Step::Reply(bytes)) => {
                let _ = device.write_all(&bytes).await;
            }
            Some(Step::Chunks(chunks)) => {
                for chunk in chunks {
                    let _ = device.write_all(&chunk).await;
                    tokio::task::yield_now().await;
                }
            }
            Some(Step::Silent) | None => {}
        }
    }
}
