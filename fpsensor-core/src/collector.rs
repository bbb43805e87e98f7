//! Reply assembly from a chunked byte stream
//!
//! The module answers each command with one acknowledgment frame (and, for
//! uploads, a run of data frames). The transport delivers those bytes in
//! arbitrary chunks, so a [`ReplyCollector`] accumulates them and resolves
//! once the declared length fields say the reply is complete, or when the
//! caller's deadline passes.
//!
//! ```text
//! Idle ──begin──▶ Listening ──complete frame──▶ Resolved
//!                     │
//!                     └──────deadline─────────▶ Resolved (bytes seen)
//!                                             ▶ TimedOut (no bytes)
//! ```

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::{
    command::ReplyShape,
    error::{Error, Result},
    packet::{Frame, PacketType},
    status::Status,
};

/// Collector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// No exchange in progress
    Idle,

    /// Accumulating bytes for the current exchange
    Listening,

    /// Exchange produced a reply or a protocol error
    Resolved,

    /// Deadline passed with nothing received
    TimedOut,
}

/// Decoded acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Confirmation code (first acknowledgment payload byte)
    pub status: Status,

    /// Acknowledgment bytes after the confirmation code
    pub fields: Bytes,

    /// Concatenated data packet payloads (uploads only)
    pub data: Bytes,
}

impl Reply {
    /// Read a big-endian `u16` from the acknowledgment fields
    pub fn field_u16(&self, offset: usize) -> Option<u16> {
        let bytes = self.fields.get(offset..offset + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

enum Assembly {
    Incomplete,
    Complete(Result<Reply>),
}

/// Per-exchange reply state machine
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fpsensor_core::{ReplyCollector, ReplyShape, Status};
///
/// let mut collector = ReplyCollector::new();
/// collector.begin(ReplyShape::STATUS, Duration::from_millis(500)).unwrap();
///
/// assert!(collector.push(&[0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]).is_none());
/// let reply = collector
///     .push(&[0x07, 0x00, 0x03, 0x02, 0x00, 0x0C])
///     .unwrap()
///     .unwrap();
/// assert_eq!(reply.status, Status::NoFinger);
/// ```
#[derive(Debug)]
pub struct ReplyCollector {
    state: CollectorState,
    shape: ReplyShape,
    timeout: Duration,
    verify_checksum: bool,
    buffer: BytesMut,
}

impl ReplyCollector {
    /// Create an idle collector that verifies received checksums
    pub fn new() -> Self {
        Self {
            state: CollectorState::Idle,
            shape: ReplyShape::STATUS,
            timeout: Duration::ZERO,
            verify_checksum: true,
            buffer: BytesMut::with_capacity(64),
        }
    }

    /// Enable or disable received checksum verification
    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Get current state
    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Number of bytes accumulated for the current exchange
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Start listening for a reply of `shape`
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if an exchange is already listening.
    pub fn begin(&mut self, shape: ReplyShape, timeout: Duration) -> Result<()> {
        if self.state == CollectorState::Listening {
            return Err(Error::InvalidState(
                "exchange already outstanding".into(),
            ));
        }

        self.state = CollectorState::Listening;
        self.shape = shape;
        self.timeout = timeout;
        self.buffer.clear();

        Ok(())
    }

    /// Append a delivered chunk
    ///
    /// Returns `Some` once the reply is complete (or can never become
    /// valid); the collector is then resolved and ignores further chunks.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Result<Reply>> {
        if self.state != CollectorState::Listening {
            trace!(len = chunk.len(), state = ?self.state, "Dropping chunk outside exchange");
            return None;
        }

        trace!("Receiving part of reply: {}", hex::encode(chunk));
        self.buffer.extend_from_slice(chunk);

        match self.assemble() {
            Assembly::Incomplete => None,
            Assembly::Complete(result) => {
                self.state = CollectorState::Resolved;
                Some(result)
            }
        }
    }

    /// Resolve the exchange at its deadline
    pub fn expire(&mut self) -> Result<Reply> {
        if self.state != CollectorState::Listening {
            return Err(Error::InvalidState(format!(
                "cannot expire from state: {:?}",
                self.state
            )));
        }

        if self.buffer.is_empty() {
            self.state = CollectorState::TimedOut;
            return Err(Error::TimedOut {
                millis: self.timeout.as_millis() as u64,
            });
        }

        self.state = CollectorState::Resolved;

        match self.assemble() {
            Assembly::Complete(result) => result,
            Assembly::Incomplete => {
                debug!(buffered = self.buffer.len(), "Deadline passed with partial reply");
                Err(Error::BadPacket(format!(
                    "incomplete reply: {} bytes",
                    self.buffer.len()
                )))
            }
        }
    }

    /// Return to idle, discarding buffered bytes
    pub fn reset(&mut self) {
        self.state = CollectorState::Idle;
        self.buffer.clear();
    }

    fn assemble(&self) -> Assembly {
        let mut offset = 0;
        let mut ack: Option<Reply> = None;
        let mut data = BytesMut::new();

        loop {
            let rest = &self.buffer[offset..];

            let total = match Frame::frame_len(rest) {
                Ok(Some(total)) if rest.len() >= total => total,
                Ok(_) => return Assembly::Incomplete,
                Err(e) => return Assembly::Complete(Err(bad_packet(e))),
            };

            let decoded = match Frame::parse(&rest[..total]) {
                Ok(decoded) => decoded,
                Err(e) => return Assembly::Complete(Err(bad_packet(e))),
            };

            if self.verify_checksum {
                if let Err(e) = decoded.verify_checksum() {
                    return Assembly::Complete(Err(bad_packet(e)));
                }
            }

            offset += decoded.consumed;
            let frame = decoded.frame;

            match ack.take() {
                None => {
                    let reply = match self.acknowledgment(&frame) {
                        Ok(reply) => reply,
                        Err(e) => return Assembly::Complete(Err(e)),
                    };

                    let wants_data =
                        self.shape == ReplyShape::AckThenData && reply.status.is_ok();
                    if !wants_data {
                        return Assembly::Complete(Ok(reply));
                    }
                    ack = Some(reply);
                }
                Some(mut reply) => {
                    if !frame.is_data() {
                        return Assembly::Complete(Err(unexpected(&frame)));
                    }
                    data.extend_from_slice(&frame.payload);

                    if frame.packet_type == PacketType::EndData {
                        reply.data = data.freeze();
                        return Assembly::Complete(Ok(reply));
                    }
                    ack = Some(reply);
                }
            }
        }
    }

    fn acknowledgment(&self, frame: &Frame) -> Result<Reply> {
        let extra = match self.shape {
            ReplyShape::Ack { extra } => extra,
            ReplyShape::AckThenData => 0,
        };

        let status = match frame.payload.first() {
            Some(code) if frame.is_ack() => Status::from(*code),
            _ => return Err(unexpected(frame)),
        };

        let len = frame.payload.len();
        let well_formed = if status.is_ok() {
            len == 1 + extra
        } else {
            len <= 1 + extra
        };
        if !well_formed {
            return Err(unexpected(frame));
        }

        Ok(Reply {
            status,
            fields: frame.payload.slice(1..),
            data: Bytes::new(),
        })
    }
}

impl Default for ReplyCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn bad_packet(e: Error) -> Error {
    match e {
        Error::BadPacket(_) => e,
        other => Error::BadPacket(other.to_string()),
    }
}

fn unexpected(frame: &Frame) -> Error {
    Error::UnexpectedReply {
        packet_type: frame.packet_type,
        payload_len: frame.payload.len(),
    }
}
