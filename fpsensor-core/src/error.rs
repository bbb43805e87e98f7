//! Error types for fpsensor-core

use crate::packet::PacketType;

/// Result type alias for fpsensor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Buffer does not start with the 0xEF01 start marker
    #[error("Bad frame: expected start marker 0xEF01, found 0x{found:04X}")]
    BadFrame {
        found: u16,
    },

    /// Buffer ends before the declared frame length
    #[error("Frame truncated: expected {expected} bytes, got {actual} bytes")]
    Truncated {
        expected: usize,
        actual: usize,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Packet identifier outside the four defined packet types
    #[error("Unknown packet type: 0x{0:02X}")]
    UnknownPacketType(u8),

    /// No bytes arrived before the exchange deadline
    #[error("Timeout receiving packet after {millis} ms")]
    TimedOut {
        millis: u64,
    },

    /// Bytes arrived but did not form a valid frame
    #[error("Bad packet: {0}")]
    BadPacket(String),

    /// A valid frame arrived that is not the acknowledgment the command expects
    #[error("Unexpected reply: {packet_type} packet with {payload_len} payload bytes")]
    UnexpectedReply {
        packet_type: PacketType,
        payload_len: usize,
    },

    /// Payload does not fit in the 16-bit length field
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// Reply collector used out of order
    #[error("Invalid collector state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Check if this error comes from framing or reply correlation
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::BadFrame { .. }
                | Self::Truncated { .. }
                | Self::ChecksumMismatch { .. }
                | Self::UnknownPacketType(_)
                | Self::TimedOut { .. }
                | Self::BadPacket(_)
        )
    }

    /// Check if error is recoverable (retry might succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::BadPacket(_))
    }
}
