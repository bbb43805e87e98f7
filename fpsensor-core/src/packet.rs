//! Sensor protocol frame structure and encoding/decoding

use bytes::{BufMut, Bytes, BytesMut};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

use crate::{
    checksum,
    constants::{CHECKSUM_SIZE, START_CODE},
    error::{Error, Result},
};

/// Packet identifier carried at offset 6 of every frame
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Host to module instruction
    Command = 0x01,

    /// Bulk data, more packets follow
    Data = 0x02,

    /// Module reply carrying a status byte
    Ack = 0x07,

    /// Last bulk data packet
    EndData = 0x08,
}

impl PacketType {
    /// Get packet type name
    pub fn name(self) -> &'static str {
        match self {
            Self::Command => "COMMAND",
            Self::Data => "DATA",
            Self::Ack => "ACK",
            Self::EndData => "END_DATA",
        }
    }
}

impl From<PacketType> for u8 {
    fn from(kind: PacketType) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Command),
            0x02 => Ok(Self::Data),
            0x07 => Ok(Self::Ack),
            0x08 => Ok(Self::EndData),
            _ => Err(Error::UnknownPacketType(value)),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// Sensor protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌──────────┬──────────┬──────────┬──────────┬───────────┬──────────┐
/// │  Start   │ Address  │   Type   │  Length  │  Payload  │ Checksum │
/// │ 2 bytes  │ 4 bytes  │  1 byte  │ 2 bytes  │  N bytes  │ 2 bytes  │
/// │ (0xEF01) │ (BE u32) │          │ (BE u16) │           │ (BE u16) │
/// └──────────┴──────────┴──────────┴──────────┴───────────┴──────────┘
/// ```
///
/// The length field counts the payload plus the two checksum bytes. The
/// checksum is the 16-bit sum of the type byte, both length bytes and every
/// payload byte.
///
/// # Examples
///
/// ```
/// use fpsensor_core::{Frame, PacketType};
///
/// let frame = Frame::command(0xFFFF_FFFF, vec![0x01]).unwrap();
/// let encoded = frame.encode();
///
/// let decoded = Frame::decode(&encoded).unwrap();
/// assert_eq!(decoded.packet_type, PacketType::Command);
/// assert_eq!(decoded.payload, frame.payload);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Link address of the module
    pub address: u32,

    /// Packet identifier
    pub packet_type: PacketType,

    /// Packet payload (instruction or reply data)
    pub payload: Bytes,
}

/// A frame parsed off the front of a buffer, with the checksum it carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The parsed frame
    pub frame: Frame,

    /// Checksum as received on the wire
    pub checksum: u16,

    /// Number of buffer bytes the frame occupied
    pub consumed: usize,
}

impl Decoded {
    /// Check the received checksum against the one computed from the frame
    pub fn checksum_ok(&self) -> bool {
        self.frame.checksum() == self.checksum
    }

    /// Fail with `ChecksumMismatch` if the received checksum is wrong
    pub fn verify_checksum(&self) -> Result<()> {
        let expected = self.frame.checksum();
        if expected != self.checksum {
            return Err(Error::ChecksumMismatch {
                expected,
                received: self.checksum,
            });
        }
        Ok(())
    }
}

impl Frame {
    /// Frame header size in bytes (start, address, type, length)
    pub const HEADER_SIZE: usize = 9;

    /// Maximum payload size
    pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - CHECKSUM_SIZE;

    /// Create a frame
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if the payload does not fit the length field.
    pub fn new(address: u32, packet_type: PacketType, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();

        if payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: Self::MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Self {
            address,
            packet_type,
            payload,
        })
    }

    /// Create a command frame
    pub fn command(address: u32, payload: impl Into<Bytes>) -> Result<Self> {
        Self::new(address, PacketType::Command, payload)
    }

    /// Value of the length field: payload plus checksum
    pub fn length(&self) -> u16 {
        u16::try_from(self.payload.len() + CHECKSUM_SIZE).unwrap_or(u16::MAX)
    }

    /// Calculate checksum for this frame
    pub fn checksum(&self) -> u16 {
        checksum::calculate(self.packet_type.into(), self.length(), &self.payload)
    }

    /// Encode frame to bytes
    ///
    /// # Examples
    ///
    /// ```
    /// use fpsensor_core::Frame;
    ///
    /// let frame = Frame::command(0xFFFF_FFFF, vec![0x06, 0x01, 0x00, 0x05]).unwrap();
    /// let bytes = frame.encode();
    /// assert_eq!(&bytes[7..9], &[0x00, 0x06]);
    /// assert_eq!(&bytes[13..], &[0x00, 0x13]);
    /// ```
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u16(START_CODE);
        buf.put_u32(self.address);
        buf.put_u8(self.packet_type.into());
        buf.put_u16(self.length());
        buf.put_slice(&self.payload);
        buf.put_u16(self.checksum());

        buf
    }

    /// Decode a frame from the front of a buffer
    ///
    /// Decoding is advisory: the received checksum is not compared against
    /// the computed one. Use [`Frame::parse`] and [`Decoded::verify_checksum`]
    /// for that.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Buffer does not start with the start marker (`BadFrame`)
    /// - Buffer is shorter than the declared frame (`Truncated`)
    /// - Packet type is not one of the four defined types
    pub fn decode(buf: &[u8]) -> Result<Self> {
        Self::parse(buf).map(|decoded| decoded.frame)
    }

    /// Parse a frame from the front of a buffer, keeping the received checksum
    pub fn parse(buf: &[u8]) -> Result<Decoded> {
        if !buf.starts_with(&START_CODE.to_be_bytes()) {
            return Err(Error::BadFrame {
                found: leading_word(buf),
            });
        }

        let total = match Self::frame_len(buf)? {
            Some(total) => total,
            None => {
                return Err(Error::Truncated {
                    expected: Self::HEADER_SIZE,
                    actual: buf.len(),
                });
            }
        };

        if buf.len() < total {
            return Err(Error::Truncated {
                expected: total,
                actual: buf.len(),
            });
        }

        let address = BigEndian::read_u32(&buf[2..6]);
        let packet_type = PacketType::try_from(buf[6])?;
        let payload_end = total - CHECKSUM_SIZE;
        let payload = Bytes::copy_from_slice(&buf[Self::HEADER_SIZE..payload_end]);
        let checksum = BigEndian::read_u16(&buf[payload_end..total]);

        Ok(Decoded {
            frame: Self {
                address,
                packet_type,
                payload,
            },
            checksum,
            consumed: total,
        })
    }

    /// Total size of the frame at the front of `buf`, as declared by its
    /// length field
    ///
    /// Returns `Ok(None)` while the header is still incomplete.
    pub fn frame_len(buf: &[u8]) -> Result<Option<usize>> {
        let marker = START_CODE.to_be_bytes();
        let seen = buf.len().min(marker.len());

        if buf[..seen] != marker[..seen] {
            return Err(Error::BadFrame {
                found: leading_word(buf),
            });
        }

        if buf.len() < Self::HEADER_SIZE {
            return Ok(None);
        }

        let length = usize::from(BigEndian::read_u16(&buf[7..9]));
        if length < CHECKSUM_SIZE {
            return Err(Error::BadPacket(format!(
                "declared length {} shorter than checksum",
                length
            )));
        }

        Ok(Some(Self::HEADER_SIZE + length))
    }

    /// Check if this is an acknowledgment packet
    pub fn is_ack(&self) -> bool {
        self.packet_type == PacketType::Ack
    }

    /// Check if this is a data or end-of-data packet
    pub fn is_data(&self) -> bool {
        matches!(self.packet_type, PacketType::Data | PacketType::EndData)
    }

    /// Get total encoded frame size
    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE
    }
}

fn leading_word(buf: &[u8]) -> u16 {
    match buf {
        [] => 0,
        [hi] => u16::from(*hi) << 8,
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("address", &format!("0x{:08X}", self.address))
            .field("packet_type", &self.packet_type)
            .field("length", &self.length())
            .field("checksum", &format!("0x{:04X}", self.checksum()))
            .field("payload", &hex::encode(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}](addr=0x{:08X}, len={})",
            self.packet_type,
            self.address,
            self.payload.len()
        )
    }
}
