//! Sensor instruction table
//!
//! Every host request is a command frame whose payload starts with an
//! instruction code, followed by instruction-specific parameters.

use std::fmt;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    constants::{search, DEFAULT_REPLY_TIMEOUT, EXTRACT_TIMEOUT, UPLOAD_TIMEOUT},
    error::{Error, Result},
};

/// Instruction codes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Capture a finger image into the image buffer
    GenImg = 0x01,

    /// Extract features from the image into a character buffer
    Img2Tz = 0x02,

    /// Combine both character buffers into a template
    RegModel = 0x05,

    /// Store a character buffer in the library
    Store = 0x06,

    /// Load a library template into a character buffer
    LoadChar = 0x07,

    /// Upload a character buffer to the host
    UpChar = 0x08,

    /// Delete templates from the library
    DeletChar = 0x0C,

    /// Clear the whole library
    Empty = 0x0D,

    /// Handshake with the module password
    VfyPwd = 0x13,

    /// High speed library search
    HiSpeedSearch = 0x1B,

    /// Read the number of stored templates
    TemplateNum = 0x1D,
}

impl Opcode {
    /// Get instruction name
    pub fn name(self) -> &'static str {
        match self {
            Self::GenImg => "GEN_IMG",
            Self::Img2Tz => "IMG_2_TZ",
            Self::RegModel => "REG_MODEL",
            Self::Store => "STORE",
            Self::LoadChar => "LOAD_CHAR",
            Self::UpChar => "UP_CHAR",
            Self::DeletChar => "DELET_CHAR",
            Self::Empty => "EMPTY",
            Self::VfyPwd => "VFY_PWD",
            Self::HiSpeedSearch => "HI_SPEED_SEARCH",
            Self::TemplateNum => "TEMPLATE_NUM",
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::GenImg),
            0x02 => Ok(Self::Img2Tz),
            0x05 => Ok(Self::RegModel),
            0x06 => Ok(Self::Store),
            0x07 => Ok(Self::LoadChar),
            0x08 => Ok(Self::UpChar),
            0x0C => Ok(Self::DeletChar),
            0x0D => Ok(Self::Empty),
            0x13 => Ok(Self::VfyPwd),
            0x1B => Ok(Self::HiSpeedSearch),
            0x1D => Ok(Self::TemplateNum),
            _ => Err(Error::BadPacket(format!("unknown instruction 0x{:02X}", value))),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// What the module sends back for an instruction
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplyShape {
    /// One acknowledgment: status byte followed by `extra` bytes
    Ack {
        extra: usize,
    },

    /// Acknowledgment, then data packets up to an end-of-data packet
    AckThenData,
}

impl ReplyShape {
    /// Status byte only
    pub const STATUS: Self = Self::Ack { extra: 0 };
}

/// A single instruction ready to be framed
///
/// Built fresh per invocation and discarded once sent.
///
/// # Examples
///
/// ```
/// use fpsensor_core::{Instruction, Opcode};
///
/// let store = Instruction::store_model(5);
/// assert_eq!(store.opcode, Opcode::Store);
/// assert_eq!(store.payload().as_ref(), &[0x06, 0x01, 0x00, 0x05]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Instruction code
    pub opcode: Opcode,

    /// Parameters following the instruction code
    pub params: Bytes,

    /// Expected reply layout
    pub reply: ReplyShape,

    /// Reply deadline
    pub timeout: Duration,
}

impl Instruction {
    /// Create an instruction with no parameters and a status-only reply
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            params: Bytes::new(),
            reply: ReplyShape::STATUS,
            timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Set instruction parameters
    pub fn with_params(mut self, params: impl Into<Bytes>) -> Self {
        self.params = params.into();
        self
    }

    /// Set expected reply layout
    pub fn with_reply(mut self, reply: ReplyShape) -> Self {
        self.reply = reply;
        self
    }

    /// Set reply deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Capture a finger image
    pub fn capture_image() -> Self {
        Self::new(Opcode::GenImg)
    }

    /// Extract features from the captured image into `slot`
    pub fn extract_features(slot: u8) -> Self {
        Self::new(Opcode::Img2Tz)
            .with_params(vec![slot])
            .with_timeout(EXTRACT_TIMEOUT)
    }

    /// Combine both character buffers into a model
    pub fn register_model() -> Self {
        Self::new(Opcode::RegModel)
    }

    /// Store the model in slot 1 at library page `id`
    pub fn store_model(id: u16) -> Self {
        Self::new(Opcode::Store).with_params(slot_and_page(id))
    }

    /// Load library page `id` into slot 1
    pub fn load_model(id: u16) -> Self {
        Self::new(Opcode::LoadChar).with_params(slot_and_page(id))
    }

    /// Upload the model in slot 1
    pub fn upload_model() -> Self {
        Self::new(Opcode::UpChar)
            .with_params(vec![0x01])
            .with_reply(ReplyShape::AckThenData)
            .with_timeout(UPLOAD_TIMEOUT)
    }

    /// Delete the single library page `id`
    pub fn delete_model(id: u16) -> Self {
        let [hi, lo] = id.to_be_bytes();
        Self::new(Opcode::DeletChar).with_params(vec![hi, lo, 0x00, 0x01])
    }

    /// Clear the whole library
    pub fn empty_database() -> Self {
        Self::new(Opcode::Empty)
    }

    /// Handshake with `password`
    pub fn verify_password(password: u32) -> Self {
        Self::new(Opcode::VfyPwd).with_params(password.to_be_bytes().to_vec())
    }

    /// Search slot 1 against the library
    ///
    /// Reply carries match id and confidence, two bytes each.
    pub fn fast_search() -> Self {
        let mut params = BytesMut::with_capacity(5);
        params.put_u8(0x01);
        params.put_u16(search::START_PAGE);
        params.put_u16(search::PAGE_COUNT);

        Self::new(Opcode::HiSpeedSearch)
            .with_params(params.freeze())
            .with_reply(ReplyShape::Ack { extra: 4 })
    }

    /// Read the number of stored templates
    ///
    /// Reply carries the count in two bytes.
    pub fn template_count() -> Self {
        Self::new(Opcode::TemplateNum).with_reply(ReplyShape::Ack { extra: 2 })
    }

    /// Command frame payload: instruction code followed by parameters
    pub fn payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.params.len());
        buf.put_u8(self.opcode.into());
        buf.put_slice(&self.params);
        buf.freeze()
    }
}

fn slot_and_page(id: u16) -> Vec<u8> {
    let [hi, lo] = id.to_be_bytes();
    vec![0x01, hi, lo]
}
