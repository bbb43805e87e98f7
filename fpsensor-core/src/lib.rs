//! # fpsensor-core
//!
//! Core protocol implementation for ZFM-20 family fingerprint sensor modules.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - Checksum calculation
//! - Command table and reply shapes
//! - Status code decoding
//! - Reply collection from a chunked byte stream
//! - Device state populated by replies

pub mod checksum;
pub mod collector;
pub mod command;
pub mod constants;
pub mod error;
pub mod packet;
pub mod state;
pub mod status;

pub use collector::{CollectorState, Reply, ReplyCollector};
pub use command::{Instruction, Opcode, ReplyShape};
pub use error::{Error, Result};
pub use packet::{Frame, PacketType};
pub use state::{DeviceState, StateSnapshot};
pub use status::Status;

/// Protocol version information
pub const PROTOCOL_VERSION: &str = "1.0";

/// Maximum frame size (header + 16-bit length field)
pub const MAX_FRAME_SIZE: usize = Frame::HEADER_SIZE + u16::MAX as usize;

/// Frame header size
pub const HEADER_SIZE: usize = Frame::HEADER_SIZE;
