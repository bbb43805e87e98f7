//! High-level error types

use fpsensor_core::{Opcode, Status};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] fpsensor_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] fpsensor_transport::Error),

    /// The module answered with a failure confirmation code
    #[error("{opcode} failed: {status}")]
    Device {
        opcode: Opcode,
        status: Status,
    },

    #[error("Sensor not connected")]
    NotConnected,

    /// A retry loop hit its configured attempt limit
    #[error("Gave up waiting for {step} after {attempts} attempts")]
    AttemptsExhausted {
        step: &'static str,
        attempts: u32,
    },
}

impl Error {
    /// Device confirmation code, if the module reported one
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Device { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this is the "no finger on sensor" report
    pub fn is_no_finger(&self) -> bool {
        self.status() == Some(Status::NoFinger)
    }

    /// Check if a continuous workflow may carry on after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Device { .. } | Self::AttemptsExhausted { .. } => true,
            Self::Core(e) => e.is_recoverable(),
            Self::Transport(_) | Self::NotConnected => false,
        }
    }

    /// Message reported through the error checkpoint
    pub fn message(&self) -> String {
        match self {
            Self::Device { status, .. } => status.description().to_string(),
            other => other.to_string(),
        }
    }
}
