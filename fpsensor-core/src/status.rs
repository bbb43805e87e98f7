//! Confirmation codes reported by the module
//!
//! The first payload byte of every acknowledgment is a confirmation code.
//! Decoding is total: bytes outside the documented table map to
//! [`Status::Unknown`].

use std::fmt;

/// Device confirmation code
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    ReceiveError,
    NoFinger,
    EnrollFailure,
    DisorderlyImage,
    FeatureFailure,
    NoMatch,
    NotFound,
    CombineFailure,
    BadLocation,
    LibraryReadError,
    UploadError,
    ReceiveRefused,
    ImageUploadError,
    DeleteFailure,
    ClearFailure,
    WrongPassword,
    InvalidImage,
    FlashWriteError,
    InvalidRegister,
    BadAddressCode,
    PasswordRequired,
    BadPacket,
    Timeout,
    /// Any byte outside the documented table
    Unknown(u8),
}

impl Status {
    /// Raw confirmation byte
    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0x00,
            Self::ReceiveError => 0x01,
            Self::NoFinger => 0x02,
            Self::EnrollFailure => 0x03,
            Self::DisorderlyImage => 0x06,
            Self::FeatureFailure => 0x07,
            Self::NoMatch => 0x08,
            Self::NotFound => 0x09,
            Self::CombineFailure => 0x0A,
            Self::BadLocation => 0x0B,
            Self::LibraryReadError => 0x0C,
            Self::UploadError => 0x0D,
            Self::ReceiveRefused => 0x0E,
            Self::ImageUploadError => 0x0F,
            Self::DeleteFailure => 0x10,
            Self::ClearFailure => 0x11,
            Self::WrongPassword => 0x13,
            Self::InvalidImage => 0x15,
            Self::FlashWriteError => 0x18,
            Self::InvalidRegister => 0x1A,
            Self::BadAddressCode => 0x20,
            Self::PasswordRequired => 0x21,
            Self::BadPacket => 0xFE,
            Self::Timeout => 0xFF,
            Self::Unknown(code) => code,
        }
    }

    /// Human readable classification
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "Success",
            Self::ReceiveError => "Communication error receiving packet",
            Self::NoFinger => "No finger on the sensor",
            Self::EnrollFailure => "Failed to enroll the finger",
            Self::DisorderlyImage => "Image too disorderly to generate features",
            Self::FeatureFailure => "Failed to extract features from image",
            Self::NoMatch => "Fingers do not match",
            Self::NotFound => "No matching finger found",
            Self::CombineFailure => "Failed to combine character files",
            Self::BadLocation => "Page id beyond the finger library",
            Self::LibraryReadError => "Error reading template from library",
            Self::UploadError => "Error uploading template",
            Self::ReceiveRefused => "Module cannot receive further data packets",
            Self::ImageUploadError => "Error uploading image",
            Self::DeleteFailure => "Failed to delete template",
            Self::ClearFailure => "Failed to clear finger library",
            Self::WrongPassword => "Wrong password",
            Self::InvalidImage => "No valid primary image",
            Self::FlashWriteError => "Error writing to flash",
            Self::InvalidRegister => "Invalid register number",
            Self::BadAddressCode => "Wrong address code",
            Self::PasswordRequired => "Password must be verified",
            Self::BadPacket => "Bad packet",
            Self::Timeout => "Timeout",
            Self::Unknown(_) => "Unknown error",
        }
    }

    /// Check if this is the success code
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Check if retrying the capture step might succeed
    pub fn is_transient(self) -> bool {
        self == Self::NoFinger
    }
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::Ok,
            0x01 => Self::ReceiveError,
            0x02 => Self::NoFinger,
            0x03 => Self::EnrollFailure,
            0x06 => Self::DisorderlyImage,
            0x07 => Self::FeatureFailure,
            0x08 => Self::NoMatch,
            0x09 => Self::NotFound,
            0x0A => Self::CombineFailure,
            0x0B => Self::BadLocation,
            0x0C => Self::LibraryReadError,
            0x0D => Self::UploadError,
            0x0E => Self::ReceiveRefused,
            0x0F => Self::ImageUploadError,
            0x10 => Self::DeleteFailure,
            0x11 => Self::ClearFailure,
            0x13 => Self::WrongPassword,
            0x15 => Self::InvalidImage,
            0x18 => Self::FlashWriteError,
            0x1A => Self::InvalidRegister,
            0x20 => Self::BadAddressCode,
            0x21 => Self::PasswordRequired,
            0xFE => Self::BadPacket,
            0xFF => Self::Timeout,
            other => Self::Unknown(other),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        status.code()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.code())
    }
}
