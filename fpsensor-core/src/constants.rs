//! Protocol constants

use std::time::Duration;

/// Frame start marker, transmitted high byte first
pub const START_CODE: u16 = 0xEF01;

/// Broadcast link address accepted by every module
pub const DEFAULT_ADDRESS: u32 = 0xFFFF_FFFF;

/// Factory default handshake password
pub const DEFAULT_PASSWORD: u32 = 0x0000_0000;

/// Width of the trailing checksum, counted by the length field
pub const CHECKSUM_SIZE: usize = 2;

/// Sentinel for device state fields that are stale or unavailable
pub const UNKNOWN: u16 = 0xFFFF;

/// Default reply deadline for single-frame commands
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Reply deadline for feature extraction
pub const EXTRACT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Reply deadline for a template upload (ack followed by data packets)
pub const UPLOAD_TIMEOUT: Duration = Duration::from_millis(2000);

/// Pause between continuous enrollment attempts
pub const ENROLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Character buffers available for feature extraction
pub mod slots {
    /// First character buffer (search source, first enrollment scan)
    pub const SLOT_1: u8 = 0x01;

    /// Second character buffer (second enrollment scan)
    pub const SLOT_2: u8 = 0x02;
}

/// Fast search range
pub mod search {
    /// First library page searched
    pub const START_PAGE: u16 = 0x0000;

    /// Number of library pages searched
    pub const PAGE_COUNT: u16 = 0x00A3;
}
