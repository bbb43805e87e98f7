//! Fingerprint module checksum algorithm
//!
//! The checksum is the plain additive sum of every byte from the packet
//! identifier up to the last payload byte:
//! 1. Packet type (1 byte)
//! 2. Length high and low bytes
//! 3. Every payload byte
//! 4. Truncate the sum to 16 bits

use tracing::trace;

/// Calculate frame checksum
///
/// # Algorithm
///
/// ```text
/// sum = packet_type + len_hi + len_lo + payload[0] + ... + payload[n-1]
/// checksum = sum mod 65536
/// ```
///
/// # Examples
///
/// ```
/// use fpsensor_core::checksum;
///
/// // GenImg: type=0x01, length=0x0003, payload=[0x01]
/// assert_eq!(checksum::calculate(0x01, 0x0003, &[0x01]), 0x0005);
/// ```
pub fn calculate(packet_type: u8, length: u16, payload: &[u8]) -> u16 {
    let [len_hi, len_lo] = length.to_be_bytes();

    let mut sum = u16::from(packet_type)
        .wrapping_add(u16::from(len_hi))
        .wrapping_add(u16::from(len_lo));

    for byte in payload {
        sum = sum.wrapping_add(u16::from(*byte));
    }

    trace!(
        packet_type = packet_type,
        length = length,
        payload_len = payload.len(),
        checksum = format!("0x{:04X}", sum),
        "Calculated checksum"
    );

    sum
}

/// Verify checksum
pub fn verify(packet_type: u8, length: u16, payload: &[u8], expected: u16) -> bool {
    calculate(packet_type, length, payload) == expected
}
