//! Sensor configuration

use std::time::Duration;

use fpsensor_core::{
    constants::{
        DEFAULT_ADDRESS, DEFAULT_PASSWORD, DEFAULT_REPLY_TIMEOUT, ENROLL_INTERVAL,
        EXTRACT_TIMEOUT, UPLOAD_TIMEOUT,
    },
    Opcode,
};

/// Engine settings
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fpsensor::SensorConfig;
///
/// let config = SensorConfig::default()
///     .with_password(0x1234)
///     .with_max_capture_attempts(20)
///     .with_poll_interval(Duration::from_millis(100));
/// assert_eq!(config.max_capture_attempts, Some(20));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    /// Link address of the module
    pub address: u32,

    /// Handshake password
    pub password: u32,

    /// Reply deadline for single-frame commands
    pub reply_timeout: Duration,

    /// Reply deadline for feature extraction
    pub extract_timeout: Duration,

    /// Reply deadline for template uploads
    pub upload_timeout: Duration,

    /// Reject replies whose checksum does not match
    pub verify_checksum: bool,

    /// Pause between capture retries
    pub poll_interval: Duration,

    /// Give up after this many captures; `None` retries forever
    pub max_capture_attempts: Option<u32>,

    /// Pause between continuous enrollment attempts
    pub enroll_interval: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            password: DEFAULT_PASSWORD,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            extract_timeout: EXTRACT_TIMEOUT,
            upload_timeout: UPLOAD_TIMEOUT,
            verify_checksum: true,
            poll_interval: Duration::ZERO,
            max_capture_attempts: None,
            enroll_interval: ENROLL_INTERVAL,
        }
    }
}

impl SensorConfig {
    /// Set link address
    pub fn with_address(mut self, address: u32) -> Self {
        self.address = address;
        self
    }

    /// Set handshake password
    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    /// Set reply deadline for single-frame commands
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Set reply deadline for feature extraction
    pub fn with_extract_timeout(mut self, timeout: Duration) -> Self {
        self.extract_timeout = timeout;
        self
    }

    /// Set reply deadline for template uploads
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Enable or disable received checksum verification
    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Set pause between capture retries
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bound capture retries
    pub fn with_max_capture_attempts(mut self, attempts: u32) -> Self {
        self.max_capture_attempts = Some(attempts);
        self
    }

    /// Set pause between continuous enrollment attempts
    pub fn with_enroll_interval(mut self, interval: Duration) -> Self {
        self.enroll_interval = interval;
        self
    }

    /// Reply deadline for an instruction
    pub fn timeout_for(&self, opcode: Opcode) -> Duration {
        match opcode {
            Opcode::Img2Tz => self.extract_timeout,
            Opcode::UpChar => self.upload_timeout,
            _ => self.reply_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SensorConfig::default();

        assert_eq!(config.address, 0xFFFF_FFFF);
        assert_eq!(config.password, 0);
        assert!(config.verify_checksum);
        assert_eq!(config.max_capture_attempts, None);
        assert_eq!(config.enroll_interval, Duration::from_millis(3000));
    }

    #[test]
    fn test_timeout_for() {
        let config = SensorConfig::default().with_reply_timeout(Duration::from_millis(50));

        assert_eq!(config.timeout_for(Opcode::GenImg), Duration::from_millis(50));
        assert_eq!(config.timeout_for(Opcode::Img2Tz), Duration::from_millis(1000));
        assert_eq!(config.timeout_for(Opcode::UpChar), Duration::from_millis(2000));
    }
}
