//! Device state populated by module replies
//!
//! The state tracks:
//! - Link address and password used for framing and the handshake
//! - Last match id and confidence (after a fast search)
//! - Last template count (after a count query)

use std::sync::Arc;

use crate::constants::{DEFAULT_ADDRESS, DEFAULT_PASSWORD, UNKNOWN};

/// Point-in-time copy of the device state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Link address
    pub address: u32,

    /// Handshake password
    pub password: u32,

    /// Library page of the last match, `0xFFFF` when stale
    pub match_id: u16,

    /// Score of the last match, `0xFFFF` when stale
    pub confidence: u16,

    /// Last template count, `0xFFFF` when stale
    pub template_count: u16,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            password: DEFAULT_PASSWORD,
            match_id: UNKNOWN,
            confidence: UNKNOWN,
            template_count: UNKNOWN,
        }
    }
}

/// Device state
///
/// Thread-safe and can be cloned cheaply (Arc internally). Fields are only
/// written by the command that produces them, so reads are meaningful once
/// that command has resolved.
#[derive(Debug, Clone)]
pub struct DeviceState {
    inner: Arc<parking_lot::RwLock<StateSnapshot>>,
}

impl DeviceState {
    /// Create state for a module at `address` with `password`
    pub fn new(address: u32, password: u32) -> Self {
        Self {
            inner: Arc::new(parking_lot::RwLock::new(StateSnapshot {
                address,
                password,
                ..StateSnapshot::default()
            })),
        }
    }

    /// Get a copy of every field
    pub fn snapshot(&self) -> StateSnapshot {
        *self.inner.read()
    }

    /// Get link address
    pub fn address(&self) -> u32 {
        self.inner.read().address
    }

    /// Get handshake password
    pub fn password(&self) -> u32 {
        self.inner.read().password
    }

    /// Get last match id, `None` when stale
    pub fn match_id(&self) -> Option<u16> {
        known(self.inner.read().match_id)
    }

    /// Get last match confidence, `None` when stale
    pub fn confidence(&self) -> Option<u16> {
        known(self.inner.read().confidence)
    }

    /// Get last template count, `None` when stale
    pub fn template_count(&self) -> Option<u16> {
        known(self.inner.read().template_count)
    }

    /// Change link address
    pub fn set_address(&self, address: u32) {
        self.inner.write().address = address;
    }

    /// Change handshake password
    pub fn set_password(&self, password: u32) {
        self.inner.write().password = password;
    }

    /// Mark match fields stale before a search
    pub fn reset_match(&self) {
        let mut state = self.inner.write();
        state.match_id = UNKNOWN;
        state.confidence = UNKNOWN;
    }

    /// Record a successful search
    pub fn record_match(&self, match_id: u16, confidence: u16) {
        let mut state = self.inner.write();
        state.match_id = match_id;
        state.confidence = confidence;
    }

    /// Mark template count stale before a count query
    pub fn reset_template_count(&self) {
        self.inner.write().template_count = UNKNOWN;
    }

    /// Record a successful count query
    pub fn record_template_count(&self, count: u16) {
        self.inner.write().template_count = count;
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS, DEFAULT_PASSWORD)
    }
}

fn known(value: u16) -> Option<u16> {
    (value != UNKNOWN).then_some(value)
}
