//! Workflow checkpoints
//!
//! Workflows call back into the environment at fixed steps so it can prompt
//! the user (console, LCD, ...). Every method has a default that logs the
//! step, so implementors override only what they display.

use tracing::{error, info};

/// Result of a successful library search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    /// Library page of the matching template
    pub id: u16,

    /// Match score reported by the module
    pub confidence: u16,
}

/// Callbacks invoked synchronously at workflow steps
pub trait Checkpoints: Send {
    /// Before each capture attempt of a first scan or a verification
    fn waiting_for_finger(&mut self) {
        info!("Waiting for finger");
    }

    /// Once the first enrollment scan is stored in slot 1
    fn remove_finger(&mut self) {
        info!("Remove finger");
    }

    /// Before each capture attempt of the second enrollment scan
    fn place_same_finger(&mut self) {
        info!("Place same finger again");
    }

    /// A workflow aborted, or a verification did not match
    fn error(&mut self, message: &str) {
        error!("{}", message);
    }

    /// A template was stored at `id`
    fn enrolled(&mut self, id: u16) {
        info!(id, "Fingerprint stored");
    }

    /// A verification found a match
    fn matched(&mut self, found: SearchMatch) {
        info!(id = found.id, confidence = found.confidence, "Fingerprint found");
    }
}

/// Checkpoints that only log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCheckpoints;

impl Checkpoints for LogCheckpoints {}
