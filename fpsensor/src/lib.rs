//! # fpsensor
//!
//! Async driver for ZFM-20 family optical fingerprint sensor modules.
//!
//! ## Features
//!
//! - Frame codec with checksum verification
//! - One exchange at a time on the half-duplex link
//! - Enrollment and verification workflows with checkpoints for prompts
//! - Continuous loops with a stop signal
//!
//! ## Quick Start
//!
//! ```no_run
//! use fpsensor::{LogCheckpoints, MatchOutcome, Sensor};
//!
//! #[tokio::main]
//! async fn main() -> fpsensor::Result<()> {
//!     // Module behind a serial-over-TCP bridge
//!     let sensor = Sensor::tcp("192.168.1.50", 2000);
//!     sensor.connect().await?;
//!
//!     let mut checkpoints = LogCheckpoints;
//!     if let MatchOutcome::Found(found) = sensor.verify(&mut checkpoints).await? {
//!         println!("Finger #{} (confidence {})", found.id, found.confidence);
//!     }
//!
//!     sensor.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod sensor;
pub mod stop;
pub mod workflow;

#[cfg(test)]
mod testing;

// Re-exports
pub use checkpoint::{Checkpoints, LogCheckpoints, SearchMatch};
pub use config::SensorConfig;
pub use error::{Error, Result};
pub use sensor::Sensor;
pub use stop::{stop_signal, StopHandle, StopToken};
pub use workflow::MatchOutcome;

// Re-export protocol types
pub use fpsensor_core::{DeviceState, Frame, Opcode, PacketType, StateSnapshot, Status};
pub use fpsensor_transport::{StreamTransport, TcpTransport, Transport};
