// src/lib.rs
//! DG14 Bridge Library
//!
//! Reads the Ashtech sentence stream of a Magellan DG14 GNSS receiver and
//! turns it into a structured fix record that is published at a fixed rate.

pub mod bridge;
pub mod config;
pub mod error;
pub mod gps;
pub mod publish;

// Re-export main types for convenience
pub use bridge::{Bridge, ReplaySummary};
pub use config::{BridgeConfig, OutputKind};
pub use error::{BridgeError, Result};
pub use gps::{GpsFix, GpsStatus, SatLayout, SentenceInterpreter, SentenceKind};
