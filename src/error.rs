// src/error.rs
//! Error types for the DG14 bridge

use std::fmt;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug)]
pub enum BridgeError {
    Io(std::io::Error),
    Serial(tokio_serial::Error),
    Json(serde_json::Error),
    Connection(String),
    Config(String),
    Other(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Io(e) => write!(f, "IO error: {}", e),
            BridgeError::Serial(e) => write!(f, "Serial error: {}", e),
            BridgeError::Json(e) => write!(f, "JSON error: {}", e),
            BridgeError::Connection(msg) => write!(f, "Connection error: {}", msg),
            BridgeError::Config(msg) => write!(f, "Config error: {}", msg),
            BridgeError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Io(e) => Some(e),
            BridgeError::Serial(e) => Some(e),
            BridgeError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(error: std::io::Error) -> Self {
        BridgeError::Io(error)
    }
}

impl From<tokio_serial::Error> for BridgeError {
    fn from(error: tokio_serial::Error) -> Self {
        BridgeError::Serial(error)
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(error: serde_json::Error) -> Self {
        BridgeError::Json(error)
    }
}
