//! Error types for the marking printer library

use thiserror::Error;

/// Device connection errors
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Transport could not be opened
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error on an open transport
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No matching response before the deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Write attempted while the transport is not open
    #[error("Device not connected")]
    NotConnected,

    /// Invalid connection configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Malformed protocol response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("missing field `{field}` in `{line}`")]
    MissingField { field: &'static str, line: String },

    #[error("field `{field}` is not a number: `{value}`")]
    InvalidNumber { field: &'static str, value: String },
}
