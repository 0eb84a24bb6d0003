//! Unified error codes for the coding line
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 6xxx: Batch / product errors
//! - 7xxx: Device errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility with the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists / conflicting state
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 6xxx: Batch ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Batch not found
    BatchNotFound = 6002,
    /// A batch is already active on this line
    BatchAlreadyActive = 6003,
    /// No batch is active on this line
    NoActiveBatch = 6004,
    /// Not enough claimable codes for the requested quantity
    InsufficientCodes = 6005,

    // ==================== 7xxx: Device ====================
    /// Marking printer unreachable
    PrinterNotAvailable = 7001,
    /// Marking printer did not answer in time
    PrinterTimeout = 7002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9003,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Check if this error comes from the infrastructure rather than the caller
    pub const fn is_system(&self) -> bool {
        matches!(
            self,
            ErrorCode::InternalError | ErrorCode::DatabaseError | ErrorCode::ConfigError
        )
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",

            // Batch
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::BatchNotFound => "Batch not found",
            ErrorCode::BatchAlreadyActive => "A batch is already active",
            ErrorCode::NoActiveBatch => "No active batch",
            ErrorCode::InsufficientCodes => "Not enough unique codes available",

            // Device
            ErrorCode::PrinterNotAvailable => "Marking printer is not available",
            ErrorCode::PrinterTimeout => "Marking printer did not respond",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),

            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::BatchNotFound),
            6003 => Ok(ErrorCode::BatchAlreadyActive),
            6004 => Ok(ErrorCode::NoActiveBatch),
            6005 => Ok(ErrorCode::InsufficientCodes),

            7001 => Ok(ErrorCode::PrinterNotAvailable),
            7002 => Ok(ErrorCode::PrinterTimeout),

            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
