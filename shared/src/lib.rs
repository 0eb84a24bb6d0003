//! Shared types for the coding line
//!
//! Data model, error model and status events used by both the
//! coding-server and the dashboard API.

pub mod error;
pub mod models;
pub mod request;
pub mod status;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use models::{BatchInfo, QueueItem};
pub use status::{StatusEvent, StatusSnapshot};
