//! Device error code lookup model

use serde::{Deserialize, Serialize};

/// A printer error code as registered in the `error_codes` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct DeviceErrorCode {
    pub code: i64,
    pub name: String,
    /// Benign code, not worth showing to the operator
    pub skippable: bool,
}
