//! Batch Model

use serde::{Deserialize, Serialize};

/// Batch row status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    Completed,
}

impl BatchStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// Batch entity (row in `batches`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct BatchRecord {
    pub id: i64,
    pub batch_no: String,
    pub product_id: i64,
    pub quantity_target: i64,
    pub printer_line_id: i64,
    pub marking_printer_id: i64,
    pub status: String,
    pub printed_count: i64,
    pub started_at: i64,
    pub ended_at: Option<i64>,
}

/// Create batch payload for `find_or_create_batch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCreate {
    pub batch_no: String,
    pub product_id: i64,
    pub quantity_target: i64,
    pub printer_line_id: i64,
    pub marking_printer_id: i64,
    pub started_at: i64,
}

/// Update batch payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdate {
    pub status: BatchStatus,
    pub printed_count: i64,
    pub ended_at: Option<i64>,
}

/// The batch currently owned by the orchestrator
///
/// Published to subscribers on batch start, replaced by `None` on stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInfo {
    pub id: i64,
    pub batch_no: String,
    pub product_id: i64,
    pub product_name: String,
    pub quantity_target: i64,
    pub printer_line_id: i64,
    pub marking_printer_id: i64,
    pub user_id: i64,
    pub started_at: i64,
}

/// Audit row for `user_activities`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: i64,
    /// e.g. `batch.start`, `batch.stop`
    pub action: String,
    pub batch_id: Option<i64>,
    pub detail: Option<serde_json::Value>,
    pub created_at: i64,
}
