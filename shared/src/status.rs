//! Status events published to dashboard subscribers

use crate::models::BatchInfo;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the print pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub batch_id: Option<i64>,
    pub is_printing: bool,
    /// Device-side counter (advanced for real and masked codes alike)
    pub print_counter: i64,
    /// Codes confirmed in storage as printed
    pub printed_update_count: i64,
    pub quantity_target: i64,
    pub print_queue_size: usize,
    pub printed_queue_size: usize,
    pub db_update_queue_size: usize,
    pub display_message: String,
    /// Device connection state (`connecting`, `open`, ...)
    pub connection: String,
}

/// One-way status publication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Current batch, or `None` once the batch is cleared
    BatchInfo(Option<BatchInfo>),
    /// Periodic snapshot while a print process runs
    PrintStatus(StatusSnapshot),
    /// Final snapshot when a print process completes
    PrintComplete {
        snapshot: StatusSnapshot,
        elapsed_ms: i64,
    },
}

impl StatusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BatchInfo(_) => "batch_info",
            Self::PrintStatus(_) => "print_status",
            Self::PrintComplete { .. } => "print_complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(StatusEvent::BatchInfo(None)).unwrap();
        assert_eq!(json["event"], "batch_info");
        assert!(json["data"].is_null());

        let done = StatusEvent::PrintComplete {
            snapshot: StatusSnapshot::default(),
            elapsed_ms: 1500,
        };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["event"], done.name());
        assert_eq!(json["data"]["elapsed_ms"], 1500);
    }
}
