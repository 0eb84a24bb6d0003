//! Work item (unique code) models

use serde::{Deserialize, Serialize};

/// A unique code travelling through the print pipeline.
///
/// `id` is the originating row id, `code` the text sent to the printer.
/// The pair never changes after the item is claimed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct QueueItem {
    pub id: i64,
    pub code: String,
}

impl QueueItem {
    pub fn new(id: i64, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }
}

/// Lifecycle of a row in `unique_codes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Available,
    Claimed,
    Printed,
    Unconfirmed,
}

impl WorkItemStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Claimed => "claimed",
            Self::Printed => "printed",
            Self::Unconfirmed => "unconfirmed",
        }
    }
}

/// Parameters for atomically claiming fresh work items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub limit: i64,
    pub product_id: i64,
    pub batch_id: i64,
    pub printer_line_id: i64,
    pub marking_printer_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(WorkItemStatus::Available.as_str(), "available");
        assert_eq!(WorkItemStatus::Unconfirmed.as_str(), "unconfirmed");
        let json = serde_json::to_string(&WorkItemStatus::Printed).unwrap();
        assert_eq!(json, "\"printed\"");
    }
}
