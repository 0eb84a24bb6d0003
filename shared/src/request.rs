//! Request types for the operator API

use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Start-batch request
///
/// The product is resolved by `product_id` when given, otherwise by `barcode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub batch_no: String,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub barcode: Option<String>,
    pub quantity_target: i64,
    pub printer_line_id: i64,
    pub marking_printer_id: i64,
    pub user_id: i64,
}

impl BatchRequest {
    /// Reject malformed requests before anything else is touched.
    ///
    /// The error message and `details.field` name the offending field.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_no.trim().is_empty() {
            return Err(AppError::validation_field(
                "batch_no",
                "batch_no must not be empty",
            ));
        }
        if self.quantity_target <= 0 {
            return Err(AppError::validation_field(
                "quantity_target",
                "quantity_target must be greater than 0",
            ));
        }
        let has_barcode = self
            .barcode
            .as_deref()
            .is_some_and(|b| !b.trim().is_empty());
        match self.product_id {
            Some(id) if id <= 0 => {
                return Err(AppError::validation_field(
                    "product_id",
                    "product_id must be a positive id",
                ));
            }
            None if !has_barcode => {
                return Err(AppError::validation_field(
                    "product_id",
                    "product_id or barcode is required",
                ));
            }
            _ => {}
        }
        if self.printer_line_id <= 0 {
            return Err(AppError::validation_field(
                "printer_line_id",
                "printer_line_id must be a positive id",
            ));
        }
        if self.marking_printer_id <= 0 {
            return Err(AppError::validation_field(
                "marking_printer_id",
                "marking_printer_id must be a positive id",
            ));
        }
        if self.user_id <= 0 {
            return Err(AppError::validation_field(
                "user_id",
                "user_id must be a positive id",
            ));
        }
        Ok(())
    }
}

/// Stop-batch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopBatchRequest {
    pub batch_id: i64,
    pub user_id: i64,
}
