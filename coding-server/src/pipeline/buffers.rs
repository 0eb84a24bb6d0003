//! The cells and queues one batch runs on
//!
//! Owned by the orchestrator, handed (cloned) to each worker on `init`.

use super::cell::SharedCell;
use super::queue::SharedQueue;
use crate::core::config::PipelineConfig;
use shared::status::StatusSnapshot;

#[derive(Debug, Clone)]
pub struct SharedBuffers {
    /// Operator intent; workers stop once this turns false
    pub is_printing: SharedCell,
    /// Device-side counter, advanced for every mail record (real or masked)
    pub print_counter: SharedCell,
    /// Codes persisted as printed
    pub printed_update_count: SharedCell,
    /// Set by the printer worker once the device is idle after a stop
    pub is_printer_finished: SharedCell,
    /// Latest operator-facing message
    pub display_message: SharedCell,

    /// Fresh codes claimed from storage
    pub print_queue: SharedQueue,
    /// Sent to the device, waiting for confirmation
    pub printed_queue: SharedQueue,
    /// Confirmed by the device, waiting to be persisted
    pub db_update_queue: SharedQueue,
}

impl SharedBuffers {
    pub fn new(config: &PipelineConfig) -> Self {
        let buffers = Self {
            is_printing: SharedCell::default(),
            print_counter: SharedCell::default(),
            printed_update_count: SharedCell::default(),
            is_printer_finished: SharedCell::default(),
            display_message: SharedCell::default(),
            print_queue: SharedQueue::with_dedup(config.print_queue_capacity),
            printed_queue: SharedQueue::new(config.printed_queue_capacity()),
            db_update_queue: SharedQueue::new(config.db_update_queue_capacity),
        };
        buffers.reset();
        buffers
    }

    /// Every cell set to its initial value, every queue emptied
    pub fn reset(&self) {
        self.is_printing.set(false);
        self.print_counter.set(0i64);
        self.printed_update_count.set(0i64);
        self.is_printer_finished.set(false);
        self.display_message.set("");
        self.print_queue.clear();
        self.printed_queue.clear();
        self.db_update_queue.clear();
    }

    pub fn is_printing(&self) -> bool {
        self.is_printing.get_bool()
    }

    pub fn snapshot(
        &self,
        batch_id: Option<i64>,
        quantity_target: i64,
        connection: &str,
    ) -> StatusSnapshot {
        StatusSnapshot {
            batch_id,
            is_printing: self.is_printing(),
            print_counter: self.print_counter.get_i64(),
            printed_update_count: self.printed_update_count.get_i64(),
            quantity_target,
            print_queue_size: self.print_queue.size(),
            printed_queue_size: self.printed_queue.size(),
            db_update_queue_size: self.db_update_queue.size(),
            display_message: self.display_message.get_string(),
            connection: connection.to_string(),
        }
    }
}
