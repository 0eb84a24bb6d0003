//! Marking Printing Module
//!
//! 两个流水线工作者：
//! - [`PrinterWorker`] - 驱动打码机状态机，向设备下发码
//! - [`DbWorker`] - 落库已确认的码，补充待打印队列

pub mod db_worker;
pub mod printer_worker;

pub use db_worker::DbWorker;
pub use printer_worker::PrinterWorker;
