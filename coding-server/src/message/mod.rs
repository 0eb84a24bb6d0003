//! 状态消息
//!
//! 编排器到外部订阅者（仪表盘）的单向状态推送。

pub mod bus;

pub use bus::StatusBus;
pub use shared::status::{StatusEvent, StatusSnapshot};
