//! 打印流水线的共享原语
//!
//! - [`SharedCell`] - 跨工作者共享的标量值
//! - [`SharedQueue`] - 有界 FIFO 环形队列
//! - [`SharedBuffers`] - 单个批次使用的全部单元与队列

pub mod buffers;
pub mod cell;
pub mod queue;

pub use buffers::SharedBuffers;
pub use cell::{CellValue, SharedCell};
pub use queue::{QueueFull, SharedQueue};
