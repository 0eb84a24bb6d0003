//! Coding Server - 工业打码机产线服务
//!
//! # 架构概述
//!
//! 一条打码线由三个并发参与者组成，只通过共享单元和有界队列通信：
//!
//! ```text
//!            ┌────────────┐  claim   ┌─────────────┐   MR    ┌──────────┐
//! Postgres ◀─┤ DbWorker   ├─────────▶│ Print Queue ├────────▶│ Printer  │
//!    ▲       └────────────┘          └─────────────┘         │ Worker   │──▶ 打码机
//!    │ printed  ▲                                             └────┬─────┘
//!    │          │ DB-Update Queue ◀──── Printed Queue ◀────────────┘
//!    └──────────┘
//! ```
//!
//! # 模块结构
//!
//! ```text
//! coding-server/src/
//! ├── core/          # 配置、状态、后台任务、HTTP 服务器
//! ├── pipeline/      # 共享单元与有界队列
//! ├── printing/      # 打码机工作者、数据库工作者
//! ├── orchestrator/  # 批次生命周期
//! ├── db/            # 存储接口 (Postgres / 内存)
//! ├── message/       # 状态推送
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 日志等工具
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod message;
pub mod orchestrator;
pub mod pipeline;
pub mod printing;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use db::{CodeStore, DbService, MemoryCodeStore, PgCodeStore};
pub use message::StatusBus;
pub use orchestrator::Orchestrator;
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};
