//! Print API 模块
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/print/start | POST | 启动打印流程 |
//! | /api/print/stop | POST | 停止打印流程 |
//! | /api/status | GET | 当前状态快照 |
//! | /api/events | GET | 状态推送 (SSE) |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/print/start", post(handler::start))
        .route("/api/print/stop", post(handler::stop))
        .route("/api/status", get(handler::status))
        .route("/api/events", get(handler::events))
}
