//! Batch API 模块
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/batches | POST | 开始批次 |
//! | /api/batches | GET | 当前批次 |
//! | /api/batches/stop | POST | 结束批次 |

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/batches", post(handler::start).get(handler::current))
        .route("/api/batches/stop", post(handler::stop))
}
