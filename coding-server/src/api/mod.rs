//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`batches`] - 批次开始/结束
//! - [`print`] - 打印流程控制、状态查询与状态推送

pub mod batches;
pub mod health;
pub mod print;

use axum::Router;

use crate::core::ServerState;

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(batches::router())
        .merge(print::router())
}
