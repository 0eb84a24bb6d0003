//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /health | GET | 简单健康检查 |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    /// 当前批次 ID (如果有)
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_id: Option<i64>,
    is_printing: bool,
    /// 打码机连接状态
    printer: String,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let snapshot = state.orchestrator.status();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        batch_id: snapshot.batch_id,
        is_printing: snapshot.is_printing,
        printer: snapshot.connection,
    })
}
