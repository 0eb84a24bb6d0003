//! Batch API Handlers

use axum::{Json, extract::State};
use shared::models::BatchInfo;
use shared::request::{BatchRequest, StopBatchRequest};
use shared::status::StatusSnapshot;

use crate::core::ServerState;
use crate::utils::AppResult;

/// POST /api/batches - 开始批次
pub async fn start(
    State(state): State<ServerState>,
    Json(payload): Json<BatchRequest>,
) -> AppResult<Json<BatchInfo>> {
    let info = state.orchestrator.start_batch(payload).await?;
    Ok(Json(info))
}

/// GET /api/batches - 当前批次
pub async fn current(State(state): State<ServerState>) -> Json<Option<BatchInfo>> {
    Json(state.orchestrator.current_batch())
}

/// POST /api/batches/stop - 结束批次，返回最终状态
pub async fn stop(
    State(state): State<ServerState>,
    Json(payload): Json<StopBatchRequest>,
) -> AppResult<Json<StatusSnapshot>> {
    let snapshot = state.orchestrator.stop_batch(payload).await?;
    Ok(Json(snapshot))
}
