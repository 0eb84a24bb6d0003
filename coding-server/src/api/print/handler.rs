//! Print API Handlers

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::Serialize;
use shared::status::StatusSnapshot;
use tokio::sync::broadcast::error::RecvError;

use crate::core::ServerState;
use crate::utils::AppResult;

#[derive(Debug, Serialize)]
pub struct StartResponse {
    /// false: 流程已在运行
    started: bool,
}

/// POST /api/print/start - 启动打印流程
pub async fn start(State(state): State<ServerState>) -> AppResult<Json<StartResponse>> {
    let started = state.orchestrator.start_print_process()?;
    Ok(Json(StartResponse { started }))
}

/// POST /api/print/stop - 停止打印流程，等待工作者退出
pub async fn stop(State(state): State<ServerState>) -> Json<StatusSnapshot> {
    state.orchestrator.stop_print_process().await;
    Json(state.orchestrator.status())
}

/// GET /api/status - 当前状态快照
pub async fn status(State(state): State<ServerState>) -> Json<StatusSnapshot> {
    Json(state.orchestrator.status())
}

/// GET /api/events - 状态事件流
pub async fn events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.orchestrator.bus().subscribe();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().event(event.name()).json_data(&event) {
                    Ok(sse) => return Some((Ok(sse), rx)),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode status event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
