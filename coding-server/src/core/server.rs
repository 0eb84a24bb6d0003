//! Server Implementation
//!
//! HTTP 服务器启动和管理

use crate::api;
use crate::core::ServerState;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// In-flight request cap; the API is a handful of operator dashboards
const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Build the application router with middleware and state
pub fn build_app(state: ServerState) -> axum::Router {
    api::build_router()
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// HTTP Server
pub struct Server {
    state: ServerState,
}

impl Server {
    pub fn new(state: ServerState) -> Self {
        Self { state }
    }

    /// Serve until Ctrl-C, then stop any active print process
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "Coding server listening");

        let orchestrator = self.state.orchestrator.clone();
        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        };

        axum::serve(listener, build_app(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;

        orchestrator.shutdown().await;
        Ok(())
    }
}
