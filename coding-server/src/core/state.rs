//! Server State

use std::sync::Arc;
use std::time::Instant;

use crate::core::Config;
use crate::orchestrator::Orchestrator;

/// 服务器状态 - HTTP 处理器共享的引用
///
/// 使用 Arc 实现浅拷贝。
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub started_at: Instant,
}

impl ServerState {
    pub fn new(config: Config, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            started_at: Instant::now(),
        }
    }
}
