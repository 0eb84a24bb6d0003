use std::sync::Arc;

use coding_server::{
    Config, DbService, Orchestrator, Server, ServerState, StatusBus, init_logger_with_file,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 加载配置 (.env + 环境变量)
    let config = Config::from_env()?;

    // 2. 日志
    init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;
    tracing::info!(
        printer = %config.printer.transport,
        http_port = config.http_port,
        "Coding server starting..."
    );

    // 3. 数据库
    let db = DbService::connect(&config.database_url, config.database_max_connections).await?;

    // 4. 编排器 + HTTP 服务器
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(db.code_store()),
        config.printer.clone(),
        config.pipeline.clone(),
        StatusBus::default(),
    ));
    let server = Server::new(ServerState::new(config, orchestrator));

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Server error");
        return Err(e);
    }

    Ok(())
}
