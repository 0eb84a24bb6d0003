//! Orchestrator - 批次生命周期与打印流程
//!
//! # 流程
//!
//! ```text
//! start_batch(req)
//!     ├─ 1. 校验请求
//!     ├─ 2. 解析产品 (id 或条码)
//!     ├─ 3. 可用码数量检查
//!     ├─ 4. 创建/复用批次记录 + 用户活动
//!     ├─ 5. 重置共享单元/队列
//!     ├─ 6. 打开设备连接，初始化两个工作者
//!     └─ 7. 发布 batch_info
//!
//! start_print_process()  ──▶ run_process (后台)
//!     ├─ is_printing = true，首次补码
//!     ├─ 启动打码机工作者 + 数据库工作者
//!     ├─ 每 status_interval 发布 print_status
//!     └─ 停止后：等待工作者退出 → 最后一次落库 → 发布 print_complete
//!
//! stop_batch(req)
//!     ├─ 停止打印流程并等待
//!     ├─ 断开设备
//!     ├─ 更新批次记录 + 用户活动
//!     └─ 清空当前批次，发布 batch_info(null)
//! ```

use crate::batch_log;
use crate::core::config::{PipelineConfig, PrinterSettings};
use crate::core::tasks::{BackgroundTasks, TaskExit, TaskKind};
use crate::db::CodeStore;
use crate::message::StatusBus;
use crate::pipeline::SharedBuffers;
use crate::printing::{DbWorker, PrinterWorker};
use marking_printer::{DeviceConnection, DeviceLink};
use parking_lot::{Mutex, RwLock};
use shared::models::{
    BatchCreate, BatchInfo, BatchStatus, BatchUpdate, Product, UserActivity,
};
use shared::request::{BatchRequest, StopBatchRequest};
use shared::status::{StatusEvent, StatusSnapshot};
use shared::util::{elapsed_millis, now_millis};
use shared::{AppError, AppResult, ErrorCode};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// 当前批次及其专属资源
struct ActiveBatch {
    info: BatchInfo,
    connection: Arc<DeviceConnection>,
    printer: Arc<PrinterWorker<DeviceConnection>>,
    db: Arc<DbWorker>,
}

impl ActiveBatch {
    fn snapshot(&self, buffers: &SharedBuffers) -> StatusSnapshot {
        buffers.snapshot(
            Some(self.info.id),
            self.info.quantity_target,
            self.connection.status().as_str(),
        )
    }
}

pub struct Orchestrator {
    store: Arc<dyn CodeStore>,
    printer: PrinterSettings,
    config: PipelineConfig,
    buffers: SharedBuffers,
    bus: StatusBus,
    current: RwLock<Option<Arc<ActiveBatch>>>,
    /// 串行化 start_batch / stop_batch
    lifecycle: tokio::sync::Mutex<()>,
    process: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CodeStore>,
        printer: PrinterSettings,
        config: PipelineConfig,
        bus: StatusBus,
    ) -> Self {
        let buffers = SharedBuffers::new(&config);
        Self {
            store,
            printer,
            config,
            buffers,
            bus,
            current: RwLock::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            process: Mutex::new(None),
        }
    }

    pub fn bus(&self) -> &StatusBus {
        &self.bus
    }

    pub fn current_batch(&self) -> Option<BatchInfo> {
        self.current.read().as_ref().map(|batch| batch.info.clone())
    }

    pub fn is_printing(&self) -> bool {
        self.buffers.is_printing()
    }

    /// 当前状态快照
    pub fn status(&self) -> StatusSnapshot {
        match self.current.read().as_ref() {
            Some(batch) => batch.snapshot(&self.buffers),
            None => self.buffers.snapshot(None, 0, "closed"),
        }
    }

    /// 开始批次
    pub async fn start_batch(&self, req: BatchRequest) -> AppResult<BatchInfo> {
        req.validate()?;
        let _guard = self.lifecycle.lock().await;

        if let Some(active) = self.current.read().as_ref() {
            return Err(AppError::with_message(
                ErrorCode::BatchAlreadyActive,
                format!("Batch {} is already active", active.info.batch_no),
            )
            .with_detail("batch_id", active.info.id));
        }

        let product = self.resolve_product(&req).await?;

        let available = self.store.count_available_work_items(product.id).await?;
        if available < req.quantity_target {
            return Err(AppError::capacity(req.quantity_target, available));
        }

        let record = self
            .store
            .find_or_create_batch(&BatchCreate {
                batch_no: req.batch_no.trim().to_string(),
                product_id: product.id,
                quantity_target: req.quantity_target,
                printer_line_id: req.printer_line_id,
                marking_printer_id: req.marking_printer_id,
                started_at: now_millis(),
            })
            .await?;

        let info = BatchInfo {
            id: record.id,
            batch_no: record.batch_no,
            product_id: product.id,
            product_name: product.name,
            quantity_target: req.quantity_target,
            printer_line_id: req.printer_line_id,
            marking_printer_id: req.marking_printer_id,
            user_id: req.user_id,
            started_at: record.started_at,
        };

        self.buffers.reset();

        let connection = Arc::new(DeviceConnection::new(self.printer.connection_config()));
        connection
            .connect()
            .map_err(|e| AppError::device(format!("Failed to open printer connection: {e}")))?;

        let printer = Arc::new(PrinterWorker::init(
            self.buffers.clone(),
            connection.clone(),
            self.store.clone(),
            self.config.clone(),
        ));
        let db = Arc::new(DbWorker::init(
            self.buffers.clone(),
            self.store.clone(),
            self.config.clone(),
            &info,
        ));
        printer.batch_start();

        *self.current.write() = Some(Arc::new(ActiveBatch {
            info: info.clone(),
            connection,
            printer,
            db,
        }));

        self.record_activity(
            info.user_id,
            "batch.start",
            info.id,
            serde_json::json!({
                "batch_no": info.batch_no,
                "product_id": info.product_id,
                "quantity_target": info.quantity_target,
            }),
        )
        .await;
        batch_log!(info.user_id, "batch.start", info.id);
        tracing::info!(
            batch_id = info.id,
            batch_no = %info.batch_no,
            product = %info.product_name,
            quantity_target = info.quantity_target,
            available,
            "Batch started"
        );

        self.bus.publish(StatusEvent::BatchInfo(Some(info.clone())));
        Ok(info)
    }

    /// 启动打印流程；已在打印时不做任何事，返回 false
    pub fn start_print_process(&self) -> AppResult<bool> {
        let batch = self
            .current
            .read()
            .clone()
            .ok_or_else(|| AppError::new(ErrorCode::NoActiveBatch))?;

        let mut process = self.process.lock();
        if self.buffers.is_printing() || process.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!(batch_id = batch.info.id, "Print process already running");
            return Ok(false);
        }

        self.buffers.is_printing.set(true);
        let handle = tokio::spawn(run_process(
            batch,
            self.buffers.clone(),
            self.bus.clone(),
            self.config.clone(),
        ));
        *process = Some(handle);
        Ok(true)
    }

    /// 停止打印流程并等待其结束
    pub async fn stop_print_process(&self) {
        self.buffers.is_printing.set(false);
        let handle = self.process.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = ?e, "Print process task failed");
        }
    }

    /// 结束批次
    pub async fn stop_batch(&self, req: StopBatchRequest) -> AppResult<StatusSnapshot> {
        let _guard = self.lifecycle.lock().await;

        let batch = self
            .current
            .read()
            .clone()
            .ok_or_else(|| AppError::new(ErrorCode::NoActiveBatch))?;
        if batch.info.id != req.batch_id {
            return Err(AppError::with_message(
                ErrorCode::BatchNotFound,
                format!("Batch {} is not the active batch", req.batch_id),
            ));
        }

        self.stop_print_process().await;
        batch.connection.disconnect().await;

        let snapshot = batch.snapshot(&self.buffers);
        let printed = snapshot.printed_update_count;

        *self.current.write() = None;
        self.bus.publish(StatusEvent::BatchInfo(None));

        let update = BatchUpdate {
            status: BatchStatus::Completed,
            printed_count: printed,
            ended_at: Some(now_millis()),
        };
        if let Err(e) = self.store.update_batch(batch.info.id, &update).await {
            tracing::error!(batch_id = batch.info.id, error = %e, "Failed to complete batch record");
        }
        self.record_activity(
            req.user_id,
            "batch.stop",
            batch.info.id,
            serde_json::json!({ "printed_count": printed }),
        )
        .await;
        batch_log!(req.user_id, "batch.stop", batch.info.id, printed);
        tracing::info!(batch_id = batch.info.id, printed, "Batch stopped");

        Ok(snapshot)
    }

    /// 进程退出前收尾
    pub async fn shutdown(&self) {
        let active = self.current.read().clone();
        if let Some(batch) = active {
            tracing::info!(batch_id = batch.info.id, "Stopping active batch on shutdown");
            self.stop_print_process().await;
            batch.connection.disconnect().await;
        }
    }

    async fn resolve_product(&self, req: &BatchRequest) -> AppResult<Product> {
        let product = match (req.product_id, req.barcode.as_deref()) {
            (Some(id), _) => self.store.find_product_by_id(id).await?,
            (None, Some(barcode)) => self.store.find_product_by_barcode(barcode.trim()).await?,
            (None, None) => None,
        };
        match product {
            Some(product) if product.is_active => Ok(product),
            Some(product) => Err(AppError::validation_field(
                "product_id",
                format!("Product {} is inactive", product.name),
            )),
            None => Err(AppError::new(ErrorCode::ProductNotFound)),
        }
    }

    async fn record_activity(
        &self,
        user_id: i64,
        action: &str,
        batch_id: i64,
        detail: serde_json::Value,
    ) {
        let activity = UserActivity {
            user_id,
            action: action.to_string(),
            batch_id: Some(batch_id),
            detail: Some(detail),
            created_at: now_millis(),
        };
        if let Err(e) = self.store.record_user_activity(&activity).await {
            tracing::warn!(action, error = %e, "Failed to record user activity");
        }
    }
}

/// 打印流程：运行两个工作者，周期发布状态，直到 `is_printing` 变为 false
async fn run_process(
    batch: Arc<ActiveBatch>,
    buffers: SharedBuffers,
    bus: StatusBus,
    config: PipelineConfig,
) {
    let started_at = now_millis();
    let seeded = batch.db.replenish().await;
    tracing::info!(batch_id = batch.info.id, seeded, "Print process started");

    let mut tasks = BackgroundTasks::new();
    let printer = batch.printer.clone();
    tasks.spawn("printer_worker", TaskKind::Worker, async move {
        printer.run().await;
    });
    let db = batch.db.clone();
    tasks.spawn("db_worker", TaskKind::Worker, async move {
        db.run().await;
    });

    let publisher = batch.clone();
    let status_buffers = buffers.clone();
    let status_bus = bus.clone();
    tasks.spawn("status_publisher", TaskKind::Periodic, async move {
        let mut ticker = tokio::time::interval(config.status_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while status_buffers.is_printing() {
            ticker.tick().await;
            status_bus.publish(StatusEvent::PrintStatus(publisher.snapshot(&status_buffers)));
        }
    });

    for (name, exit) in tasks.join().await {
        if let TaskExit::Panicked(message) = exit {
            tracing::error!(task = name, panic = %message, "Worker ended abnormally");
        }
    }

    // 停止过程中确认的码
    batch.db.flush().await;

    let elapsed_ms = elapsed_millis(started_at);
    let snapshot = batch.snapshot(&buffers);
    tracing::info!(
        batch_id = batch.info.id,
        elapsed_ms,
        printed = snapshot.printed_update_count,
        "Print process complete"
    );
    bus.publish(StatusEvent::PrintComplete {
        snapshot,
        elapsed_ms,
    });
}
