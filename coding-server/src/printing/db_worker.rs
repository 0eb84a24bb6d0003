//! Database Worker
//!
//! 把设备已确认的码落库为 printed，并在待打印队列低于低水位时补码。

use crate::core::config::PipelineConfig;
use crate::db::CodeStore;
use crate::pipeline::SharedBuffers;
use futures::future::join_all;
use shared::models::{BatchInfo, ClaimRequest, QueueItem};
use shared::util::now_millis;
use std::sync::Arc;

pub struct DbWorker {
    buffers: SharedBuffers,
    store: Arc<dyn CodeStore>,
    config: PipelineConfig,
    product_id: i64,
    batch_id: i64,
    printer_line_id: i64,
    marking_printer_id: i64,
}

impl DbWorker {
    pub fn init(
        buffers: SharedBuffers,
        store: Arc<dyn CodeStore>,
        config: PipelineConfig,
        batch: &BatchInfo,
    ) -> Self {
        Self {
            buffers,
            store,
            config,
            product_id: batch.product_id,
            batch_id: batch.id,
            printer_line_id: batch.printer_line_id,
            marking_printer_id: batch.marking_printer_id,
        }
    }

    /// 轮询直到 `is_printing` 变为 false
    pub async fn run(&self) {
        tracing::info!(batch_id = self.batch_id, "DB worker started");
        while self.buffers.is_printing() {
            self.flush().await;
            if !self.buffers.is_printing() {
                break;
            }
            self.replenish().await;
            tokio::time::sleep(self.config.db_poll_interval).await;
        }
        tracing::info!(batch_id = self.batch_id, "DB worker stopped");
    }

    /// 清空待落库队列，分块并发写入；失败的块放回队列下次重试
    ///
    /// 返回成功落库的数量。
    pub async fn flush(&self) -> usize {
        let items = self.buffers.db_update_queue.shift_all();
        if items.is_empty() {
            return 0;
        }

        let timestamp = now_millis();
        let chunks: Vec<Vec<QueueItem>> = items
            .chunks(self.config.persist_chunk_size.max(1))
            .map(<[QueueItem]>::to_vec)
            .collect();

        let results = join_all(chunks.iter().map(|chunk| {
            let ids: Vec<i64> = chunk.iter().map(|item| item.id).collect();
            let store = self.store.clone();
            async move { store.mark_printed(&ids, timestamp).await }
        }))
        .await;

        let mut persisted = 0;
        for (chunk, result) in chunks.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    persisted += chunk.len();
                    self.buffers
                        .printed_update_count
                        .add_i64(chunk.len() as i64);
                }
                Err(e) => {
                    tracing::error!(count = chunk.len(), error = %e, "Failed to mark codes printed");
                    if let Err(full) = self.buffers.db_update_queue.push(chunk) {
                        tracing::error!(
                            lost = full.rejected.len(),
                            "DB update queue full, dropping unpersisted codes"
                        );
                    }
                }
            }
        }

        if persisted > 0 {
            tracing::debug!(persisted, "Codes marked printed");
        }
        persisted
    }

    /// 低水位时从存储认领新码
    ///
    /// 返回放入待打印队列的数量，认领失败视为本轮没有新码。
    pub async fn replenish(&self) -> usize {
        let queue = &self.buffers.print_queue;
        let spare = queue.spare();
        if spare == 0 || queue.size() > self.config.replenish_low_water {
            return 0;
        }

        let request = ClaimRequest {
            limit: spare as i64,
            product_id: self.product_id,
            batch_id: self.batch_id,
            printer_line_id: self.printer_line_id,
            marking_printer_id: self.marking_printer_id,
        };
        let items = match self.store.fetch_and_claim_work_items(&request).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim work items");
                return 0;
            }
        };
        if items.is_empty() {
            return 0;
        }

        match queue.push(items) {
            Ok(inserted) => {
                tracing::debug!(inserted, "Print queue replenished");
                inserted
            }
            Err(full) => {
                // 认领后放不下的码留在 claimed 状态，不会被其他工作者再选中
                tracing::warn!(rejected = full.rejected.len(), "Print queue overflow after claim");
                0
            }
        }
    }
}
