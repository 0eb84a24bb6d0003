//! In-process [`CodeStore`]
//!
//! Keeps everything in a map behind one lock. Used by the pipeline tests
//! and for running the server against a simulated printer without Postgres.

use super::{CodeStore, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::models::{
    BatchCreate, BatchRecord, BatchUpdate, ClaimRequest, DeviceErrorCode, Product, QueueItem,
    UserActivity, WorkItemStatus,
};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct StoredItem {
    code: String,
    product_id: i64,
    status: WorkItemStatus,
    batch_id: Option<i64>,
}

#[derive(Default)]
struct MemoryData {
    items: BTreeMap<i64, StoredItem>,
    products: Vec<Product>,
    batches: Vec<BatchRecord>,
    error_codes: HashMap<i64, DeviceErrorCode>,
    activities: Vec<UserActivity>,
    claim_limits: Vec<i64>,
    fail_writes: bool,
}

#[derive(Default)]
pub struct MemoryCodeStore {
    data: Mutex<MemoryData>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product: Product) {
        self.data.lock().products.push(product);
    }

    /// Add `count` available codes for a product, ids continuing from the
    /// highest existing one
    pub fn add_codes(&self, product_id: i64, count: usize) {
        let mut data = self.data.lock();
        let start = data.items.keys().next_back().copied().unwrap_or(0) + 1;
        for id in start..start + count as i64 {
            data.items.insert(
                id,
                StoredItem {
                    code: format!("CODE{id:08}"),
                    product_id,
                    status: WorkItemStatus::Available,
                    batch_id: None,
                },
            );
        }
    }

    pub fn add_error_code(&self, code: DeviceErrorCode) {
        self.data.lock().error_codes.insert(code.code, code);
    }

    /// Make status updates fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.data.lock().fail_writes = fail;
    }

    pub fn status_of(&self, id: i64) -> Option<WorkItemStatus> {
        self.data.lock().items.get(&id).map(|item| item.status)
    }

    pub fn ids_with_status(&self, status: WorkItemStatus) -> Vec<i64> {
        self.data
            .lock()
            .items
            .iter()
            .filter(|(_, item)| item.status == status)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every `limit` passed to a claim so far
    pub fn claim_limits(&self) -> Vec<i64> {
        self.data.lock().claim_limits.clone()
    }

    pub fn activities(&self) -> Vec<UserActivity> {
        self.data.lock().activities.clone()
    }

    fn set_status(&self, ids: &[i64], status: WorkItemStatus) -> StoreResult<u64> {
        let mut data = self.data.lock();
        if data.fail_writes {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut updated = 0;
        for id in ids {
            if let Some(item) = data.items.get_mut(id) {
                item.status = status;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn fetch_and_claim_work_items(&self, req: &ClaimRequest) -> StoreResult<Vec<QueueItem>> {
        let mut data = self.data.lock();
        data.claim_limits.push(req.limit);
        let limit = req.limit.max(0) as usize;
        let claimed: Vec<QueueItem> = data
            .items
            .iter_mut()
            .filter(|(_, item)| {
                item.product_id == req.product_id && item.status == WorkItemStatus::Available
            })
            .take(limit)
            .map(|(id, item)| {
                item.status = WorkItemStatus::Claimed;
                item.batch_id = Some(req.batch_id);
                QueueItem::new(*id, item.code.clone())
            })
            .collect();
        Ok(claimed)
    }

    async fn mark_printed(&self, ids: &[i64], _timestamp: i64) -> StoreResult<u64> {
        self.set_status(ids, WorkItemStatus::Printed)
    }

    async fn mark_unconfirmed(&self, ids: &[i64], _timestamp: i64) -> StoreResult<u64> {
        self.set_status(ids, WorkItemStatus::Unconfirmed)
    }

    async fn count_available_work_items(&self, product_id: i64) -> StoreResult<i64> {
        let count = self
            .data
            .lock()
            .items
            .values()
            .filter(|item| item.product_id == product_id && item.status == WorkItemStatus::Available)
            .count();
        Ok(count as i64)
    }

    async fn find_product_by_id(&self, id: i64) -> StoreResult<Option<Product>> {
        Ok(self.data.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_product_by_barcode(&self, barcode: &str) -> StoreResult<Option<Product>> {
        Ok(self
            .data
            .lock()
            .products
            .iter()
            .find(|p| p.barcode == barcode)
            .cloned())
    }

    async fn find_or_create_batch(&self, data: &BatchCreate) -> StoreResult<BatchRecord> {
        let mut store = self.data.lock();
        if let Some(existing) = store.batches.iter().find(|b| b.batch_no == data.batch_no) {
            return Ok(existing.clone());
        }
        let record = BatchRecord {
            id: store.batches.len() as i64 + 1,
            batch_no: data.batch_no.clone(),
            product_id: data.product_id,
            quantity_target: data.quantity_target,
            printer_line_id: data.printer_line_id,
            marking_printer_id: data.marking_printer_id,
            status: shared::models::BatchStatus::Active.as_str().to_string(),
            printed_count: 0,
            started_at: data.started_at,
            ended_at: None,
        };
        store.batches.push(record.clone());
        Ok(record)
    }

    async fn find_batch_by_id(&self, id: i64) -> StoreResult<Option<BatchRecord>> {
        Ok(self.data.lock().batches.iter().find(|b| b.id == id).cloned())
    }

    async fn update_batch(&self, id: i64, data: &BatchUpdate) -> StoreResult<BatchRecord> {
        let mut store = self.data.lock();
        let batch = store
            .batches
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Batch {id}")))?;
        batch.status = data.status.as_str().to_string();
        batch.printed_count = data.printed_count;
        batch.ended_at = data.ended_at;
        Ok(batch.clone())
    }

    async fn record_user_activity(&self, activity: &UserActivity) -> StoreResult<()> {
        self.data.lock().activities.push(activity.clone());
        Ok(())
    }

    async fn find_error_code_by_code(&self, code: i64) -> StoreResult<Option<DeviceErrorCode>> {
        Ok(self.data.lock().error_codes.get(&code).cloned())
    }
}
