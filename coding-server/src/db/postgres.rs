//! Postgres implementation of [`CodeStore`]

use super::{CodeStore, StoreError, StoreResult};
use async_trait::async_trait;
use shared::models::{
    BatchCreate, BatchRecord, BatchStatus, BatchUpdate, ClaimRequest, DeviceErrorCode, Product,
    QueueItem, UserActivity, WorkItemStatus,
};
use sqlx::PgPool;

const BATCH_COLUMNS: &str = "id, batch_no, product_id, quantity_target, printer_line_id, \
     marking_printer_id, status, printed_count, started_at, ended_at";

#[derive(Clone)]
pub struct PgCodeStore {
    pool: PgPool,
}

impl PgCodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_status(
        &self,
        ids: &[i64],
        status: WorkItemStatus,
        timestamp: i64,
    ) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE unique_codes
            SET status = $1, status_updated_at = $2
            WHERE id = ANY($3)
            "#,
        )
        .bind(status.as_str())
        .bind(timestamp)
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CodeStore for PgCodeStore {
    async fn fetch_and_claim_work_items(&self, req: &ClaimRequest) -> StoreResult<Vec<QueueItem>> {
        if req.limit <= 0 {
            return Ok(Vec::new());
        }
        // SKIP LOCKED: concurrent claimers pass over each other's rows
        let mut items: Vec<QueueItem> = sqlx::query_as(
            r#"
            WITH picked AS (
                SELECT id FROM unique_codes
                WHERE product_id = $1 AND status = 'available'
                ORDER BY id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE unique_codes u
            SET status = 'claimed',
                batch_id = $3,
                printer_line_id = $4,
                marking_printer_id = $5,
                claimed_at = $6
            FROM picked
            WHERE u.id = picked.id
            RETURNING u.id, u.code
            "#,
        )
        .bind(req.product_id)
        .bind(req.limit)
        .bind(req.batch_id)
        .bind(req.printer_line_id)
        .bind(req.marking_printer_id)
        .bind(shared::util::now_millis())
        .fetch_all(&self.pool)
        .await?;

        // RETURNING order is unspecified
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn mark_printed(&self, ids: &[i64], timestamp: i64) -> StoreResult<u64> {
        self.set_status(ids, WorkItemStatus::Printed, timestamp)
            .await
    }

    async fn mark_unconfirmed(&self, ids: &[i64], timestamp: i64) -> StoreResult<u64> {
        self.set_status(ids, WorkItemStatus::Unconfirmed, timestamp)
            .await
    }

    async fn count_available_work_items(&self, product_id: i64) -> StoreResult<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM unique_codes WHERE product_id = $1 AND status = 'available'",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn find_product_by_id(&self, id: i64) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, barcode, is_active FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn find_product_by_barcode(&self, barcode: &str) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, barcode, is_active FROM products WHERE barcode = $1 LIMIT 1",
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn find_or_create_batch(&self, data: &BatchCreate) -> StoreResult<BatchRecord> {
        // ON CONFLICT DO UPDATE so RETURNING yields the existing row too
        let batch = sqlx::query_as::<_, BatchRecord>(&format!(
            r#"
            INSERT INTO batches
                (batch_no, product_id, quantity_target, printer_line_id, marking_printer_id,
                 status, printed_count, started_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7)
            ON CONFLICT (batch_no) DO UPDATE
            SET quantity_target = EXCLUDED.quantity_target,
                printer_line_id = EXCLUDED.printer_line_id,
                marking_printer_id = EXCLUDED.marking_printer_id,
                status = EXCLUDED.status,
                ended_at = NULL
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(&data.batch_no)
        .bind(data.product_id)
        .bind(data.quantity_target)
        .bind(data.printer_line_id)
        .bind(data.marking_printer_id)
        .bind(BatchStatus::Active.as_str())
        .bind(data.started_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(batch)
    }

    async fn find_batch_by_id(&self, id: i64) -> StoreResult<Option<BatchRecord>> {
        let batch = sqlx::query_as::<_, BatchRecord>(&format!(
            "SELECT {BATCH_COLUMNS} FROM batches WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(batch)
    }

    async fn update_batch(&self, id: i64, data: &BatchUpdate) -> StoreResult<BatchRecord> {
        sqlx::query_as::<_, BatchRecord>(&format!(
            r#"
            UPDATE batches
            SET status = $1, printed_count = $2, ended_at = $3
            WHERE id = $4
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(data.status.as_str())
        .bind(data.printed_count)
        .bind(data.ended_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Batch {id}")))
    }

    async fn record_user_activity(&self, activity: &UserActivity) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_activities (user_id, action, batch_id, detail, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(activity.user_id)
        .bind(&activity.action)
        .bind(activity.batch_id)
        .bind(&activity.detail)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_error_code_by_code(&self, code: i64) -> StoreResult<Option<DeviceErrorCode>> {
        let error_code = sqlx::query_as::<_, DeviceErrorCode>(
            "SELECT code, name, skippable FROM error_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(error_code)
    }
}
