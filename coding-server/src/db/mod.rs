//! Database Module
//!
//! Storage contracts the pipeline depends on ([`CodeStore`]) and the
//! Postgres connection pool backing the production implementation.

pub mod memory;
pub mod postgres;

pub use memory::MemoryCodeStore;
pub use postgres::PgCodeStore;

use async_trait::async_trait;
use shared::models::{
    BatchCreate, BatchRecord, BatchUpdate, ClaimRequest, DeviceErrorCode, Product, QueueItem,
    UserActivity,
};
use shared::AppError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Storage error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::not_found(what),
            StoreError::Database(e) => AppError::database(e.to_string()),
        }
    }
}

/// Data access the print pipeline and the orchestrator rely on
///
/// Timestamps are UTC milliseconds.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Atomically claim up to `limit` available items (ascending id) and
    /// stamp them with the batch/printer ownership. Never hands the same
    /// item to two claimers.
    async fn fetch_and_claim_work_items(&self, req: &ClaimRequest) -> StoreResult<Vec<QueueItem>>;

    async fn mark_printed(&self, ids: &[i64], timestamp: i64) -> StoreResult<u64>;

    /// Device acceptance is unknown for these ids
    async fn mark_unconfirmed(&self, ids: &[i64], timestamp: i64) -> StoreResult<u64>;

    async fn count_available_work_items(&self, product_id: i64) -> StoreResult<i64>;

    async fn find_product_by_id(&self, id: i64) -> StoreResult<Option<Product>>;

    async fn find_product_by_barcode(&self, barcode: &str) -> StoreResult<Option<Product>>;

    /// Reuse the batch with the same number, or create it
    async fn find_or_create_batch(&self, data: &BatchCreate) -> StoreResult<BatchRecord>;

    async fn find_batch_by_id(&self, id: i64) -> StoreResult<Option<BatchRecord>>;

    async fn update_batch(&self, id: i64, data: &BatchUpdate) -> StoreResult<BatchRecord>;

    async fn record_user_activity(&self, activity: &UserActivity) -> StoreResult<()>;

    async fn find_error_code_by_code(&self, code: i64) -> StoreResult<Option<DeviceErrorCode>>;
}

/// Database service, owns a Postgres connection pool
#[derive(Clone)]
pub struct DbService {
    pub pool: PgPool,
}

impl DbService {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        tracing::info!(max_connections, "Database connection established (PostgreSQL)");
        Ok(Self { pool })
    }

    pub fn code_store(&self) -> PgCodeStore {
        PgCodeStore::new(self.pool.clone())
    }
}
