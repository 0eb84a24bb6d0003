//! Data models
//!
//! Shared between coding-server and the dashboard (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (Postgres BIGINT / BIGSERIAL).

pub mod batch;
pub mod device_error;
pub mod product;
pub mod work_item;

// Re-exports
pub use batch::*;
pub use device_error::*;
pub use product::*;
pub use work_item::*;
