//! ML warehouse module
//!
//! Stores tick results with engineered features for later model training

mod memory;
mod parquet;
mod record;

pub use self::parquet::{
    list_record_files, record_schema, ParquetRecordReader, ParquetWarehouse, ParquetWriter,
    WarehouseStats,
};
pub use memory::MemoryWarehouse;
pub use record::{FeatureBuilder, WarehouseRecord};

use crate::controller::TickResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for data sink implementations
#[async_trait]
pub trait DataSink: Send + Sync {
    /// Accept one tick result
    async fn store_tick_result(&self, tick: TickResult) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: DataSink + ?Sized> DataSink for Arc<T> {
    async fn store_tick_result(&self, tick: TickResult) -> anyhow::Result<()> {
        (**self).store_tick_result(tick).await
    }
}

/// Sink that drops every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl DataSink for NullSink {
    async fn store_tick_result(&self, _tick: TickResult) -> anyhow::Result<()> {
        Ok(())
    }
}
