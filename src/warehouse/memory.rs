//! In-memory warehouse

use super::{DataSink, FeatureBuilder, WarehouseRecord};
use crate::controller::TickResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Keeps every record in memory
#[derive(Clone)]
pub struct MemoryWarehouse {
    features: Arc<Mutex<FeatureBuilder>>,
    records: Arc<RwLock<Vec<WarehouseRecord>>>,
}

impl MemoryWarehouse {
    /// Create a warehouse with the given rolling-feature window
    pub fn new(rolling_window: usize) -> Self {
        Self {
            features: Arc::new(Mutex::new(FeatureBuilder::new(rolling_window))),
            records: Arc::new(RwLock::new(vec![])),
        }
    }

    /// All stored records
    pub async fn records(&self) -> Vec<WarehouseRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for MemoryWarehouse {
    fn default() -> Self {
        Self::new(12)
    }
}

#[async_trait]
impl DataSink for MemoryWarehouse {
    async fn store_tick_result(&self, tick: TickResult) -> anyhow::Result<()> {
        let record = self.features.lock().await.build(&tick);
        self.records.write().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gear::Gear;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_stores_records() {
        let warehouse = MemoryWarehouse::default();
        assert!(warehouse.is_empty().await);

        let tick = TickResult {
            tick_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            gear_selected: Gear::Medium,
            previous_gear: Gear::Medium,
            volatility: 0.12,
            queries_executed: vec![],
            budget_consumed: 0,
            budget_remaining: 1000,
            budget_window: 1000,
        };
        warehouse.store_tick_result(tick.clone()).await.unwrap();

        let records = warehouse.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tick_id, tick.tick_id.to_string());
        assert!(!records[0].gear_changed);
    }
}
