//! Fixed-window rate-limit budget

use super::RateLimitTracker;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Budget usage inside the current window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowUsage {
    /// Units allowed per window
    pub budget: u64,
    /// Units spent in this window
    pub used: u64,
    /// When the window was last reset
    pub started_at: DateTime<Utc>,
}

impl WindowUsage {
    pub fn remaining(&self) -> u64 {
        self.budget.saturating_sub(self.used)
    }
}

/// Rate-limit tracker with an externally reset budget window
#[derive(Clone)]
pub struct BudgetWindow {
    usage: Arc<RwLock<WindowUsage>>,
}

impl BudgetWindow {
    /// Create a window with the full budget available
    pub fn new(budget: u64) -> Self {
        Self {
            usage: Arc::new(RwLock::new(WindowUsage {
                budget,
                used: 0,
                started_at: Utc::now(),
            })),
        }
    }

    /// Start a fresh window
    pub async fn reset(&self) {
        let mut usage = self.usage.write().await;
        usage.used = 0;
        usage.started_at = Utc::now();
        tracing::info!(budget = usage.budget, "Rate-limit window reset");
    }

    /// Overwrite the remaining budget, e.g. from an upstream rate-limit header
    pub async fn set_remaining(&self, remaining: u64) {
        let mut usage = self.usage.write().await;
        usage.used = usage.budget.saturating_sub(remaining);
    }

    /// Snapshot of the current window
    pub async fn usage(&self) -> WindowUsage {
        self.usage.read().await.clone()
    }

    /// Reset the window every `period` on the tokio runtime.
    ///
    /// The first reset happens one full period after spawning.
    pub fn spawn_reset_task(&self, period: Duration) -> JoinHandle<()> {
        let window = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                window.reset().await;
            }
        })
    }
}

#[async_trait]
impl RateLimitTracker for BudgetWindow {
    async fn remaining_budget(&self) -> anyhow::Result<u64> {
        Ok(self.usage.read().await.remaining())
    }

    async fn budget_window_size(&self) -> anyhow::Result<u64> {
        Ok(self.usage.read().await.budget)
    }

    async fn consume(&self, units: u64) -> anyhow::Result<()> {
        let mut usage = self.usage.write().await;
        usage.used = usage.used.saturating_add(units).min(usage.budget);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_window_is_full() {
        let window = BudgetWindow::new(1000);
        assert_eq!(window.remaining_budget().await.unwrap(), 1000);
        assert_eq!(window.budget_window_size().await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_consume_saturates_at_budget() {
        let window = BudgetWindow::new(100);
        window.consume(45).await.unwrap();
        assert_eq!(window.remaining_budget().await.unwrap(), 55);

        window.consume(500).await.unwrap();
        let usage = window.usage().await;
        assert_eq!(usage.used, 100);
        assert_eq!(usage.remaining(), 0);
    }

    #[tokio::test]
    async fn test_reset_restores_budget() {
        let window = BudgetWindow::new(100);
        window.consume(85).await.unwrap();
        window.reset().await;
        assert_eq!(window.remaining_budget().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_set_remaining() {
        let window = BudgetWindow::new(1000);
        window.set_remaining(150).await;
        assert_eq!(window.usage().await.used, 850);

        window.set_remaining(5000).await;
        assert_eq!(window.remaining_budget().await.unwrap(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_task_fires_each_period() {
        let window = BudgetWindow::new(10);
        window.consume(10).await.unwrap();

        let handle = window.spawn_reset_task(Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert_eq!(window.remaining_budget().await.unwrap(), 0);

        tokio::time::sleep(Duration::from_secs(1801)).await;
        assert_eq!(window.remaining_budget().await.unwrap(), 10);

        handle.abort();
    }
}
