//! Rate-limit budget module
//!
//! Tracks API rate-limit units spent within a reset window

mod window;

pub use window::{BudgetWindow, WindowUsage};

use async_trait::async_trait;
use std::sync::Arc;

/// Trait for rate-limit tracker implementations
#[async_trait]
pub trait RateLimitTracker: Send + Sync {
    /// Units still available in the current window
    async fn remaining_budget(&self) -> anyhow::Result<u64>;
    /// Total units allowed per window
    async fn budget_window_size(&self) -> anyhow::Result<u64>;
    /// Record units spent by executed queries
    async fn consume(&self, units: u64) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: RateLimitTracker + ?Sized> RateLimitTracker for Arc<T> {
    async fn remaining_budget(&self) -> anyhow::Result<u64> {
        (**self).remaining_budget().await
    }

    async fn budget_window_size(&self) -> anyhow::Result<u64> {
        (**self).budget_window_size().await
    }

    async fn consume(&self, units: u64) -> anyhow::Result<()> {
        (**self).consume(units).await
    }
}
