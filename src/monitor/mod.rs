//! Market monitoring module
//!
//! Volatility sources consumed by the controller each tick

mod scripted;
mod volatility;

pub use scripted::ScriptedVolatility;
pub use volatility::{RollingVolatility, VolatilityEstimator};

use async_trait::async_trait;
use std::sync::Arc;

/// Trait for volatility source implementations
#[async_trait]
pub trait VolatilitySource: Send + Sync {
    /// Current volatility estimate; `None` when no reading is available
    async fn current_volatility(&self) -> anyhow::Result<Option<f64>>;
}

#[async_trait]
impl<T: VolatilitySource + ?Sized> VolatilitySource for Arc<T> {
    async fn current_volatility(&self) -> anyhow::Result<Option<f64>> {
        (**self).current_volatility().await
    }
}
