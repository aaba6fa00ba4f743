//! Rolling realized volatility from observed prices

use super::VolatilitySource;
use crate::config::VolatilityConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Realized volatility of log returns over a rolling time window
pub struct VolatilityEstimator {
    window: Duration,
    prices: VecDeque<(DateTime<Utc>, Decimal)>,
}

impl VolatilityEstimator {
    /// Create a new estimator with the given window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            prices: VecDeque::new(),
        }
    }

    /// Add a price observation and evict anything older than the window
    pub fn update(&mut self, timestamp: DateTime<Utc>, price: Decimal) {
        self.prices.push_back((timestamp, price));

        let cutoff = timestamp - self.window;
        while let Some((ts, _)) = self.prices.front() {
            if *ts < cutoff {
                self.prices.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of prices currently in the window
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Realized volatility over the window: sqrt of summed squared log returns.
    ///
    /// Returns `None` until at least two positive prices are present.
    pub fn estimate(&self) -> Option<f64> {
        if self.prices.len() < 2 {
            return None;
        }

        let returns: Vec<f64> = self
            .prices
            .iter()
            .zip(self.prices.iter().skip(1))
            .filter_map(|((_, prev), (_, curr))| {
                let prev: f64 = (*prev).try_into().ok()?;
                let curr: f64 = (*curr).try_into().ok()?;
                (prev > 0.0 && curr > 0.0).then(|| (curr / prev).ln())
            })
            .collect();

        if returns.is_empty() {
            return None;
        }

        Some(returns.iter().map(|r| r * r).sum::<f64>().sqrt())
    }
}

/// Volatility source backed by a shared rolling estimator
#[derive(Clone)]
pub struct RollingVolatility {
    estimator: Arc<RwLock<VolatilityEstimator>>,
}

impl RollingVolatility {
    /// Create a source with the given window
    pub fn new(window: Duration) -> Self {
        Self {
            estimator: Arc::new(RwLock::new(VolatilityEstimator::new(window))),
        }
    }

    /// Create a source with the configured window
    pub fn from_config(config: &VolatilityConfig) -> Self {
        Self::new(Duration::minutes(config.window_minutes as i64))
    }

    /// Feed a price observation
    pub async fn observe(&self, timestamp: DateTime<Utc>, price: Decimal) {
        self.estimator.write().await.update(timestamp, price);
    }
}

#[async_trait]
impl VolatilitySource for RollingVolatility {
    async fn current_volatility(&self) -> anyhow::Result<Option<f64>> {
        Ok(self.estimator.read().await.estimate())
    }
}
