//! Scenario files for replay and scripted runs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Observed price for seeding the rolling volatility estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

/// Load a JSON array of price points, oldest first
pub fn load_prices(path: impl AsRef<Path>) -> anyhow::Result<Vec<PricePoint>> {
    let content = std::fs::read_to_string(path)?;
    let mut prices: Vec<PricePoint> = serde_json::from_str(&content)?;
    prices.sort_by_key(|p| p.timestamp);
    Ok(prices)
}

/// One tick's worth of inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Volatility reading; missing means the monitor had nothing
    #[serde(default)]
    pub volatility: Option<f64>,
    /// Overrides the tracker's remaining budget before the tick
    #[serde(default)]
    pub rate_limit_remaining: Option<u64>,
}

impl ScenarioStep {
    pub fn new(volatility: f64) -> Self {
        Self {
            volatility: Some(volatility),
            rate_limit_remaining: None,
        }
    }

    pub fn with_remaining(mut self, remaining: u64) -> Self {
        self.rate_limit_remaining = Some(remaining);
        self
    }
}

/// Ordered scenario steps, stored as a JSON array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scenario {
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Load a scenario from a JSON file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let scenario: Scenario = serde_json::from_str(&content)?;
        if scenario.steps.is_empty() {
            anyhow::bail!("Scenario has no steps");
        }
        Ok(scenario)
    }

    /// A calm market that heats up, hits the budget floor, then settles
    pub fn builtin() -> Self {
        Self {
            steps: vec![
                ScenarioStep::new(0.08).with_remaining(850),
                ScenarioStep::new(0.12),
                ScenarioStep::new(0.18),
                ScenarioStep::new(0.25),
                ScenarioStep::new(0.32),
                ScenarioStep::new(0.32).with_remaining(150),
                ScenarioStep::new(0.12).with_remaining(900),
                ScenarioStep::new(0.09),
            ],
        }
    }

    /// Volatility readings in order
    pub fn volatilities(&self) -> Vec<Option<f64>> {
        self.steps.iter().map(|s| s.volatility).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
