//! Gear selection from volatility and rate-limit pressure

use super::Gear;
use serde::{Deserialize, Serialize};

/// Threshold table for gear selection.
///
/// Evaluated top-down: budget protection first, then volatility bands from
/// the highest gear down. All volatility comparisons are strict, so a
/// reading exactly on a boundary stays in the lower gear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GearThresholds {
    /// Remaining/budget ratio below which the controller is forced to `low`
    pub budget_floor: f64,
    /// Volatility above which `medium` is selected
    pub medium: f64,
    /// Volatility above which `high` is selected
    pub high: f64,
    /// Volatility above which `veryhigh` is selected
    pub veryhigh: f64,
    /// Volatility above which `emergency` is selected
    pub emergency: f64,
}

impl Default for GearThresholds {
    fn default() -> Self {
        Self {
            budget_floor: 0.20,
            medium: 0.10,
            high: 0.15,
            veryhigh: 0.20,
            emergency: 0.30,
        }
    }
}

impl GearThresholds {
    /// Select a gear for the given readings
    pub fn select(
        &self,
        volatility: f64,
        rate_limit_remaining: u64,
        rate_limit_budget: u64,
    ) -> Gear {
        if budget_ratio(rate_limit_remaining, rate_limit_budget) < self.budget_floor {
            return Gear::Low;
        }

        let volatility = sanitize_volatility(Some(volatility));
        if volatility > self.emergency {
            Gear::Emergency
        } else if volatility > self.veryhigh {
            Gear::VeryHigh
        } else if volatility > self.high {
            Gear::High
        } else if volatility > self.medium {
            Gear::Medium
        } else {
            Gear::Low
        }
    }

    /// Gear volatility alone would pick, ignoring budget pressure
    pub fn volatility_gear(&self, volatility: f64) -> Gear {
        self.select(volatility, 1, 1)
    }

    /// Reject tables that would break monotonic selection
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.budget_floor) {
            anyhow::bail!("budget_floor must be within [0, 1], got {}", self.budget_floor);
        }
        let bands = [self.medium, self.high, self.veryhigh, self.emergency];
        if bands.iter().any(|t| !t.is_finite() || *t < 0.0) {
            anyhow::bail!("Volatility thresholds must be finite and non-negative");
        }
        if !bands.windows(2).all(|w| w[0] < w[1]) {
            anyhow::bail!("Volatility thresholds must be strictly ascending");
        }
        Ok(())
    }
}

/// Select a gear using the default threshold table
pub fn select_gear(volatility: f64, rate_limit_remaining: u64, rate_limit_budget: u64) -> Gear {
    GearThresholds::default().select(volatility, rate_limit_remaining, rate_limit_budget)
}

/// Fraction of the budget still available.
///
/// An empty budget counts as exhausted. Remaining above budget is clamped.
pub fn budget_ratio(rate_limit_remaining: u64, rate_limit_budget: u64) -> f64 {
    if rate_limit_budget == 0 {
        return 0.0;
    }
    rate_limit_remaining.min(rate_limit_budget) as f64 / rate_limit_budget as f64
}

/// Map missing, negative, or non-finite readings to zero
pub fn sanitize_volatility(volatility: Option<f64>) -> f64 {
    match volatility {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}
