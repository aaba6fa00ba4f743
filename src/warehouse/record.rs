//! Flattened warehouse records with engineered features

use crate::controller::TickResult;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One warehouse row per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseRecord {
    pub tick_id: String,
    pub timestamp: DateTime<Utc>,
    pub gear: String,
    pub gear_level: u8,
    pub previous_gear: String,
    pub gear_changed: bool,
    pub volatility: f64,
    pub volatility_rolling_avg: f64,
    pub rate_limit_remaining: u64,
    pub rate_limit_budget: u64,
    /// Fraction of the window spent
    pub rate_limit_pressure: f64,
    pub budget_consumed: u64,
    pub budget_utilization: f64,
    pub queries_executed: u32,
    /// Comma-separated query names
    pub query_names: String,
    pub hour_of_day: u32,
    /// Monday = 0
    pub day_of_week: u32,
}

/// Builds records and keeps the rolling volatility window
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    window: usize,
    recent: VecDeque<f64>,
}

impl FeatureBuilder {
    /// Rolling average over the last `window` ticks (at least one)
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            recent: VecDeque::with_capacity(window),
        }
    }

    /// Flatten a tick result into a record
    pub fn build(&mut self, tick: &TickResult) -> WarehouseRecord {
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(tick.volatility);
        let rolling_avg = self.recent.iter().sum::<f64>() / self.recent.len() as f64;

        WarehouseRecord {
            tick_id: tick.tick_id.to_string(),
            timestamp: tick.timestamp,
            gear: tick.gear_selected.to_string(),
            gear_level: tick.gear_selected.level(),
            previous_gear: tick.previous_gear.to_string(),
            gear_changed: tick.gear_changed(),
            volatility: tick.volatility,
            volatility_rolling_avg: rolling_avg,
            rate_limit_remaining: tick.budget_remaining,
            rate_limit_budget: tick.budget_window,
            rate_limit_pressure: tick.rate_limit_pressure(),
            budget_consumed: tick.budget_consumed,
            budget_utilization: tick.utilization(),
            queries_executed: tick.queries_executed.len() as u32,
            query_names: tick
                .queries_executed
                .iter()
                .map(|q| q.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
            hour_of_day: tick.timestamp.hour(),
            day_of_week: tick.timestamp.weekday().num_days_from_monday(),
        }
    }
}
