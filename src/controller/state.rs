//! Controller state

use crate::gear::Gear;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// State handle shared by every controller in a failover group
pub type SharedState = Arc<Mutex<ControllerState>>;

/// Mutable controller state, owned by the controller and written once per tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerState {
    /// Gear the controller is running in
    pub current_gear: Gear,
    /// Units allowed in the current window
    pub rate_limit_budget: u64,
    /// Units spent in the current window
    pub rate_limit_used: u64,
    /// Last sanitized volatility reading
    pub volatility_estimate: f64,
    /// Completed ticks since start
    pub ticks: u64,
    /// Time of the last completed tick
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl ControllerState {
    /// Fresh state at process start
    pub fn new(initial_gear: Gear, rate_limit_budget: u64) -> Self {
        Self {
            current_gear: initial_gear,
            rate_limit_budget,
            rate_limit_used: 0,
            volatility_estimate: 0.0,
            ticks: 0,
            last_tick_at: None,
        }
    }

    /// Wrap the state in a handle controllers can share
    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn rate_limit_remaining(&self) -> u64 {
        self.rate_limit_budget.saturating_sub(self.rate_limit_used)
    }

    /// Sync the window from the tracker's view and add this tick's spend.
    ///
    /// `used` never exceeds `budget`.
    pub(crate) fn apply_usage(&mut self, budget: u64, remaining_before: u64, consumed: u64) {
        let spent_before = budget.saturating_sub(remaining_before);
        self.rate_limit_budget = budget;
        self.rate_limit_used = spent_before.saturating_add(consumed).min(budget);
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new(Gear::Medium, 0)
    }
}
