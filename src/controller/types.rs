//! Controller types

use crate::gear::Gear;
use crate::query::Query;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Tick identifier
pub type TickId = Uuid;

/// Outcome of one evaluation tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResult {
    /// Unique tick identifier
    pub tick_id: TickId,
    /// When the tick was evaluated
    pub timestamp: DateTime<Utc>,
    /// Gear selected for this tick
    pub gear_selected: Gear,
    /// Gear before this tick
    pub previous_gear: Gear,
    /// Sanitized volatility reading used for selection
    pub volatility: f64,
    /// Queries to execute, in order
    pub queries_executed: Vec<Query>,
    /// Units spent by the selected queries
    pub budget_consumed: u64,
    /// Units left in the window after this tick
    pub budget_remaining: u64,
    /// Units allowed per window
    pub budget_window: u64,
}

impl TickResult {
    /// Whether this tick shifted gears
    pub fn gear_changed(&self) -> bool {
        self.gear_selected != self.previous_gear
    }

    /// Fraction of the window already spent, including this tick
    pub fn rate_limit_pressure(&self) -> f64 {
        if self.budget_window == 0 {
            return 1.0;
        }
        1.0 - self.budget_remaining.min(self.budget_window) as f64 / self.budget_window as f64
    }

    /// Fraction of the pre-tick remaining budget this tick spent
    pub fn utilization(&self) -> f64 {
        let offered = self.budget_remaining + self.budget_consumed;
        if offered == 0 {
            return 0.0;
        }
        self.budget_consumed as f64 / offered as f64
    }
}

/// Emitted whenever the controller moves to a different gear
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GearChange {
    pub from: Gear,
    pub to: Gear,
    /// Volatility reading that triggered the shift
    pub volatility: f64,
    /// Remaining/budget ratio at the time of the shift
    pub budget_ratio: f64,
    pub at: DateTime<Utc>,
}

impl GearChange {
    pub fn is_upshift(&self) -> bool {
        self.to > self.from
    }
}

/// Controller errors
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A collaborator could not be read or updated
    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable {
        source_name: &'static str,
        reason: String,
    },
    /// Collaborators did not answer before the tick deadline; no budget was spent
    #[error("Tick timed out before spending budget")]
    TimedOut,
}

impl ControllerError {
    pub(crate) fn unavailable(source_name: &'static str, err: anyhow::Error) -> Self {
        Self::SourceUnavailable {
            source_name,
            reason: format!("{:#}", err),
        }
    }
}
