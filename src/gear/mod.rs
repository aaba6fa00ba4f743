//! Gear module
//!
//! Discrete polling frequencies and the threshold table that picks between them

mod selector;
mod types;

pub use selector::{budget_ratio, sanitize_volatility, select_gear, GearThresholds};
pub use types::{Gear, GearProfile, GearTable, ParseGearError};
