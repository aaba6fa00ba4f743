//! Controller module
//!
//! The flywheel tick loop: read volatility and budget, pick a gear, schedule
//! queries, commit state, and hand the result to the warehouse

mod flywheel;
mod state;
mod types;

pub use flywheel::{FlywheelController, FlywheelSettings};
pub use state::{ControllerState, SharedState};
pub use types::{ControllerError, GearChange, TickId, TickResult};
