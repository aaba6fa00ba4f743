//! Cron module
//!
//! Interval-driven tick execution with active/standby failover

mod driver;
mod failover;

pub use driver::{CronDriver, DriverReport};
pub use failover::{CronJob, FailoverError, FailoverGroup, JobStatus};

use crate::budget::RateLimitTracker;
use crate::controller::{ControllerError, FlywheelController, TickResult};
use crate::gear::Gear;
use crate::monitor::VolatilitySource;
use crate::warehouse::DataSink;
use async_trait::async_trait;
use std::time::Duration;

/// Anything that can run one controller tick
#[async_trait]
pub trait TickRunner: Send + Sync {
    /// Run one tick, giving up with an error once `limit` elapses.
    ///
    /// A runner that gives up must not have spent budget: the group hands
    /// the same tick to a standby.
    async fn run_tick(&self, limit: Duration) -> Result<TickResult, ControllerError>;

    /// Gear whose interval schedules the next tick
    async fn current_gear(&self) -> Gear;
}

#[async_trait]
impl<V, R, S> TickRunner for FlywheelController<V, R, S>
where
    V: VolatilitySource + 'static,
    R: RateLimitTracker + 'static,
    S: DataSink + 'static,
{
    async fn run_tick(&self, limit: Duration) -> Result<TickResult, ControllerError> {
        self.tick_within(limit).await
    }

    async fn current_gear(&self) -> Gear {
        FlywheelController::current_gear(self).await
    }
}
