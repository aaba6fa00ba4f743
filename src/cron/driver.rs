//! Re-arming tick scheduler

use super::FailoverGroup;
use crate::controller::TickResult;
use crate::gear::GearTable;
use std::time::Duration;
use tokio::sync::watch;

/// Summary of a driver run
#[derive(Debug, Clone, Default)]
pub struct DriverReport {
    pub ticks: u64,
    pub failures: u64,
    pub gear_shifts: u64,
    pub queries_executed: u64,
    pub budget_consumed: u64,
}

impl DriverReport {
    fn record(&mut self, tick: &TickResult) {
        self.ticks += 1;
        self.queries_executed += tick.queries_executed.len() as u64;
        self.budget_consumed += tick.budget_consumed;
        if tick.gear_changed() {
            self.gear_shifts += 1;
        }
    }
}

/// Runs one tick at a time and sleeps for the current gear's interval.
///
/// The interval is re-read after every tick since a tick may shift gears.
pub struct CronDriver {
    group: FailoverGroup,
    gears: GearTable,
    max_ticks: Option<u64>,
}

impl CronDriver {
    pub fn new(group: FailoverGroup, gears: GearTable) -> Self {
        Self {
            group,
            gears,
            max_ticks: None,
        }
    }

    /// Stop after this many tick attempts
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Run until shutdown is signalled or `max_ticks` is reached.
    ///
    /// A failed tick is logged and retried after the current gear's interval.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> DriverReport {
        let mut report = DriverReport::default();
        let mut attempts = 0_u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            attempts += 1;
            match self.group.tick().await {
                Ok(tick) => {
                    report.record(&tick);
                    tracing::info!(
                        job = %self.group.active_job(),
                        gear = %tick.gear_selected,
                        volatility = tick.volatility,
                        queries = tick.queries_executed.len(),
                        remaining = tick.budget_remaining,
                        "Tick complete"
                    );
                }
                Err(e) => {
                    report.failures += 1;
                    tracing::error!(error = %e, "Tick failed, retrying next interval");
                }
            }

            if self.max_ticks.is_some_and(|max| attempts >= max) {
                break;
            }

            let interval = self.next_interval().await;
            tracing::debug!(interval_secs = interval.as_secs(), "Re-arming");

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(ticks = report.ticks, failures = report.failures, "Driver stopped");
        report
    }

    async fn next_interval(&self) -> Duration {
        let gear = self.group.current_gear().await;
        self.gears.profile(gear).interval()
    }
}
