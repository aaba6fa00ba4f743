//! Flywheel controller: one gear decision and query batch per tick

use super::{ControllerError, ControllerState, GearChange, SharedState, TickResult};
use crate::budget::RateLimitTracker;
use crate::config::Config;
use crate::gear::{budget_ratio, sanitize_volatility, Gear, GearTable, GearThresholds};
use crate::monitor::VolatilitySource;
use crate::query::{default_catalog, GreedyScheduler, QueryCatalog, Schedule};
use crate::telemetry::{self, CounterMetric, GaugeMetric, LatencyMetric};
use crate::warehouse::DataSink;
use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;
use uuid::Uuid;

const GEAR_EVENT_CAPACITY: usize = 64;

/// Static controller settings
#[derive(Debug, Clone)]
pub struct FlywheelSettings {
    pub initial_gear: Gear,
    /// Budget assumed until the first tick reads the tracker
    pub rate_limit_budget: u64,
    pub thresholds: GearThresholds,
    pub gears: GearTable,
    pub catalog: QueryCatalog,
}

impl Default for FlywheelSettings {
    fn default() -> Self {
        Self {
            initial_gear: Gear::Medium,
            rate_limit_budget: 1000,
            thresholds: GearThresholds::default(),
            gears: GearTable::default(),
            catalog: default_catalog(),
        }
    }
}

impl FlywheelSettings {
    /// Settings from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_gear: config.controller.initial_gear,
            rate_limit_budget: config.controller.rate_limit_budget,
            thresholds: config.thresholds,
            gears: config.gears.clone(),
            catalog: config.catalog(),
        }
    }
}

/// Adaptive poll-rate controller.
///
/// The state mutex is held for the whole tick, so ticks never overlap and
/// a failed tick leaves the state exactly as it was. Controllers built with
/// [`FlywheelController::with_state`] share one state and take turns.
pub struct FlywheelController<V, R, S> {
    settings: FlywheelSettings,
    volatility: V,
    tracker: R,
    sink: S,
    state: SharedState,
    gear_events: broadcast::Sender<GearChange>,
}

/// Readings and the spend decided from them, before anything is committed
struct Decision {
    volatility: f64,
    window: u64,
    remaining: u64,
    gear: Gear,
    schedule: Schedule,
}

impl<V, R, S> FlywheelController<V, R, S>
where
    V: VolatilitySource,
    R: RateLimitTracker,
    S: DataSink,
{
    /// Create a controller in its initial gear
    pub fn new(settings: FlywheelSettings, volatility: V, tracker: R, sink: S) -> Self {
        let state = ControllerState::new(settings.initial_gear, settings.rate_limit_budget);
        let (gear_events, _) = broadcast::channel(GEAR_EVENT_CAPACITY);
        Self {
            settings,
            volatility,
            tracker,
            sink,
            state: state.shared(),
            gear_events,
        }
    }

    /// Use a state handle shared with other controllers
    pub fn with_state(mut self, state: SharedState) -> Self {
        self.state = state;
        self
    }

    /// Handle to this controller's state
    pub fn shared_state(&self) -> SharedState {
        self.state.clone()
    }

    /// Run one evaluation tick
    pub async fn tick(&self) -> Result<TickResult, ControllerError> {
        self.run(None).await
    }

    /// Run one tick under a deadline.
    ///
    /// Reading collaborators and spending budget must finish within `limit`,
    /// otherwise the tick fails with [`ControllerError::TimedOut`] and nothing
    /// is committed. Once budget is spent the tick always commits; a sink
    /// write still pending at the deadline is abandoned and counted as a sink
    /// error.
    pub async fn tick_within(&self, limit: Duration) -> Result<TickResult, ControllerError> {
        self.run(Some(time::Instant::now() + limit)).await
    }

    async fn run(&self, deadline: Option<time::Instant>) -> Result<TickResult, ControllerError> {
        let started = Instant::now();
        let mut state = self.state.lock().await;

        let result = self.evaluate(&mut state, deadline).await;
        telemetry::record_latency(LatencyMetric::Tick, started.elapsed());

        match &result {
            Ok(tick) => {
                telemetry::increment_counter(CounterMetric::Ticks, 1);
                telemetry::increment_counter(
                    CounterMetric::QueriesExecuted,
                    tick.queries_executed.len() as u64,
                );
                telemetry::set_gauge(
                    GaugeMetric::CurrentGear,
                    f64::from(tick.gear_selected.level()),
                );
                telemetry::set_gauge(GaugeMetric::BudgetRemaining, tick.budget_remaining as f64);
                telemetry::set_gauge(GaugeMetric::Volatility, tick.volatility);
                telemetry::set_gauge(GaugeMetric::BudgetUtilization, tick.utilization());
            }
            Err(e) => {
                telemetry::increment_counter(CounterMetric::TickFailures, 1);
                tracing::warn!(
                    error = %e,
                    gear = %state.current_gear,
                    "Tick failed, state unchanged"
                );
            }
        }

        result
    }

    async fn evaluate(
        &self,
        state: &mut ControllerState,
        deadline: Option<time::Instant>,
    ) -> Result<TickResult, ControllerError> {
        let decision = match deadline {
            Some(deadline) => time::timeout_at(deadline, self.decide())
                .await
                .map_err(|_| ControllerError::TimedOut)??,
            None => self.decide().await?,
        };
        let Decision {
            volatility,
            window,
            remaining,
            gear,
            schedule,
        } = decision;

        // Budget is spent; nothing below can fail. Commit.
        let now = Utc::now();
        let previous_gear = state.current_gear;
        state.apply_usage(window, remaining, schedule.consumed);
        state.volatility_estimate = volatility;
        state.current_gear = gear;
        state.ticks += 1;
        state.last_tick_at = Some(now);

        if gear != previous_gear {
            self.emit_gear_change(GearChange {
                from: previous_gear,
                to: gear,
                volatility,
                budget_ratio: budget_ratio(remaining, window),
                at: now,
            });
        }

        let tick = TickResult {
            tick_id: Uuid::new_v4(),
            timestamp: now,
            gear_selected: gear,
            previous_gear,
            volatility,
            queries_executed: schedule.selected,
            budget_consumed: schedule.consumed,
            budget_remaining: state.rate_limit_remaining(),
            budget_window: window,
        };

        tracing::debug!(
            tick_id = %tick.tick_id,
            gear = %gear,
            volatility,
            queries = tick.queries_executed.len(),
            consumed = tick.budget_consumed,
            remaining = tick.budget_remaining,
            "Tick evaluated"
        );

        self.store(tick.clone(), deadline).await;
        Ok(tick)
    }

    /// Read collaborators, pick a gear and batch, and spend the budget
    async fn decide(&self) -> Result<Decision, ControllerError> {
        let reading = self
            .volatility
            .current_volatility()
            .await
            .map_err(|e| ControllerError::unavailable("volatility source", e))?;
        let window = self
            .tracker
            .budget_window_size()
            .await
            .map_err(|e| ControllerError::unavailable("rate-limit tracker", e))?;
        let remaining = self
            .tracker
            .remaining_budget()
            .await
            .map_err(|e| ControllerError::unavailable("rate-limit tracker", e))?
            .min(window);

        let volatility = sanitize_volatility(reading);
        let gear = self.settings.thresholds.select(volatility, remaining, window);
        let profile = self.settings.gears.profile(gear);
        let catalog = self.settings.catalog.for_gear(gear);
        let schedule =
            GreedyScheduler::with_batch_limit(profile.batch_size).schedule(&catalog, remaining);

        if schedule.consumed > 0 {
            self.tracker
                .consume(schedule.consumed)
                .await
                .map_err(|e| ControllerError::unavailable("rate-limit tracker", e))?;
        }

        Ok(Decision {
            volatility,
            window,
            remaining,
            gear,
            schedule,
        })
    }

    async fn store(&self, tick: TickResult, deadline: Option<time::Instant>) {
        let started = Instant::now();
        let tick_id = tick.tick_id;
        let write = self.sink.store_tick_result(tick);
        let outcome = match deadline {
            Some(deadline) => time::timeout_at(deadline, write)
                .await
                .unwrap_or_else(|_| Err(anyhow::anyhow!("sink write timed out"))),
            None => write.await,
        };

        if let Err(e) = outcome {
            telemetry::increment_counter(CounterMetric::SinkErrors, 1);
            tracing::warn!(error = %e, %tick_id, "Failed to store tick result");
        }
        telemetry::record_latency(LatencyMetric::SinkWrite, started.elapsed());
    }

    fn emit_gear_change(&self, change: GearChange) {
        telemetry::record_gear_shift(change.from, change.to);
        tracing::info!(
            from = %change.from,
            to = %change.to,
            volatility = change.volatility,
            budget_ratio = change.budget_ratio,
            interval_secs = self.settings.gears.profile(change.to).interval_secs,
            "Gear shift"
        );
        // no subscribers is fine
        let _ = self.gear_events.send(change);
    }

    /// Gear the controller is currently in
    pub async fn current_gear(&self) -> Gear {
        self.state.lock().await.current_gear
    }

    /// Manually set the current gear.
    ///
    /// Takes effect for scheduling immediately; the next tick re-evaluates.
    pub async fn force_gear(&self, gear: Gear) {
        let mut state = self.state.lock().await;
        let previous = state.current_gear;
        state.current_gear = gear;
        tracing::warn!(from = %previous, to = %gear, "Gear forced");

        if gear != previous {
            self.emit_gear_change(GearChange {
                from: previous,
                to: gear,
                volatility: state.volatility_estimate,
                budget_ratio: budget_ratio(state.rate_limit_remaining(), state.rate_limit_budget),
                at: Utc::now(),
            });
        }
    }

    /// Snapshot of the controller state
    pub async fn state(&self) -> ControllerState {
        self.state.lock().await.clone()
    }

    /// Receive gear-change events
    pub fn subscribe(&self) -> broadcast::Receiver<GearChange> {
        self.gear_events.subscribe()
    }

    pub fn settings(&self) -> &FlywheelSettings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
