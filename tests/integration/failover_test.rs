//! Integration tests for active/standby failover with real controllers

use async_trait::async_trait;
use flywheel::budget::BudgetWindow;
use flywheel::controller::{ControllerState, FlywheelController, FlywheelSettings, TickResult};
use flywheel::cron::{CronDriver, CronJob, FailoverGroup, JobStatus};
use flywheel::gear::{Gear, GearTable};
use flywheel::monitor::{ScriptedVolatility, VolatilitySource};
use flywheel::warehouse::{DataSink, MemoryWarehouse, NullSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Volatility source that can be switched off
struct FlakySource {
    down: AtomicBool,
    reading: f64,
}

impl FlakySource {
    fn new(reading: f64, down: bool) -> Arc<Self> {
        Arc::new(Self {
            down: AtomicBool::new(down),
            reading,
        })
    }
}

#[async_trait]
impl VolatilitySource for FlakySource {
    async fn current_volatility(&self) -> anyhow::Result<Option<f64>> {
        if self.down.load(Ordering::SeqCst) {
            anyhow::bail!("market data feed disconnected");
        }
        Ok(Some(self.reading))
    }
}

/// Volatility source that never answers in time
struct StalledSource;

#[async_trait]
impl VolatilitySource for StalledSource {
    async fn current_volatility(&self) -> anyhow::Result<Option<f64>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Some(0.32))
    }
}

/// Sink that takes far longer than a tick is allowed
struct StalledSink;

#[async_trait]
impl DataSink for StalledSink {
    async fn store_tick_result(&self, _tick: TickResult) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

fn job(
    name: &str,
    source: Arc<FlakySource>,
    budget: &BudgetWindow,
    warehouse: &MemoryWarehouse,
) -> CronJob {
    let controller = FlywheelController::new(
        FlywheelSettings::default(),
        source,
        budget.clone(),
        warehouse.clone(),
    );
    CronJob::new(name, Arc::new(controller))
}

#[tokio::test]
async fn test_standby_takes_over_same_tick() {
    let budget = BudgetWindow::new(1000);
    let warehouse = MemoryWarehouse::default();
    let primary = FlakySource::new(0.32, true);
    let standby = FlakySource::new(0.18, false);

    let mut group = FailoverGroup::new(
        vec![
            job("primary", primary.clone(), &budget, &warehouse),
            job("standby", standby, &budget, &warehouse),
        ],
        Duration::from_secs(5),
    )
    .unwrap();

    let tick = group.tick().await.unwrap();
    assert_eq!(tick.gear_selected, Gear::High);
    assert_eq!(group.active_job(), "standby");

    // the failed primary spent nothing; only the standby's tick is charged
    assert_eq!(budget.usage().await.used, tick.budget_consumed);
    assert_eq!(warehouse.len().await, 1);

    primary.down.store(false, Ordering::SeqCst);
    tokio_test::assert_ok!(group.reinstate("primary"));
    tokio_test::assert_err!(group.reinstate("backup"));
    assert_eq!(
        group.statuses(),
        vec![
            ("primary".to_string(), JobStatus::Standby),
            ("standby".to_string(), JobStatus::Active),
        ]
    );
}

#[tokio::test]
async fn test_fallback_follows_priority_order() {
    let budget = BudgetWindow::new(1000);
    let warehouse = MemoryWarehouse::default();

    let mut group = FailoverGroup::new(
        vec![
            job("veryhigh", FlakySource::new(0.25, true), &budget, &warehouse),
            job("high", FlakySource::new(0.18, true), &budget, &warehouse),
            job("medium", FlakySource::new(0.12, false), &budget, &warehouse),
            job("low", FlakySource::new(0.05, false), &budget, &warehouse),
        ],
        Duration::from_secs(5),
    )
    .unwrap();

    let tick = group.tick().await.unwrap();
    assert_eq!(group.active_job(), "medium");
    assert_eq!(tick.gear_selected, Gear::Medium);

    let statuses: Vec<JobStatus> = group.statuses().into_iter().map(|(_, s)| s).collect();
    assert_eq!(
        statuses,
        vec![
            JobStatus::Failed,
            JobStatus::Failed,
            JobStatus::Active,
            JobStatus::Standby,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_driver_keeps_ticking_after_failover() {
    let budget = BudgetWindow::new(1000);
    let warehouse = MemoryWarehouse::default();
    let controller = FlywheelController::new(
        FlywheelSettings::default(),
        ScriptedVolatility::cycling([Some(0.32)]),
        budget.clone(),
        warehouse.clone(),
    );

    let group = FailoverGroup::new(
        vec![
            job("primary", FlakySource::new(0.32, true), &budget, &warehouse),
            CronJob::new("standby", Arc::new(controller)),
        ],
        Duration::from_secs(5),
    )
    .unwrap();

    let (_tx, rx) = watch::channel(false);
    let started = tokio::time::Instant::now();
    let report = CronDriver::new(group, GearTable::default())
        .with_max_ticks(3)
        .run(rx)
        .await;

    assert_eq!(report.ticks, 3);
    assert_eq!(report.failures, 0);
    // two emergency intervals between three ticks
    assert_eq!(started.elapsed(), Duration::from_secs(30));
    assert_eq!(warehouse.len().await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_slow_sink_spends_budget_once() {
    let budget = BudgetWindow::new(1000);
    let primary = FlywheelController::new(
        FlywheelSettings::default(),
        FlakySource::new(0.32, false),
        budget.clone(),
        StalledSink,
    );
    let standby = FlywheelController::new(
        FlywheelSettings::default(),
        FlakySource::new(0.32, false),
        budget.clone(),
        NullSink,
    );
    let mut group = FailoverGroup::new(
        vec![
            CronJob::new("primary", Arc::new(primary)),
            CronJob::new("standby", Arc::new(standby)),
        ],
        Duration::from_secs(5),
    )
    .unwrap();

    let tick = group.tick().await.unwrap();

    // the spend was committed, so the primary keeps the tick
    assert_eq!(group.active_job(), "primary");
    assert_eq!(tick.budget_consumed, 11);
    assert_eq!(budget.usage().await.used, tick.budget_consumed);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_source_fails_over_without_spending() {
    let budget = BudgetWindow::new(1000);
    let primary = FlywheelController::new(
        FlywheelSettings::default(),
        StalledSource,
        budget.clone(),
        NullSink,
    );
    let standby = FlywheelController::new(
        FlywheelSettings::default(),
        FlakySource::new(0.32, false),
        budget.clone(),
        NullSink,
    );
    let mut group = FailoverGroup::new(
        vec![
            CronJob::new("primary", Arc::new(primary)),
            CronJob::new("standby", Arc::new(standby)),
        ],
        Duration::from_secs(5),
    )
    .unwrap();

    let tick = group.tick().await.unwrap();

    assert_eq!(group.active_job(), "standby");
    assert_eq!(budget.usage().await.used, tick.budget_consumed);
}

#[tokio::test]
async fn test_promoted_standby_continues_shared_state() {
    let budget = BudgetWindow::new(1000);
    let state = ControllerState::new(Gear::Medium, 1000).shared();
    // the primary has one reading, then its source runs dry
    let primary = FlywheelController::new(
        FlywheelSettings::default(),
        ScriptedVolatility::new([Some(0.32)]),
        budget.clone(),
        NullSink,
    )
    .with_state(state.clone());
    let standby = FlywheelController::new(
        FlywheelSettings::default(),
        ScriptedVolatility::cycling([Some(0.32)]),
        budget.clone(),
        NullSink,
    )
    .with_state(state.clone());
    let mut group = FailoverGroup::new(
        vec![
            CronJob::new("primary", Arc::new(primary)),
            CronJob::new("standby", Arc::new(standby)),
        ],
        Duration::from_secs(5),
    )
    .unwrap();

    let first = group.tick().await.unwrap();
    assert_eq!(first.previous_gear, Gear::Medium);
    assert_eq!(first.gear_selected, Gear::Emergency);

    let second = group.tick().await.unwrap();
    assert_eq!(group.active_job(), "standby");
    assert_eq!(second.previous_gear, Gear::Emergency);
    assert!(!second.gear_changed());
    assert_eq!(state.lock().await.ticks, 2);
}
