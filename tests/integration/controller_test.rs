//! Integration tests for the controller tick loop

use async_trait::async_trait;
use chrono::{Duration, Utc};
use flywheel::budget::{BudgetWindow, RateLimitTracker};
use flywheel::config::VolatilityConfig;
use flywheel::controller::{ControllerError, FlywheelController, FlywheelSettings};
use flywheel::gear::Gear;
use flywheel::monitor::{RollingVolatility, ScriptedVolatility};
use flywheel::query::{Query, QueryCatalog};
use flywheel::warehouse::{MemoryWarehouse, NullSink};
use rust_decimal_macros::dec;

struct BrokenTracker;

#[async_trait]
impl RateLimitTracker for BrokenTracker {
    async fn remaining_budget(&self) -> anyhow::Result<u64> {
        anyhow::bail!("rate-limit endpoint returned 503")
    }

    async fn budget_window_size(&self) -> anyhow::Result<u64> {
        Ok(1000)
    }

    async fn consume(&self, _units: u64) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_budget_floor_overrides_volatility() {
    let budget = BudgetWindow::new(1000);
    let controller = FlywheelController::new(
        FlywheelSettings::default(),
        ScriptedVolatility::new([Some(0.25), Some(0.25)]),
        budget.clone(),
        NullSink,
    );

    budget.set_remaining(900).await;
    let tick = controller.tick().await.unwrap();
    assert_eq!(tick.gear_selected, Gear::VeryHigh);

    budget.set_remaining(150).await;
    let tick = controller.tick().await.unwrap();
    assert_eq!(tick.gear_selected, Gear::Low);
    assert_eq!(controller.current_gear().await, Gear::Low);
}

#[tokio::test]
async fn test_budget_drains_across_ticks() {
    let settings = FlywheelSettings {
        rate_limit_budget: 20,
        ..FlywheelSettings::default()
    };
    let controller = FlywheelController::new(
        settings,
        ScriptedVolatility::cycling([Some(0.12)]),
        BudgetWindow::new(20),
        NullSink,
    );

    let mut gears = Vec::new();
    let mut consumed = Vec::new();
    for _ in 0..3 {
        let tick = controller.tick().await.unwrap();
        gears.push(tick.gear_selected);
        consumed.push(tick.budget_consumed);
    }

    // 20 -> 4 left (ratio exactly 0.20 keeps medium) -> 0 left forces low
    assert_eq!(gears, vec![Gear::Medium, Gear::Medium, Gear::Low]);
    assert_eq!(consumed, vec![16, 4, 0]);

    let state = controller.state().await;
    assert_eq!(state.rate_limit_used, 20);
    assert_eq!(state.rate_limit_remaining(), 0);
    assert_eq!(state.ticks, 3);
}

#[tokio::test]
async fn test_rolling_volatility_drives_gear() {
    let source = RollingVolatility::from_config(&VolatilityConfig::default());
    let controller = FlywheelController::new(
        FlywheelSettings::default(),
        source.clone(),
        BudgetWindow::new(1000),
        NullSink,
    );

    // no prices yet reads as zero volatility
    let tick = controller.tick().await.unwrap();
    assert_eq!(tick.volatility, 0.0);
    assert_eq!(tick.gear_selected, Gear::Low);

    let now = Utc::now();
    source.observe(now - Duration::minutes(1), dec!(100)).await;
    source.observe(now, dec!(120)).await;

    // ln(1.2) ~ 0.182
    let tick = controller.tick().await.unwrap();
    assert!((tick.volatility - 1.2_f64.ln()).abs() < 1e-9);
    assert_eq!(tick.gear_selected, Gear::High);
}

#[tokio::test]
async fn test_gear_changes_are_broadcast() {
    let controller = FlywheelController::new(
        FlywheelSettings::default(),
        ScriptedVolatility::new([Some(0.32), Some(0.32), Some(0.05)]),
        BudgetWindow::new(1000),
        NullSink,
    );
    let mut events = controller.subscribe();

    controller.tick().await.unwrap();
    controller.tick().await.unwrap();
    controller.tick().await.unwrap();

    let up = events.recv().await.unwrap();
    assert_eq!((up.from, up.to), (Gear::Medium, Gear::Emergency));
    assert!(up.is_upshift());

    // the repeated emergency tick emits nothing
    let down = events.recv().await.unwrap();
    assert_eq!((down.from, down.to), (Gear::Emergency, Gear::Low));
    assert!(!down.is_upshift());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_tracker_failure_leaves_state_untouched() {
    let controller = FlywheelController::new(
        FlywheelSettings::default(),
        ScriptedVolatility::new([Some(0.32)]),
        BrokenTracker,
        NullSink,
    );
    let before = controller.state().await;

    let err = controller.tick().await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::SourceUnavailable {
            source_name: "rate-limit tracker",
            ..
        }
    ));
    assert!(err.to_string().contains("503"));
    assert_eq!(controller.state().await, before);
}

#[tokio::test]
async fn test_empty_catalog_still_selects_gear() {
    let settings = FlywheelSettings {
        catalog: QueryCatalog::new(vec![]),
        ..FlywheelSettings::default()
    };
    let warehouse = MemoryWarehouse::default();
    let controller = FlywheelController::new(
        settings,
        ScriptedVolatility::new([Some(0.18)]),
        BudgetWindow::new(1000),
        warehouse.clone(),
    );

    let tick = controller.tick().await.unwrap();
    assert_eq!(tick.gear_selected, Gear::High);
    assert!(tick.queries_executed.is_empty());
    assert_eq!(tick.budget_consumed, 0);
    assert_eq!(tick.budget_remaining, 1000);

    let records = warehouse.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].queries_executed, 0);
    assert_eq!(records[0].query_names, "");
}

#[tokio::test]
async fn test_gear_restricted_queries() {
    let settings = FlywheelSettings {
        catalog: QueryCatalog::new(vec![
            Query::new("fast_poll", 1, 1),
            Query::new("deep_scan", 1, 2).only_in(&[Gear::Low]),
        ]),
        ..FlywheelSettings::default()
    };
    let controller = FlywheelController::new(
        settings,
        ScriptedVolatility::new([Some(0.05), Some(0.32)]),
        BudgetWindow::new(1000),
        NullSink,
    );

    let low = controller.tick().await.unwrap();
    let names: Vec<&str> = low.queries_executed.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(names, vec!["fast_poll", "deep_scan"]);

    let emergency = controller.tick().await.unwrap();
    let names: Vec<&str> = emergency
        .queries_executed
        .iter()
        .map(|q| q.name.as_str())
        .collect();
    assert_eq!(names, vec!["fast_poll"]);
}
