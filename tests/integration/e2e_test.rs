//! End-to-end integration tests

use flywheel::cli::{replay_scenario, Scenario, ScenarioStep};
use flywheel::config::{Config, WarehouseConfig};
use flywheel::controller::FlywheelSettings;
use flywheel::warehouse::{list_record_files, ParquetRecordReader, ParquetWarehouse};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_config_example_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = Config::load(path).unwrap();

    assert_eq!(config.controller.rate_limit_budget, 1000);
    assert_eq!(config.catalog().len(), 5);
    assert_eq!(config.failover.jobs, vec!["primary", "standby"]);
    assert_eq!(config.gears.emergency.interval_secs, 15);
}

#[tokio::test]
async fn test_replay_into_parquet_warehouse() {
    let dir = TempDir::new().unwrap();
    let warehouse = Arc::new(ParquetWarehouse::new(&WarehouseConfig {
        output_dir: dir.path().to_path_buf(),
        buffer_size: 3,
        rolling_window: 2,
        ..WarehouseConfig::default()
    }));

    let scenario = Scenario::builtin();
    let ticks = replay_scenario(FlywheelSettings::default(), &scenario, warehouse.clone())
        .await
        .unwrap();

    let stats = warehouse.close().await.unwrap();
    assert_eq!(stats.records_received, scenario.len() as u64);
    assert_eq!(stats.records_written, scenario.len() as u64);
    // 8 records in batches of 3
    assert_eq!(stats.files_written, 3);

    let mut records = Vec::new();
    for path in list_record_files(dir.path()).unwrap() {
        records.extend(ParquetRecordReader::new(path).read_records().unwrap());
    }
    assert_eq!(records.len(), ticks.len());

    for (record, tick) in records.iter().zip(&ticks) {
        assert_eq!(record.tick_id, tick.tick_id.to_string());
        assert_eq!(record.gear, tick.gear_selected.as_str());
        assert_eq!(record.gear_changed, tick.gear_changed());
        assert_eq!(record.budget_consumed, tick.budget_consumed);
    }

    // rolling average over the last two readings
    let expected = (ticks[0].volatility + ticks[1].volatility) / 2.0;
    assert!((records[1].volatility_rolling_avg - expected).abs() < 1e-12);
}

#[tokio::test]
async fn test_closed_warehouse_does_not_fail_ticks() {
    let dir = TempDir::new().unwrap();
    let warehouse = Arc::new(ParquetWarehouse::new(&WarehouseConfig {
        output_dir: dir.path().to_path_buf(),
        ..WarehouseConfig::default()
    }));
    warehouse.close().await.unwrap();

    let scenario = Scenario {
        steps: vec![ScenarioStep::new(0.12), ScenarioStep::new(0.32)],
    };
    let ticks = replay_scenario(FlywheelSettings::default(), &scenario, warehouse.clone())
        .await
        .unwrap();

    assert_eq!(ticks.len(), 2);
    assert!(list_record_files(dir.path()).unwrap().is_empty());
}
