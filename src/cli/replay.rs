//! Replay command implementation

use super::Scenario;
use crate::budget::BudgetWindow;
use crate::config::{Config, WarehouseConfig};
use crate::controller::{FlywheelController, FlywheelSettings, TickResult};
use crate::monitor::ScriptedVolatility;
use crate::warehouse::{DataSink, NullSink, ParquetWarehouse};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Scenario JSON file; the built-in scenario is used when omitted
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Write warehouse records to Parquet in this directory
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output format: json or table
    #[arg(long, default_value = "table")]
    pub format: String,
}

impl ReplayArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let scenario = match &self.scenario {
            Some(path) => Scenario::load(path)?,
            None => Scenario::builtin(),
        };
        tracing::info!(steps = scenario.len(), "Replaying scenario");

        let settings = FlywheelSettings::from_config(config);
        let warehouse = self.output.as_ref().map(|dir| {
            Arc::new(ParquetWarehouse::new(&WarehouseConfig {
                output_dir: dir.clone(),
                ..config.warehouse.clone()
            }))
        });
        let sink: Arc<dyn DataSink> = match &warehouse {
            Some(w) => w.clone() as Arc<dyn DataSink>,
            None => Arc::new(NullSink),
        };

        let ticks = replay_scenario(settings, &scenario, sink).await?;

        if self.format == "json" {
            for tick in &ticks {
                println!("{}", serde_json::to_string(tick)?);
            }
        } else {
            print_table(&ticks);
        }

        if let Some(warehouse) = warehouse {
            let stats = warehouse.close().await?;
            println!(
                "\nWrote {} records in {} files to {:?}",
                stats.records_written,
                stats.files_written,
                warehouse.output_dir()
            );
        }

        Ok(())
    }
}

/// Tick once per scenario step with no wait between ticks.
///
/// Steps carrying `rate_limit_remaining` reset the tracker to that value
/// before their tick.
pub async fn replay_scenario<S: DataSink>(
    settings: FlywheelSettings,
    scenario: &Scenario,
    sink: S,
) -> anyhow::Result<Vec<TickResult>> {
    let budget = BudgetWindow::new(settings.rate_limit_budget);
    let controller = FlywheelController::new(
        settings,
        ScriptedVolatility::new(scenario.volatilities()),
        budget.clone(),
        sink,
    );

    let mut ticks = Vec::with_capacity(scenario.len());
    for step in &scenario.steps {
        if let Some(remaining) = step.rate_limit_remaining {
            budget.set_remaining(remaining).await;
        }
        ticks.push(controller.tick().await?);
    }
    Ok(ticks)
}

fn print_table(ticks: &[TickResult]) {
    println!(
        "{:>4} {:>10} {:<10} {:>7} {:>8} {:>9}  shift",
        "tick", "volatility", "gear", "queries", "consumed", "remaining"
    );
    for (i, tick) in ticks.iter().enumerate() {
        let shift = if tick.gear_changed() {
            format!("{} -> {}", tick.previous_gear, tick.gear_selected)
        } else {
            String::new()
        };
        println!(
            "{:>4} {:>10.4} {:<10} {:>7} {:>8} {:>9}  {}",
            i + 1,
            tick.volatility,
            tick.gear_selected.as_str(),
            tick.queries_executed.len(),
            tick.budget_consumed,
            tick.budget_remaining,
            shift
        );
    }
}
