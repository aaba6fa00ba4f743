//! Run command implementation

use super::{load_prices, Scenario};
use crate::budget::BudgetWindow;
use crate::config::Config;
use crate::controller::{ControllerState, FlywheelController, FlywheelSettings};
use crate::cron::{CronDriver, CronJob, FailoverGroup};
use crate::monitor::{RollingVolatility, ScriptedVolatility, VolatilitySource};
use crate::warehouse::{DataSink, NullSink, ParquetWarehouse};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario JSON file cycled as the volatility feed; built-in when omitted.
    /// Step `rate_limit_remaining` values are ignored: the budget window is live
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// JSON price history (`[{"timestamp", "price"}]`) seeding the rolling
    /// volatility estimator instead of a scenario
    #[arg(long, conflicts_with = "scenario")]
    pub prices: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long)]
    pub max_ticks: Option<u64>,

    /// Skip the Parquet warehouse even if enabled in config
    #[arg(long)]
    pub no_warehouse: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let volatility = self.volatility_source(config).await?;

        let budget = BudgetWindow::new(config.controller.rate_limit_budget);
        let reset_task = budget.spawn_reset_task(config.controller.budget_window());

        let warehouse = (config.warehouse.enabled && !self.no_warehouse)
            .then(|| Arc::new(ParquetWarehouse::new(&config.warehouse)));
        let sink: Arc<dyn DataSink> = match &warehouse {
            Some(w) => w.clone() as Arc<dyn DataSink>,
            None => Arc::new(NullSink),
        };

        // every job shares the state, budget and sink; only the active one ticks
        let settings = FlywheelSettings::from_config(config);
        let state =
            ControllerState::new(settings.initial_gear, settings.rate_limit_budget).shared();
        let jobs = config
            .failover
            .jobs
            .iter()
            .map(|name| {
                let controller = FlywheelController::new(
                    settings.clone(),
                    volatility.clone(),
                    budget.clone(),
                    sink.clone(),
                )
                .with_state(state.clone());
                CronJob::new(name.clone(), Arc::new(controller))
            })
            .collect();
        let group = FailoverGroup::new(jobs, config.failover.tick_timeout())?
            .with_reinstate_after(config.failover.reinstate_after());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
        });

        tracing::info!(
            jobs = ?config.failover.jobs,
            budget = config.controller.rate_limit_budget,
            initial_gear = %settings.initial_gear,
            "Flywheel running"
        );

        let mut driver = CronDriver::new(group, config.gears.clone());
        if let Some(max_ticks) = self.max_ticks {
            driver = driver.with_max_ticks(max_ticks);
        }
        let report = driver.run(shutdown_rx).await;
        reset_task.abort();

        if let Some(warehouse) = warehouse {
            let stats = warehouse.close().await?;
            tracing::info!(
                records = stats.records_written,
                files = stats.files_written,
                "Warehouse closed"
            );
        }

        println!("Ticks:           {}", report.ticks);
        println!("Failures:        {}", report.failures);
        println!("Gear shifts:     {}", report.gear_shifts);
        println!("Queries run:     {}", report.queries_executed);
        println!("Budget consumed: {}", report.budget_consumed);

        Ok(())
    }

    async fn volatility_source(
        &self,
        config: &Config,
    ) -> anyhow::Result<Arc<dyn VolatilitySource>> {
        if let Some(path) = &self.prices {
            let source = RollingVolatility::from_config(&config.volatility);
            let prices = load_prices(path)?;
            tracing::info!(prices = prices.len(), "Seeding rolling volatility");
            for point in prices {
                source.observe(point.timestamp, point.price).await;
            }
            return Ok(Arc::new(source));
        }

        let scenario = match &self.scenario {
            Some(path) => Scenario::load(path)?,
            None => Scenario::builtin(),
        };
        Ok(Arc::new(ScriptedVolatility::cycling(scenario.volatilities())))
    }
}
