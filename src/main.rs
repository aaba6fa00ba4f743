use clap::Parser;
use flywheel::cli::{Cli, Commands};
use flywheel::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    flywheel::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting flywheel");
            args.execute(&config).await?;
        }
        Commands::Replay(args) => {
            tracing::info!("Starting scenario replay");
            args.execute(&config).await?;
        }
        Commands::Gears(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Controller: initial={}, budget={} per {}s",
                config.controller.initial_gear,
                config.controller.rate_limit_budget,
                config.controller.budget_window_secs
            );
            println!(
                "  Thresholds: floor={}, medium={}, high={}, veryhigh={}, emergency={}",
                config.thresholds.budget_floor,
                config.thresholds.medium,
                config.thresholds.high,
                config.thresholds.veryhigh,
                config.thresholds.emergency
            );
            println!("  Queries: {}", config.catalog().len());
            println!(
                "  Failover: {:?} (timeout {}s)",
                config.failover.jobs, config.failover.tick_timeout_secs
            );
            println!(
                "  Warehouse: {} -> {:?}",
                if config.warehouse.enabled { "on" } else { "off" },
                config.warehouse.output_dir
            );
        }
    }

    Ok(())
}
