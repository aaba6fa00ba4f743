//! CLI interface for flywheel
//!
//! Provides subcommands for:
//! - `run`: Drive the controller on gear intervals with failover
//! - `replay`: Tick through a scenario back-to-back
//! - `gears`: Show the gear table and thresholds
//! - `config`: Show configuration

mod gears;
mod replay;
mod run;
mod scenario;

pub use gears::GearsArgs;
pub use replay::{replay_scenario, ReplayArgs};
pub use run::RunArgs;
pub use scenario::{load_prices, PricePoint, Scenario, ScenarioStep};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "flywheel")]
#[command(about = "Adaptive poll-rate controller for market-data collection")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the controller on gear intervals
    Run(RunArgs),
    /// Replay a volatility/budget scenario without waiting
    Replay(ReplayArgs),
    /// Show gear profiles and thresholds
    Gears(GearsArgs),
    /// Show configuration
    Config,
}
