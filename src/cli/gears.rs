//! Gears command implementation

use crate::config::Config;
use crate::gear::Gear;
use clap::Args;

#[derive(Args, Debug)]
pub struct GearsArgs {
    /// Output format: json or table
    #[arg(long, default_value = "table")]
    pub format: String,
}

impl GearsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let thresholds = &config.thresholds;

        if self.format == "json" {
            let value = serde_json::json!({
                "gears": config.gears,
                "thresholds": thresholds,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        println!(
            "{:<10} {:>6} {:>10} {:>7} {:>8}  selected when",
            "gear", "level", "interval", "batch", "workers"
        );
        for gear in Gear::ALL {
            let profile = config.gears.profile(gear);
            let condition = match gear {
                Gear::Low => format!(
                    "volatility <= {} or budget < {:.0}%",
                    thresholds.medium,
                    thresholds.budget_floor * 100.0
                ),
                Gear::Medium => format!("volatility > {}", thresholds.medium),
                Gear::High => format!("volatility > {}", thresholds.high),
                Gear::VeryHigh => format!("volatility > {}", thresholds.veryhigh),
                Gear::Emergency => format!("volatility > {}", thresholds.emergency),
            };
            println!(
                "{:<10} {:>6} {:>9}s {:>7} {:>8}  {}",
                gear.as_str(),
                gear.level(),
                profile.interval_secs,
                profile.batch_size,
                profile.parallel_workers,
                condition
            );
        }
        Ok(())
    }
}
