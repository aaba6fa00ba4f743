//! Gear types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Polling frequency level, ordered from slowest to fastest
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Gear {
    /// Hourly polling, large batches
    Low,
    /// Normal market conditions
    #[default]
    Medium,
    /// Elevated volatility
    High,
    /// Strongly elevated volatility
    VeryHigh,
    /// Market stress
    Emergency,
}

impl Gear {
    /// All gears in ascending order
    pub const ALL: [Gear; 5] = [
        Gear::Low,
        Gear::Medium,
        Gear::High,
        Gear::VeryHigh,
        Gear::Emergency,
    ];

    /// Lowercase name used in config files and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Gear::Low => "low",
            Gear::Medium => "medium",
            Gear::High => "high",
            Gear::VeryHigh => "veryhigh",
            Gear::Emergency => "emergency",
        }
    }

    /// Numeric gear level, 1 (low) through 5 (emergency)
    pub fn level(&self) -> u8 {
        match self {
            Gear::Low => 1,
            Gear::Medium => 2,
            Gear::High => 3,
            Gear::VeryHigh => 4,
            Gear::Emergency => 5,
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown gear name
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown gear: {0}")]
pub struct ParseGearError(pub String);

impl FromStr for Gear {
    type Err = ParseGearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Gear::Low),
            "medium" => Ok(Gear::Medium),
            "high" => Ok(Gear::High),
            "veryhigh" | "very_high" => Ok(Gear::VeryHigh),
            "emergency" => Ok(Gear::Emergency),
            _ => Err(ParseGearError(s.to_string())),
        }
    }
}

/// Fixed polling parameters attached to a gear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GearProfile {
    /// Seconds between ticks while in this gear
    pub interval_secs: u64,
    /// Maximum queries executed per tick
    pub batch_size: usize,
    /// Worker count the collector may fan out to
    pub parallel_workers: usize,
}

impl GearProfile {
    /// Create a new gear profile
    pub const fn new(interval_secs: u64, batch_size: usize, parallel_workers: usize) -> Self {
        Self {
            interval_secs,
            batch_size,
            parallel_workers,
        }
    }

    /// Tick interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Profiles for every gear
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GearTable {
    pub low: GearProfile,
    pub medium: GearProfile,
    pub high: GearProfile,
    pub veryhigh: GearProfile,
    pub emergency: GearProfile,
}

impl Default for GearTable {
    fn default() -> Self {
        Self {
            low: GearProfile::new(3600, 200, 4),
            medium: GearProfile::new(300, 100, 8),
            high: GearProfile::new(60, 50, 16),
            veryhigh: GearProfile::new(30, 25, 24),
            emergency: GearProfile::new(15, 10, 32),
        }
    }
}

impl GearTable {
    /// Look up the profile for a gear
    pub fn profile(&self, gear: Gear) -> &GearProfile {
        match gear {
            Gear::Low => &self.low,
            Gear::Medium => &self.medium,
            Gear::High => &self.high,
            Gear::VeryHigh => &self.veryhigh,
            Gear::Emergency => &self.emergency,
        }
    }

    /// Check that intervals shrink as gears rise
    pub fn validate(&self) -> anyhow::Result<()> {
        for pair in Gear::ALL.windows(2) {
            let (lower, higher) = (self.profile(pair[0]), self.profile(pair[1]));
            if higher.interval_secs > lower.interval_secs {
                anyhow::bail!(
                    "Gear {} interval ({}s) is longer than gear {} interval ({}s)",
                    pair[1],
                    higher.interval_secs,
                    pair[0],
                    lower.interval_secs
                );
            }
        }
        for gear in Gear::ALL {
            let profile = self.profile(gear);
            if profile.interval_secs == 0 {
                anyhow::bail!("Gear {} has a zero interval", gear);
            }
            if profile.batch_size == 0 {
                anyhow::bail!("Gear {} has a zero batch size", gear);
            }
        }
        Ok(())
    }
}
