//! flywheel: Adaptive poll-rate controller for market-data collection
//!
//! This library provides the core components for:
//! - Gear selection from volatility and rate-limit pressure
//! - Greedy query scheduling within the remaining budget
//! - The controller tick loop and its state
//! - Volatility sources and rate-limit budget tracking
//! - Active/standby failover and interval-driven ticking
//! - ML warehouse records written to Parquet
//! - Logging and Prometheus metrics

pub mod budget;
pub mod cli;
pub mod config;
pub mod controller;
pub mod cron;
pub mod gear;
pub mod monitor;
pub mod query;
pub mod telemetry;
pub mod warehouse;
