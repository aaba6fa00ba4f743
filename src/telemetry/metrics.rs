//! Prometheus metrics

use crate::gear::Gear;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Full controller tick
    Tick,
    /// Data sink write
    SinkWrite,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Current gear level (1-5)
    CurrentGear,
    /// Rate-limit units left in the window
    BudgetRemaining,
    /// Last volatility reading
    Volatility,
    /// Units spent by the last tick as a fraction of what was available
    BudgetUtilization,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Completed ticks
    Ticks,
    /// Ticks failed on an unavailable collaborator
    TickFailures,
    /// Queries selected for execution
    QueriesExecuted,
    /// Data sink write failures
    SinkErrors,
    /// Standby promotions
    Failovers,
}

fn latency_name(metric: LatencyMetric) -> &'static str {
    match metric {
        LatencyMetric::Tick => "flywheel_tick_latency_ms",
        LatencyMetric::SinkWrite => "flywheel_sink_write_latency_ms",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::CurrentGear => "flywheel_current_gear",
        GaugeMetric::BudgetRemaining => "flywheel_budget_remaining",
        GaugeMetric::Volatility => "flywheel_volatility",
        GaugeMetric::BudgetUtilization => "flywheel_budget_utilization",
    }
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::Ticks => "flywheel_ticks_total",
        CounterMetric::TickFailures => "flywheel_tick_failures_total",
        CounterMetric::QueriesExecuted => "flywheel_queries_executed_total",
        CounterMetric::SinkErrors => "flywheel_sink_errors_total",
        CounterMetric::Failovers => "flywheel_failovers_total",
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    metrics::histogram!(latency_name(metric)).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}

/// Increment a counter
pub fn increment_counter(metric: CounterMetric, value: u64) {
    metrics::counter!(counter_name(metric)).increment(value);
}

/// Count a gear shift, labelled by direction
pub fn record_gear_shift(from: Gear, to: Gear) {
    metrics::counter!(
        "flywheel_gear_shifts_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

/// Install the Prometheus exporter with an HTTP listener on the given port
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
