//! Parquet-backed warehouse with buffered background writes

use super::{DataSink, FeatureBuilder, WarehouseRecord};
use crate::config::WarehouseConfig;
use crate::controller::TickResult;
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, StringArray, TimestampMicrosecondArray,
    UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

const FILE_PREFIX: &str = "ticks";

/// Warehouse record schema
pub fn record_schema() -> Schema {
    Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("tick_id", DataType::Utf8, false),
        Field::new("gear", DataType::Utf8, false),
        Field::new("gear_level", DataType::UInt8, false),
        Field::new("previous_gear", DataType::Utf8, false),
        Field::new("gear_changed", DataType::Boolean, false),
        Field::new("volatility", DataType::Float64, false),
        Field::new("volatility_rolling_avg", DataType::Float64, false),
        Field::new("rate_limit_remaining", DataType::UInt64, false),
        Field::new("rate_limit_budget", DataType::UInt64, false),
        Field::new("rate_limit_pressure", DataType::Float64, false),
        Field::new("budget_consumed", DataType::UInt64, false),
        Field::new("budget_utilization", DataType::Float64, false),
        Field::new("queries_executed", DataType::UInt32, false),
        Field::new("query_names", DataType::Utf8, false),
        Field::new("hour_of_day", DataType::UInt32, false),
        Field::new("day_of_week", DataType::UInt32, false),
    ])
}

/// Parquet file writer with time-based rotation
pub struct ParquetWriter {
    output_dir: PathBuf,
    rotation_interval: Duration,
    current_file_start: Option<DateTime<Utc>>,
    sequence: u32,
}

impl ParquetWriter {
    /// Create a new Parquet writer
    pub fn new(output_dir: PathBuf, rotation_interval_secs: u64) -> Self {
        Self {
            output_dir,
            rotation_interval: Duration::seconds(rotation_interval_secs as i64),
            current_file_start: None,
            sequence: 0,
        }
    }

    /// Check if rotation is needed based on current time
    pub fn needs_rotation(&self, now: DateTime<Utc>) -> bool {
        match self.current_file_start {
            None => true,
            Some(start) => now - start >= self.rotation_interval,
        }
    }

    /// Start a new rotation period
    pub fn mark_rotation(&mut self, timestamp: DateTime<Utc>) {
        self.current_file_start = Some(timestamp);
        self.sequence = 0;
    }

    /// Path for the next flush within the current rotation period
    pub fn next_path(&mut self, now: DateTime<Utc>) -> PathBuf {
        if self.needs_rotation(now) {
            self.mark_rotation(now);
        }
        let start = self.current_file_start.unwrap_or(now);
        self.sequence += 1;
        self.output_dir.join(format!(
            "{}_{}_{:04}.parquet",
            FILE_PREFIX,
            start.format("%Y%m%d_%H%M%S"),
            self.sequence
        ))
    }

    /// Write warehouse records to a Parquet file
    pub fn write_records(&self, path: &Path, records: &[WarehouseRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(&self.output_dir)?;

        let schema = Arc::new(record_schema());
        let file = File::create(path)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        let timestamps: Vec<i64> = records
            .iter()
            .map(|r| r.timestamp.timestamp_micros())
            .collect();

        let columns: Vec<ArrayRef> = vec![
            Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| &r.tick_id))),
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| &r.gear))),
            Arc::new(UInt8Array::from_iter_values(records.iter().map(|r| r.gear_level))),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| &r.previous_gear),
            )),
            Arc::new(BooleanArray::from(
                records.iter().map(|r| r.gear_changed).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.volatility))),
            Arc::new(Float64Array::from_iter_values(
                records.iter().map(|r| r.volatility_rolling_avg),
            )),
            Arc::new(UInt64Array::from_iter_values(
                records.iter().map(|r| r.rate_limit_remaining),
            )),
            Arc::new(UInt64Array::from_iter_values(
                records.iter().map(|r| r.rate_limit_budget),
            )),
            Arc::new(Float64Array::from_iter_values(
                records.iter().map(|r| r.rate_limit_pressure),
            )),
            Arc::new(UInt64Array::from_iter_values(
                records.iter().map(|r| r.budget_consumed),
            )),
            Arc::new(Float64Array::from_iter_values(
                records.iter().map(|r| r.budget_utilization),
            )),
            Arc::new(UInt32Array::from_iter_values(
                records.iter().map(|r| r.queries_executed),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| &r.query_names),
            )),
            Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.hour_of_day))),
            Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.day_of_week))),
        ];

        let batch = RecordBatch::try_new(schema, columns)?;

        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = records.len(), "Wrote warehouse records to Parquet");

        Ok(())
    }
}

/// Reader for warehouse Parquet files
pub struct ParquetRecordReader {
    path: PathBuf,
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> anyhow::Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow::anyhow!("Invalid {} column", name))
}

impl ParquetRecordReader {
    /// Create a new reader for a Parquet file
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read every record in the file
    pub fn read_records(&self) -> anyhow::Result<Vec<WarehouseRecord>> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut records = Vec::new();

        for batch_result in reader {
            let batch = batch_result?;

            let timestamps = column::<TimestampMicrosecondArray>(&batch, "timestamp")?;
            let tick_ids = column::<StringArray>(&batch, "tick_id")?;
            let gears = column::<StringArray>(&batch, "gear")?;
            let gear_levels = column::<UInt8Array>(&batch, "gear_level")?;
            let previous_gears = column::<StringArray>(&batch, "previous_gear")?;
            let gear_changed = column::<BooleanArray>(&batch, "gear_changed")?;
            let volatility = column::<Float64Array>(&batch, "volatility")?;
            let rolling_avg = column::<Float64Array>(&batch, "volatility_rolling_avg")?;
            let remaining = column::<UInt64Array>(&batch, "rate_limit_remaining")?;
            let budget = column::<UInt64Array>(&batch, "rate_limit_budget")?;
            let pressure = column::<Float64Array>(&batch, "rate_limit_pressure")?;
            let consumed = column::<UInt64Array>(&batch, "budget_consumed")?;
            let utilization = column::<Float64Array>(&batch, "budget_utilization")?;
            let executed = column::<UInt32Array>(&batch, "queries_executed")?;
            let query_names = column::<StringArray>(&batch, "query_names")?;
            let hours = column::<UInt32Array>(&batch, "hour_of_day")?;
            let days = column::<UInt32Array>(&batch, "day_of_week")?;

            for i in 0..batch.num_rows() {
                let timestamp = DateTime::from_timestamp_micros(timestamps.value(i))
                    .ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))?;

                records.push(WarehouseRecord {
                    tick_id: tick_ids.value(i).to_string(),
                    timestamp,
                    gear: gears.value(i).to_string(),
                    gear_level: gear_levels.value(i),
                    previous_gear: previous_gears.value(i).to_string(),
                    gear_changed: gear_changed.value(i),
                    volatility: volatility.value(i),
                    volatility_rolling_avg: rolling_avg.value(i),
                    rate_limit_remaining: remaining.value(i),
                    rate_limit_budget: budget.value(i),
                    rate_limit_pressure: pressure.value(i),
                    budget_consumed: consumed.value(i),
                    budget_utilization: utilization.value(i),
                    queries_executed: executed.value(i),
                    query_names: query_names.value(i).to_string(),
                    hour_of_day: hours.value(i),
                    day_of_week: days.value(i),
                });
            }
        }

        Ok(records)
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Warehouse write statistics
#[derive(Debug, Default, Clone)]
pub struct WarehouseStats {
    pub records_received: u64,
    pub records_written: u64,
    pub files_written: u64,
    pub last_flush: Option<DateTime<Utc>>,
}

/// Data sink that buffers tick results and writes them to Parquet
pub struct ParquetWarehouse {
    output_dir: PathBuf,
    tx: Mutex<Option<mpsc::Sender<TickResult>>>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<RwLock<WarehouseStats>>,
}

impl ParquetWarehouse {
    /// Create the warehouse and spawn its writer task
    pub fn new(config: &WarehouseConfig) -> Self {
        let (tx, rx) = mpsc::channel(10_000);
        let stats = Arc::new(RwLock::new(WarehouseStats::default()));

        let writer = ParquetWriter::new(config.output_dir.clone(), config.rotation_interval_secs);
        let features = FeatureBuilder::new(config.rolling_window);
        let task_config = config.clone();
        let task_stats = stats.clone();
        let writer_task = tokio::spawn(async move {
            Self::run_writer(rx, writer, features, task_config, task_stats).await;
        });

        Self {
            output_dir: config.output_dir.clone(),
            tx: Mutex::new(Some(tx)),
            writer_task: Mutex::new(Some(writer_task)),
            stats,
        }
    }

    async fn run_writer(
        mut rx: mpsc::Receiver<TickResult>,
        mut writer: ParquetWriter,
        mut features: FeatureBuilder,
        config: WarehouseConfig,
        stats: Arc<RwLock<WarehouseStats>>,
    ) {
        let buffer_size = config.buffer_size.max(1);
        let mut buffer: Vec<WarehouseRecord> = Vec::with_capacity(buffer_size);
        let flush_every = std::time::Duration::from_secs(config.flush_interval_secs.max(1));
        let mut flush_timer = tokio::time::interval(flush_every);
        flush_timer.tick().await;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Some(tick) => {
                            stats.write().await.records_received += 1;
                            buffer.push(features.build(&tick));

                            if buffer.len() >= buffer_size {
                                Self::flush(&mut buffer, &mut writer, &stats).await;
                            }
                        }
                        None => {
                            Self::flush(&mut buffer, &mut writer, &stats).await;
                            tracing::info!("Warehouse writer shutting down");
                            break;
                        }
                    }
                }

                _ = flush_timer.tick() => {
                    Self::flush(&mut buffer, &mut writer, &stats).await;
                }
            }
        }
    }

    async fn flush(
        buffer: &mut Vec<WarehouseRecord>,
        writer: &mut ParquetWriter,
        stats: &Arc<RwLock<WarehouseStats>>,
    ) {
        if buffer.is_empty() {
            return;
        }

        let now = Utc::now();
        let path = writer.next_path(now);
        let count = buffer.len();

        match writer.write_records(&path, buffer) {
            Ok(()) => {
                let mut s = stats.write().await;
                s.records_written += count as u64;
                s.files_written += 1;
                s.last_flush = Some(now);
                tracing::debug!(count, path = ?path, "Flushed warehouse records");
            }
            Err(e) => {
                tracing::error!(error = %e, path = ?path, "Failed to write warehouse records");
            }
        }

        buffer.clear();
    }

    /// Flush buffered records and stop the writer task
    pub async fn close(&self) -> anyhow::Result<WarehouseStats> {
        drop(self.tx.lock().await.take());
        if let Some(handle) = self.writer_task.lock().await.take() {
            handle
                .await
                .map_err(|e| anyhow::anyhow!("Warehouse writer task failed: {}", e))?;
        }
        Ok(self.stats().await)
    }

    /// Get output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Get current statistics
    pub async fn stats(&self) -> WarehouseStats {
        self.stats.read().await.clone()
    }
}

#[async_trait]
impl DataSink for ParquetWarehouse {
    async fn store_tick_result(&self, tick: TickResult) -> anyhow::Result<()> {
        let tx = self
            .tx
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Warehouse is closed"))?;
        tx.send(tick)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send tick result: {}", e))?;
        Ok(())
    }
}

/// Parquet files written to a warehouse directory, oldest first
pub fn list_record_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    files.sort();
    Ok(files)
}
