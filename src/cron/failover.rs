//! Active/standby failover between tick runners

use super::TickRunner;
use crate::controller::TickResult;
use crate::gear::Gear;
use crate::telemetry::{self, CounterMetric};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

/// Job status within a failover group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Runs ticks and consumes budget
    Active,
    /// Idle until promoted
    Standby,
    /// Errored or timed out; skipped until reinstated
    Failed,
}

/// Failover errors
#[derive(Debug, Error)]
pub enum FailoverError {
    /// The active job failed and no standby is left to promote
    #[error("Active job failed and none of the {0} jobs is on standby")]
    Exhausted(usize),
    /// No job with that name
    #[error("Unknown job: {0}")]
    UnknownJob(String),
}

/// A named tick runner inside a failover group
pub struct CronJob {
    pub id: Uuid,
    pub name: String,
    pub status: JobStatus,
    runner: Arc<dyn TickRunner>,
    failed_at: Option<Instant>,
}

impl CronJob {
    pub fn new(name: impl Into<String>, runner: Arc<dyn TickRunner>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: JobStatus::Standby,
            runner,
            failed_at: None,
        }
    }
}

/// Ordered jobs with exactly one active.
///
/// Order is fallback priority: when the active job errors or times out,
/// the first standby after it (wrapping around) is promoted and runs the
/// same tick. Failed jobs return to standby once `reinstate_after` has
/// passed, so later failures still have somewhere to go.
pub struct FailoverGroup {
    jobs: Vec<CronJob>,
    active: usize,
    tick_timeout: Duration,
    reinstate_after: Option<Duration>,
}

impl FailoverGroup {
    /// Build a group; the first job starts active
    pub fn new(jobs: Vec<CronJob>, tick_timeout: Duration) -> anyhow::Result<Self> {
        if jobs.is_empty() {
            anyhow::bail!("Failover group needs at least one job");
        }
        let mut group = Self {
            jobs,
            active: 0,
            tick_timeout,
            reinstate_after: None,
        };
        for job in &mut group.jobs {
            job.status = JobStatus::Standby;
        }
        group.jobs[0].status = JobStatus::Active;
        Ok(group)
    }

    /// Return failed jobs to standby after this cooldown
    pub fn with_reinstate_after(mut self, cooldown: Duration) -> Self {
        self.reinstate_after = Some(cooldown);
        self
    }

    /// Run one tick on the active job, failing over as needed.
    ///
    /// When the active job fails and no standby is left, it stays active and
    /// the error is returned so the caller can retry on its next interval.
    pub async fn tick(&mut self) -> Result<TickResult, FailoverError> {
        self.reinstate_cooled_down();

        loop {
            let job = &self.jobs[self.active];
            match job.runner.run_tick(self.tick_timeout).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        job = %job.name,
                        job_id = %job.id,
                        error = %e,
                        "Active job failed"
                    );
                }
            }
            self.fail_active()?;
        }
    }

    fn reinstate_cooled_down(&mut self) {
        let Some(cooldown) = self.reinstate_after else {
            return;
        };
        let now = Instant::now();
        for job in &mut self.jobs {
            let cooled = job
                .failed_at
                .is_some_and(|at| now.duration_since(at) >= cooldown);
            if job.status == JobStatus::Failed && cooled {
                job.status = JobStatus::Standby;
                job.failed_at = None;
                tracing::info!(job = %job.name, "Job cooled down, back on standby");
            }
        }
    }

    fn fail_active(&mut self) -> Result<(), FailoverError> {
        let failed = self.active;
        let count = self.jobs.len();
        let next = (1..count)
            .map(|offset| (failed + offset) % count)
            .find(|&i| self.jobs[i].status == JobStatus::Standby)
            .ok_or(FailoverError::Exhausted(count))?;

        self.jobs[failed].status = JobStatus::Failed;
        self.jobs[failed].failed_at = Some(Instant::now());
        self.jobs[next].status = JobStatus::Active;
        self.active = next;
        telemetry::increment_counter(CounterMetric::Failovers, 1);
        tracing::info!(
            from = %self.jobs[failed].name,
            to = %self.jobs[next].name,
            "Promoted standby"
        );
        Ok(())
    }

    /// Return a failed job to standby
    pub fn reinstate(&mut self, name: &str) -> Result<(), FailoverError> {
        let job = self
            .jobs
            .iter_mut()
            .find(|j| j.name == name)
            .ok_or_else(|| FailoverError::UnknownJob(name.to_string()))?;
        if job.status == JobStatus::Failed {
            job.status = JobStatus::Standby;
            job.failed_at = None;
            tracing::info!(job = %job.name, "Job reinstated as standby");
        }
        Ok(())
    }

    /// Name of the active job
    pub fn active_job(&self) -> &str {
        &self.jobs[self.active].name
    }

    /// Gear of the active job's controller
    pub async fn current_gear(&self) -> Gear {
        self.jobs[self.active].runner.current_gear().await
    }

    /// Name and status of every job in priority order
    pub fn statuses(&self) -> Vec<(String, JobStatus)> {
        self.jobs
            .iter()
            .map(|j| (j.name.clone(), j.status))
            .collect()
    }
}
