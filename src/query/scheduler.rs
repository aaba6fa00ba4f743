//! Greedy first-fit query scheduling

use super::Query;
use serde::{Deserialize, Serialize};

/// Queries chosen for one tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Selected queries in execution order
    pub selected: Vec<Query>,
    /// Total rate-limit units consumed by the selection
    pub consumed: u64,
}

impl Schedule {
    /// Fraction of the offered budget this schedule uses
    pub fn utilization(&self, budget_remaining: u64) -> f64 {
        if budget_remaining == 0 {
            return 0.0;
        }
        self.consumed as f64 / budget_remaining as f64
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Greedy scheduler with an optional cap on queries per tick
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyScheduler {
    batch_limit: Option<usize>,
}

impl GreedyScheduler {
    /// Scheduler without a batch limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler that stops after `limit` selections
    pub fn with_batch_limit(limit: usize) -> Self {
        Self {
            batch_limit: Some(limit),
        }
    }

    /// Select queries by ascending priority within the budget.
    ///
    /// Ties keep catalog order. A query that does not fit is skipped and the
    /// scan continues; nothing is reordered to pack the budget tighter.
    pub fn schedule(&self, catalog: &[Query], budget_remaining: u64) -> Schedule {
        let mut schedule = Schedule::default();
        if budget_remaining == 0 {
            return schedule;
        }

        let mut ordered: Vec<&Query> = catalog.iter().collect();
        ordered.sort_by_key(|q| q.priority);

        for query in ordered {
            if self
                .batch_limit
                .is_some_and(|limit| schedule.selected.len() >= limit)
            {
                break;
            }
            match schedule.consumed.checked_add(query.cost) {
                Some(total) if total <= budget_remaining => {
                    schedule.consumed = total;
                    schedule.selected.push(query.clone());
                }
                _ => {
                    tracing::trace!(
                        query = %query.name,
                        cost = query.cost,
                        consumed = schedule.consumed,
                        budget_remaining,
                        "Skipping query over budget"
                    );
                }
            }
        }

        schedule
    }
}

/// Schedule queries with no batch limit
pub fn schedule_queries(catalog: &[Query], budget_remaining: u64) -> Schedule {
    GreedyScheduler::new().schedule(catalog, budget_remaining)
}
