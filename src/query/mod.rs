//! Query module
//!
//! Query catalog and greedy scheduling within the remaining rate-limit budget

mod scheduler;
mod types;

pub use scheduler::{schedule_queries, GreedyScheduler, Schedule};
pub use types::{default_catalog, Query, QueryCatalog};
