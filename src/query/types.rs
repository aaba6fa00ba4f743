//! Query catalog types

use crate::gear::Gear;
use serde::{Deserialize, Serialize};

/// A market-data query that spends rate-limit units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Query name (e.g., "market_volatility")
    pub name: String,
    /// Rate-limit units consumed by one execution
    pub cost: u64,
    /// Priority, 1 = highest
    pub priority: u32,
    /// Gears this query runs in; empty means every gear
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gears: Vec<Gear>,
}

impl Query {
    /// Create a query that runs in every gear
    pub fn new(name: impl Into<String>, cost: u64, priority: u32) -> Self {
        Self {
            name: name.into(),
            cost,
            priority,
            gears: Vec::new(),
        }
    }

    /// Restrict the query to the given gears
    pub fn only_in(mut self, gears: &[Gear]) -> Self {
        self.gears = gears.to_vec();
        self
    }

    /// Whether this query runs in the given gear
    pub fn runs_in(&self, gear: Gear) -> bool {
        self.gears.is_empty() || self.gears.contains(&gear)
    }
}

/// Read-only query catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryCatalog {
    queries: Vec<Query>,
}

impl QueryCatalog {
    /// Create a catalog from queries in declaration order
    pub fn new(queries: Vec<Query>) -> Self {
        Self { queries }
    }

    /// All queries in declaration order
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Queries applicable to a gear, in declaration order
    pub fn for_gear(&self, gear: Gear) -> Vec<Query> {
        self.queries
            .iter()
            .filter(|q| q.runs_in(gear))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Reject zero-cost and zero-priority entries
    pub fn validate(&self) -> anyhow::Result<()> {
        for query in &self.queries {
            if query.cost == 0 {
                anyhow::bail!("Query {} has zero cost", query.name);
            }
            if query.priority == 0 {
                anyhow::bail!("Query {} has priority 0 (1 is highest)", query.name);
            }
        }
        Ok(())
    }
}

/// Catalog used when the config omits `queries`
pub fn default_catalog() -> QueryCatalog {
    QueryCatalog::new(vec![
        Query::new("market_volatility", 2, 1),
        Query::new("trend_detection", 3, 1),
        Query::new("correlation_analysis", 2, 1),
        Query::new("order_flow_snapshot", 4, 2),
        Query::new("sentiment_analysis", 5, 3).only_in(&[Gear::Low, Gear::Medium]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_runs_everywhere_by_default() {
        let query = Query::new("trend_detection", 3, 1);
        for gear in Gear::ALL {
            assert!(query.runs_in(gear));
        }
    }

    #[test]
    fn test_query_gear_restriction() {
        let query = Query::new("sentiment_analysis", 5, 3).only_in(&[Gear::Low]);
        assert!(query.runs_in(Gear::Low));
        assert!(!query.runs_in(Gear::Emergency));
    }

    #[test]
    fn test_catalog_for_gear_preserves_order() {
        let catalog = default_catalog();
        let names: Vec<String> = catalog
            .for_gear(Gear::Emergency)
            .into_iter()
            .map(|q| q.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "market_volatility",
                "trend_detection",
                "correlation_analysis",
                "order_flow_snapshot"
            ]
        );
        assert_eq!(catalog.for_gear(Gear::Low).len(), 5);
    }

    #[test]
    fn test_catalog_validate() {
        assert!(default_catalog().validate().is_ok());
        let bad = QueryCatalog::new(vec![Query::new("free", 0, 1)]);
        assert!(bad.validate().is_err());
        let bad = QueryCatalog::new(vec![Query::new("unranked", 1, 0)]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_query_deserialize_without_gears() {
        let query: Query =
            serde_json::from_str(r#"{"name":"market_volatility","cost":2,"priority":1}"#).unwrap();
        assert!(query.gears.is_empty());
        assert_eq!(query.cost, 2);
    }
}
