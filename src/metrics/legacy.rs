//! Flat per-entity view kept for older dashboards.
//!
//! Nothing is stored in this shape: it is rebuilt on every read from the
//! entity's aggregates, four entries per operation.

use serde::{Deserialize, Serialize};

use super::Aggregate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: String,
    pub value: f64,
    /// Operation the value belongs to.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetrics {
    pub entity: String,
    pub metrics: Vec<MetricEntry>,
}

impl EntityMetrics {
    pub fn from_aggregates(entity: &str, aggregates: &[Aggregate]) -> Self {
        let metrics = aggregates
            .iter()
            .filter(|agg| agg.entity == entity && agg.count > 0)
            .flat_map(|agg| {
                [
                    ("Number", agg.count as f64),
                    ("Average", agg.average_time_ms),
                    ("Max", agg.max_time_ms as f64),
                    ("Min", agg.min_time_ms as f64),
                ]
                .into_iter()
                .map(|(name, value)| MetricEntry {
                    name: name.to_owned(),
                    value,
                    kind: agg.operation.clone(),
                })
            })
            .collect();

        Self {
            entity: entity.to_owned(),
            metrics,
        }
    }

    pub fn find(&self, name: &str, operation: &str) -> Option<&MetricEntry> {
        self.metrics
            .iter()
            .find(|m| m.name == name && m.kind == operation)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
