use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ─── Key scheme ──────────────────────────────────────────────────

/// Namespace every aggregate key lives under.
pub const NAMESPACE: &str = "metrics";

/// Appended to the operation label when a failed call is recorded.
pub const ERROR_SUFFIX: &str = "_ERROR";

/// Primary key of an aggregate: one record per (entity, operation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    pub entity: String,
    pub operation: String,
}

impl MetricKey {
    pub fn new(entity: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            operation: operation.into(),
        }
    }

    /// The error variant of this key (`Delete` → `Delete_ERROR`).
    pub fn error_variant(&self) -> Self {
        Self::new(
            self.entity.clone(),
            format!("{}{ERROR_SUFFIX}", self.operation),
        )
    }

    /// `metrics:{entity}:{operation}`
    pub fn storage_key(&self) -> String {
        format!("{NAMESPACE}:{}:{}", self.entity, self.operation)
    }

    /// Prefix shared by every operation of `entity`.
    pub fn entity_prefix(entity: &str) -> String {
        format!("{NAMESPACE}:{entity}:")
    }

    /// Inverse of [`MetricKey::storage_key`]. Keys outside the namespace,
    /// or without an operation segment, yield `None`.
    pub fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(NAMESPACE)?.strip_prefix(':')?;
        let (entity, operation) = rest.split_once(':')?;
        if entity.is_empty() || operation.is_empty() {
            return None;
        }
        Some(Self::new(entity, operation))
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

// ─── Aggregate record ────────────────────────────────────────────

/// Running summary of every sample merged under one key.
///
/// Stored as JSON with camelCase field names. `averageTimeMs` is derived
/// and recomputed on every merge; `minTimeMs` reads 0 until the first
/// sample arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub entity: String,
    pub operation: String,
    #[serde(default, deserialize_with = "whole_number")]
    pub count: u64,
    #[serde(default, deserialize_with = "whole_number")]
    pub total_time_ms: u64,
    #[serde(default)]
    pub average_time_ms: f64,
    #[serde(default, deserialize_with = "whole_number")]
    pub min_time_ms: u64,
    #[serde(default, deserialize_with = "whole_number")]
    pub max_time_ms: u64,
    /// Epoch milliseconds of the most recent merge.
    #[serde(default, deserialize_with = "whole_number")]
    pub last_updated_at: u64,
}

impl Aggregate {
    /// Zero-valued placeholder for a key that has never seen a sample.
    pub fn empty(key: &MetricKey) -> Self {
        Self {
            entity: key.entity.clone(),
            operation: key.operation.clone(),
            count: 0,
            total_time_ms: 0,
            average_time_ms: 0.0,
            min_time_ms: 0,
            max_time_ms: 0,
            last_updated_at: 0,
        }
    }

    pub fn key(&self) -> MetricKey {
        MetricKey::new(self.entity.clone(), self.operation.clone())
    }

    /// Fold one duration sample into the summary. O(1), exact.
    pub fn merge(&mut self, duration_ms: u64, now_ms: u64) {
        if self.count == 0 {
            self.min_time_ms = duration_ms;
            self.max_time_ms = duration_ms;
        } else {
            self.min_time_ms = self.min_time_ms.min(duration_ms);
            self.max_time_ms = self.max_time_ms.max(duration_ms);
        }
        self.count += 1;
        self.total_time_ms = self.total_time_ms.saturating_add(duration_ms);
        self.average_time_ms = self.total_time_ms as f64 / self.count as f64;
        self.last_updated_at = now_ms;
    }
}

/// Integer fields also accept a whole-valued float such as `1e+14`,
/// which is how cjson wrote large numbers into older records.
fn whole_number<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    let num = serde_json::Number::deserialize(de)?;
    if let Some(n) = num.as_u64() {
        return Ok(n);
    }
    match num.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(D::Error::custom(format!(
            "expected a non-negative whole number, got {num}"
        ))),
    }
}

/// Wall-clock epoch milliseconds used for `lastUpdatedAt`.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// ─── Tests ───────────────────────────────────────────────────────
