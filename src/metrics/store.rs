use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use super::aggregate::{Aggregate, MetricKey, NAMESPACE};

// ─── Errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt payload under {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ─── Store contract ──────────────────────────────────────────────

/// Durable home of the aggregate records, one per `metrics:{entity}:{operation}`.
///
/// `merge` must be atomic per key: two concurrent merges on the same key
/// both land. Merges on different keys are independent.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// `None` when the key was never merged (or its payload is unreadable).
    async fn get(&self, key: &MetricKey) -> Result<Option<Aggregate>, StoreError>;

    /// Fold one sample into the record under `key`, creating it on first use.
    async fn merge(
        &self,
        key: &MetricKey,
        duration_ms: u64,
        is_error: bool,
    ) -> Result<Aggregate, StoreError>;

    /// Whether a record existed and was removed.
    async fn delete(&self, key: &MetricKey) -> Result<bool, StoreError>;

    /// Raw stored payloads of every key starting with `prefix`.
    async fn raw_entries(&self, prefix: &str) -> Result<BTreeMap<String, String>, StoreError>;

    /// Every aggregate in the namespace, keyed by storage key.
    async fn list_all(&self) -> Result<BTreeMap<String, Aggregate>, StoreError> {
        let raw = self.raw_entries(&format!("{NAMESPACE}:")).await?;
        Ok(decode_entries(raw))
    }

    /// Every aggregate recorded for one entity, ordered by operation.
    async fn list_entity(&self, entity: &str) -> Result<Vec<Aggregate>, StoreError> {
        let raw = self.raw_entries(&MetricKey::entity_prefix(entity)).await?;
        Ok(decode_entries(raw)
            .into_values()
            .filter(|agg| agg.entity == entity)
            .collect())
    }
}

// ─── Decoding helpers ────────────────────────────────────────────

/// Parse one stored payload; unreadable payloads are logged and dropped.
pub(crate) fn decode(key: &str, raw: &str) -> Option<Aggregate> {
    match serde_json::from_str::<Aggregate>(raw) {
        Ok(agg) => Some(agg),
        Err(e) => {
            warn!(key, error = %e, "skipping unreadable aggregate payload");
            None
        }
    }
}

fn decode_entries(raw: BTreeMap<String, String>) -> BTreeMap<String, Aggregate> {
    raw.into_iter()
        .filter_map(|(key, value)| {
            if MetricKey::parse(&key).is_none() {
                debug!(key, "ignoring key outside the aggregate scheme");
                return None;
            }
            decode(&key, &value).map(|agg| (key, agg))
        })
        .collect()
}
