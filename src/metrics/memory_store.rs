use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;

use super::aggregate::{now_millis, Aggregate, MetricKey};
use super::store::{decode, AggregateStore, StoreError};

/// Process-local backend. Payloads are kept as JSON strings, exactly as
/// Redis would hold them, so corrupt-entry handling behaves the same.
///
/// A merge holds the key's shard lock for the whole read-modify-write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload verbatim, bypassing the merge path.
    pub fn insert_raw(&self, key: impl Into<String>, payload: impl Into<String>) {
        self.entries.insert(key.into(), payload.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AggregateStore for MemoryStore {
    async fn get(&self, key: &MetricKey) -> Result<Option<Aggregate>, StoreError> {
        let storage_key = key.storage_key();
        Ok(self
            .entries
            .get(&storage_key)
            .and_then(|raw| decode(&storage_key, raw.value())))
    }

    async fn merge(
        &self,
        key: &MetricKey,
        duration_ms: u64,
        _is_error: bool,
    ) -> Result<Aggregate, StoreError> {
        let storage_key = key.storage_key();

        match self.entries.entry(storage_key.clone()) {
            Entry::Occupied(mut slot) => {
                let mut agg: Aggregate = serde_json::from_str(slot.get()).map_err(|source| {
                    StoreError::Corrupt {
                        key: storage_key,
                        source,
                    }
                })?;
                agg.merge(duration_ms, now_millis());
                slot.insert(serde_json::to_string(&agg)?);
                Ok(agg)
            }
            Entry::Vacant(slot) => {
                let mut agg = Aggregate::empty(key);
                agg.merge(duration_ms, now_millis());
                slot.insert(serde_json::to_string(&agg)?);
                Ok(agg)
            }
        }
    }

    async fn delete(&self, key: &MetricKey) -> Result<bool, StoreError> {
        Ok(self.entries.remove(&key.storage_key()).is_some())
    }

    async fn raw_entries(&self, prefix: &str) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect())
    }
}

// ─── Tests ───────────────────────────────────────────────────────
