use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::BTreeMap;
use tracing::debug;

use super::aggregate::{now_millis, Aggregate, MetricKey};
use super::store::{decode, AggregateStore, StoreError};

/// Keys fetched per SCAN page / MGET round-trip.
const BATCH: usize = 500;

/// Server-side merge. Redis runs scripts one at a time, so the
/// GET → fold → SET below is atomic with respect to every other merge.
///
/// The record is written with `string.format` rather than `cjson.encode`:
/// cjson prints numbers with 14 significant digits, which turns large
/// millisecond totals into `1e+14`-style floats.
///
/// KEYS[1] = storage key
/// ARGV    = entity, operation, duration_ms, now_ms
const MERGE_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
local rec = {}
if raw then
  rec = cjson.decode(raw)
end

local d = tonumber(ARGV[3])
local count = tonumber(rec.count) or 0
local total = tonumber(rec.totalTimeMs) or 0
local min, max

if count == 0 then
  min = d
  max = d
else
  min = math.min(tonumber(rec.minTimeMs) or d, d)
  max = math.max(tonumber(rec.maxTimeMs) or d, d)
end

count = count + 1
total = total + d

local encoded = string.format(
  '{"entity":%s,"operation":%s,"count":%d,"totalTimeMs":%d,"averageTimeMs":%.17g,"minTimeMs":%d,"maxTimeMs":%d,"lastUpdatedAt":%d}',
  cjson.encode(ARGV[1]), cjson.encode(ARGV[2]),
  count, total, total / count, min, max, tonumber(ARGV[4]))
redis.call('SET', KEYS[1], encoded)
return encoded
"#;

/// Aggregate store backed by Redis string keys holding JSON.
///
/// `ConnectionManager` is cheaply cloneable; every call clones it and
/// shares the same multiplexed connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    merge_script: redis::Script,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            merge_script: redis::Script::new(MERGE_SCRIPT),
        }
    }

    /// Cursor through `SCAN MATCH {prefix}*` collecting every key.
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", escape_glob(prefix));

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, page): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across pages
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[async_trait]
impl AggregateStore for RedisStore {
    async fn get(&self, key: &MetricKey) -> Result<Option<Aggregate>, StoreError> {
        let storage_key = key.storage_key();
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&storage_key).await?;
        Ok(raw.and_then(|payload| decode(&storage_key, &payload)))
    }

    async fn merge(
        &self,
        key: &MetricKey,
        duration_ms: u64,
        is_error: bool,
    ) -> Result<Aggregate, StoreError> {
        let storage_key = key.storage_key();
        let mut conn = self.conn.clone();

        let encoded: String = self
            .merge_script
            .key(&storage_key)
            .arg(&key.entity)
            .arg(&key.operation)
            .arg(duration_ms)
            .arg(now_millis())
            .invoke_async(&mut conn)
            .await?;

        debug!(key = %storage_key, duration_ms, is_error, "merged sample");
        serde_json::from_str(&encoded).map_err(|source| StoreError::Corrupt {
            key: storage_key,
            source,
        })
    }

    async fn delete(&self, key: &MetricKey) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key.storage_key()).await?;
        Ok(removed > 0)
    }

    async fn raw_entries(&self, prefix: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let keys = self.scan_keys(prefix).await?;
        let mut conn = self.conn.clone();
        let mut out = BTreeMap::new();

        for chunk in keys.chunks(BATCH) {
            // MGET yields nil for keys that vanished or hold a non-string type
            let values: Vec<Option<String>> = redis::cmd("MGET")
                .arg(chunk)
                .query_async(&mut conn)
                .await?;
            for (key, value) in chunk.iter().zip(values) {
                if let Some(v) = value {
                    out.insert(key.clone(), v);
                }
            }
        }

        Ok(out)
    }
}

/// Escape Redis glob metacharacters so a prefix matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_glob;

    #[test]
    fn escape_glob_leaves_plain_prefixes_alone() {
        assert_eq!(escape_glob("metrics:VISA:"), "metrics:VISA:");
    }

    #[test]
    fn escape_glob_quotes_metacharacters() {
        assert_eq!(escape_glob("metrics:a*b?[c]"), r"metrics:a\*b\?\[c\]");
    }
}
