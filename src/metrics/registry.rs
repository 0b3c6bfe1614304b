use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

// ─── Public types ────────────────────────────────────────────────

/// Live, in-process counters and timers.
///
/// This is a write-mostly side channel next to the durable aggregates:
/// the recorder and the timing middleware push into it, the exporters
/// read a snapshot. Nothing here survives a restart.
pub struct MeterRegistry {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterType {
    Counter,
    Timer,
    /// A durable aggregate projected into meter shape for export.
    Aggregate,
}

impl MeterType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "COUNTER",
            Self::Timer => "TIMER",
            Self::Aggregate => "AGGREGATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Statistic {
    Count,
    TotalTime,
    Mean,
    Min,
    Max,
}

impl Statistic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::TotalTime => "TOTAL_TIME",
            Self::Mean => "MEAN",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Meter name plus its tags, kept sorted by tag key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeterId {
    pub name: String,
    pub tags: Vec<(String, String)>,
}

impl MeterId {
    pub fn new(name: &str, tags: &[(&str, &str)]) -> Self {
        let mut tags: Vec<(String, String)> = tags
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        tags.sort();
        Self {
            name: name.to_owned(),
            tags,
        }
    }

    /// `name` alone when untagged, otherwise `name{k=v,k=v}`.
    pub fn display_name(&self) -> String {
        if self.tags.is_empty() {
            return self.name.clone();
        }
        let tags: Vec<String> = self.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{}{{{}}}", self.name, tags.join(","))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub statistic: Statistic,
    pub value: f64,
}

/// Point-in-time reading of one meter.
#[derive(Debug, Clone)]
pub struct MeterSnapshot {
    pub id: MeterId,
    pub kind: MeterType,
    pub measurements: Vec<Measurement>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    meters: BTreeMap<MeterId, MeterState>,
}

enum MeterState {
    Counter { count: f64 },
    Timer { count: u64, total_ms: f64, max_ms: f64 },
}

// ─── MeterRegistry impl ──────────────────────────────────────────

impl MeterRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                meters: BTreeMap::new(),
            }),
        }
    }

    /// Bump a counter by one, registering it on first use.
    pub fn increment(&self, name: &str, tags: &[(&str, &str)]) {
        let mut inner = self.inner.lock();
        let state = inner
            .meters
            .entry(MeterId::new(name, tags))
            .or_insert(MeterState::Counter { count: 0.0 });
        if let MeterState::Counter { count } = state {
            *count += 1.0;
        }
    }

    /// Record one timing into a timer, registering it on first use.
    pub fn record_timer(&self, name: &str, tags: &[(&str, &str)], elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let mut inner = self.inner.lock();
        let state = inner
            .meters
            .entry(MeterId::new(name, tags))
            .or_insert(MeterState::Timer {
                count: 0,
                total_ms: 0.0,
                max_ms: 0.0,
            });
        if let MeterState::Timer {
            count,
            total_ms,
            max_ms,
        } = state
        {
            *count += 1;
            *total_ms += ms;
            *max_ms = max_ms.max(ms);
        }
    }

    /// Read-only view of every registered meter, ordered by id.
    pub fn snapshot(&self) -> Vec<MeterSnapshot> {
        let inner = self.inner.lock();
        inner
            .meters
            .iter()
            .map(|(id, state)| match state {
                MeterState::Counter { count } => MeterSnapshot {
                    id: id.clone(),
                    kind: MeterType::Counter,
                    measurements: vec![Measurement {
                        statistic: Statistic::Count,
                        value: *count,
                    }],
                },
                MeterState::Timer {
                    count,
                    total_ms,
                    max_ms,
                } => MeterSnapshot {
                    id: id.clone(),
                    kind: MeterType::Timer,
                    measurements: vec![
                        Measurement {
                            statistic: Statistic::Count,
                            value: *count as f64,
                        },
                        Measurement {
                            statistic: Statistic::TotalTime,
                            value: *total_ms,
                        },
                        Measurement {
                            statistic: Statistic::Max,
                            value: *max_ms,
                        },
                    ],
                },
            })
            .collect()
    }
}

impl Default for MeterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(snap: &MeterSnapshot, stat: Statistic) -> f64 {
        snap.measurements
            .iter()
            .find(|m| m.statistic == stat)
            .map(|m| m.value)
            .unwrap()
    }

    #[test]
    fn counters_accumulate_per_tag_set() {
        let reg = MeterRegistry::new();
        reg.increment("db.operation.count", &[("entity", "VISA"), ("operation", "PAYMENT")]);
        reg.increment("db.operation.count", &[("operation", "PAYMENT"), ("entity", "VISA")]);
        reg.increment("db.operation.count", &[("entity", "VISA"), ("operation", "REFUND")]);

        let snap = reg.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(value(&snap[0], Statistic::Count), 2.0);
        assert_eq!(value(&snap[1], Statistic::Count), 1.0);
    }

    #[test]
    fn timer_tracks_count_total_and_max() {
        let reg = MeterRegistry::new();
        reg.record_timer("db.operation.time", &[], Duration::from_millis(10));
        reg.record_timer("db.operation.time", &[], Duration::from_millis(30));

        let snap = reg.snapshot();
        assert_eq!(snap[0].kind, MeterType::Timer);
        assert_eq!(value(&snap[0], Statistic::Count), 2.0);
        assert!((value(&snap[0], Statistic::TotalTime) - 40.0).abs() < 1e-9);
        assert!((value(&snap[0], Statistic::Max) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn display_name_renders_sorted_tags() {
        let id = MeterId::new("db.operation.time", &[("operation", "Insert"), ("entity", "Customer")]);
        assert_eq!(id.display_name(), "db.operation.time{entity=Customer,operation=Insert}");
        assert_eq!(MeterId::new("metrics.samples.dropped", &[]).display_name(), "metrics.samples.dropped");
    }
}
