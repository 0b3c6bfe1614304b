//! Flat JSON / CSV dumps of the live meters and the stored aggregates.

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Write as _;

use super::registry::{Measurement, MeterId, MeterSnapshot, MeterType, Statistic};
use super::Aggregate;

pub const CSV_HEADER: &str = "timestamp,metric_name,metric_type,tag_key,tag_value,statistic,value";

/// Name under which stored aggregates appear next to the live meters.
pub const AGGREGATE_METER: &str = "metrics.aggregate";

// ─── Timestamps / filenames ──────────────────────────────────────

/// ISO-8601 local date-time, millisecond precision, no offset.
pub fn export_timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    now.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// `metrics_20250619_142501.csv`
pub fn csv_filename<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("metrics_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Filename suggested by the save endpoint; the format becomes the
/// extension unless the caller's name already has one.
pub fn suggested_filename<Tz: TimeZone>(format: &str, filename: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let base = if filename.is_empty() {
        format!("metrics_export_{}", now.format("%Y%m%d_%H%M%S"))
    } else {
        filename.to_owned()
    };
    if base.contains('.') {
        base
    } else {
        format!("{base}.{}", format.to_lowercase())
    }
}

// ─── JSON ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SystemMeter {
    #[serde(rename = "type")]
    pub kind: MeterType,
    pub tags: BTreeMap<String, String>,
    pub measurements: Vec<Measurement>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExport {
    pub timestamp: String,
    pub application: String,
    pub custom_metrics: Map<String, Value>,
    pub system_metrics: BTreeMap<String, SystemMeter>,
}

/// Stored payloads keyed by storage key; anything that is not valid JSON
/// is passed through as a string.
pub fn custom_metrics(raw: BTreeMap<String, String>) -> Map<String, Value> {
    raw.into_iter()
        .map(|(key, payload)| {
            let value = serde_json::from_str(&payload).unwrap_or(Value::String(payload));
            (key, value)
        })
        .collect()
}

/// Live meters keyed by their display name (`name{k=v,...}`).
pub fn system_metrics(meters: &[MeterSnapshot]) -> BTreeMap<String, SystemMeter> {
    meters
        .iter()
        .map(|m| {
            (
                m.id.display_name(),
                SystemMeter {
                    kind: m.kind,
                    tags: m.id.tags.iter().cloned().collect(),
                    measurements: m.measurements.clone(),
                },
            )
        })
        .collect()
}

// ─── Aggregates as meters ────────────────────────────────────────

pub fn aggregate_meters<'a>(aggregates: impl IntoIterator<Item = &'a Aggregate>) -> Vec<MeterSnapshot> {
    aggregates
        .into_iter()
        .map(|agg| MeterSnapshot {
            id: MeterId::new(
                AGGREGATE_METER,
                &[
                    ("entity", agg.entity.as_str()),
                    ("operation", agg.operation.as_str()),
                ],
            ),
            kind: MeterType::Aggregate,
            measurements: [
                (Statistic::Count, agg.count as f64),
                (Statistic::TotalTime, agg.total_time_ms as f64),
                (Statistic::Mean, agg.average_time_ms),
                (Statistic::Min, agg.min_time_ms as f64),
                (Statistic::Max, agg.max_time_ms as f64),
            ]
            .into_iter()
            .map(|(statistic, value)| Measurement { statistic, value })
            .collect(),
        })
        .collect()
}

// ─── CSV ─────────────────────────────────────────────────────────

/// One row per (meter × tag × statistic). Untagged meters get empty
/// tag columns so every row has the same seven fields.
pub fn to_csv(timestamp: &str, meters: &[MeterSnapshot]) -> String {
    let mut csv = String::with_capacity(64 * (meters.len() + 1));
    csv.push_str(CSV_HEADER);
    csv.push('\n');

    for meter in meters {
        let name = csv_field(&meter.id.name);
        let kind = meter.kind.as_str();

        let tags: Vec<(String, String)> = if meter.id.tags.is_empty() {
            vec![(String::new(), String::new())]
        } else {
            meter
                .id
                .tags
                .iter()
                .map(|(k, v)| (csv_field(k), csv_field(v)))
                .collect()
        };

        for (tag_key, tag_value) in &tags {
            for m in &meter.measurements {
                let _ = writeln!(
                    csv,
                    "{timestamp},{name},{kind},{tag_key},{tag_value},{},{:.6}",
                    m.statistic.as_str(),
                    m.value
                );
            }
        }
    }

    csv
}

/// Quote a field when it carries a delimiter, quote, or line break.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_owned()
    }
}
