//! Typed boundary between raw result envelopes and the arithmetic.
//!
//! Rows come back from the store as loosely shaped field maps. Each
//! query category is validated here exactly once: rows are checked for
//! shape, rows whose identity fields are null or missing are dropped
//! with a debug log, and the analyzers downstream only ever see typed
//! structs. Dropping here is the second line of defense behind the
//! builder's null guards; a store that was populated before the guards
//! existed can still contain null-identity groups.

use serde_json::Value;
use tracing::debug;

use relic_graph::QueryResult;
use relic_schema::FieldMap;

/// One grouped causal chain row.
#[derive(Debug, Clone, PartialEq)]
pub struct CausalRow {
    pub primary: String,
    pub secondary: Option<String>,
    pub category: String,
    pub frequency: i64,
}

/// One grouped share row: a category key and its summed amount.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareRow {
    pub key: String,
    pub amount: f64,
}

/// Validate grouped causal rows. Rows missing the primary cause or the
/// category are dropped; a missing secondary cause is legitimate.
pub fn causal_rows(result: &QueryResult) -> Vec<CausalRow> {
    if !result.success {
        debug!("Causal rows unavailable: {:?}", result.meta.error);
        return Vec::new();
    }
    result
        .data
        .iter()
        .filter_map(|row| {
            let Some(primary) = identity_string(row, "primary_cause") else {
                debug!("Dropping causal row with null primary_cause");
                return None;
            };
            let Some(category) = identity_string(row, "category") else {
                debug!("Dropping causal row with null category");
                return None;
            };
            Some(CausalRow {
                primary,
                secondary: identity_string(row, "secondary_cause"),
                category,
                frequency: numeric(row, "frequency") as i64,
            })
        })
        .collect()
}

/// Validate grouped share rows keyed by `key_column` with the summed
/// amount in `value_column`. Null-keyed rows are dropped.
pub fn share_rows(result: &QueryResult, key_column: &str, value_column: &str) -> Vec<ShareRow> {
    if !result.success {
        debug!("Share rows unavailable: {:?}", result.meta.error);
        return Vec::new();
    }
    result
        .data
        .iter()
        .filter_map(|row| {
            let Some(key) = identity_string(row, key_column) else {
                debug!("Dropping share row with null {}", key_column);
                return None;
            };
            Some(ShareRow {
                key,
                amount: numeric(row, value_column),
            })
        })
        .collect()
}

/// An identity cell: a non-empty string. Null, absent, blank and
/// non-string cells all fail.
fn identity_string(row: &FieldMap, field: &str) -> Option<String> {
    match row.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn numeric(row: &FieldMap, field: &str) -> f64 {
    row.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}
