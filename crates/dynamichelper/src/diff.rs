//! The one-way comparison that decides whether an update is needed, and the
//! change log rendered before an update.

use aro_core::{Document, ResourceKey};
use serde_json::Value;
use tracing::info;

/// Whether applying `desired` would change `existing`.
///
/// Only fields present in `desired` are checked; fields only the live object
/// has (server defaults, status, bookkeeping) never count. Arrays must match
/// element for element. A key missing from `existing` compares as null.
pub fn needs_update(existing: &Value, desired: &Value) -> bool {
    match (existing, desired) {
        (Value::Object(have), Value::Object(want)) => {
            want.iter().any(|(k, w)| needs_update(have.get(k).unwrap_or(&Value::Null), w))
        }
        (Value::Array(have), Value::Array(want)) => {
            have.len() != want.len() || have.iter().zip(want).any(|(h, w)| needs_update(h, w))
        }
        (h, w) => h != w,
    }
}

/// Log the JSON Patch that turns `existing` into `desired`.
pub fn log_changes(key: &ResourceKey, existing: &Document, desired: &Document) {
    let patch = json_patch::diff(existing, desired);
    if patch.0.is_empty() {
        return;
    }
    match serde_json::to_string(&patch) {
        Ok(ops) => info!(key = %key, changes = %ops, "Update diff"),
        Err(e) => info!(key = %key, error = %e, "Update diff unavailable"),
    }
}
