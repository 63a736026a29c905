use aro_core::GroupKind;
use serde::{Deserialize, Serialize};

/// How [`crate::DynamicHelper`] treats objects that already exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePolicy {
    /// Log a JSON Patch from the live to the desired object before each
    /// update. Never applied to Secrets.
    pub log_changes: bool,
    /// Retry the whole get/compare/update cycle on write conflicts.
    pub retry_on_conflict: bool,
    /// Skip the update when every field of the desired object already
    /// matches the live one.
    pub avoid_unnecessary_updates: bool,
    /// With `avoid_unnecessary_updates`, compare normalised copies so
    /// server-side defaults and bookkeeping never count as a change.
    pub ignore_defaults: bool,
    /// Refresh discovery and retry when a kind is not (yet) served.
    pub refresh_api_resources_on_not_found: bool,
}

impl UpdatePolicy {
    /// Whether an update to an object of `group_kind` gets its change log.
    /// Secrets never do.
    pub fn logs_changes_for(&self, group_kind: &GroupKind) -> bool {
        self.log_changes && !group_kind.is("", "Secret")
    }
}
