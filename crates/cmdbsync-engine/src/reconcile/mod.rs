//! Reconcilers.
//!
//! Each reconciler takes the source records of one task and decides, per
//! record, whether the target needs a create, an update, a delete, or
//! nothing. Per-record failures are logged and counted; only failures
//! outside the record loop (type lookups, collection reads) end the task.

pub mod asset;
pub mod catalog;
pub mod contract_asset;
pub mod delete;
pub mod installation;
pub mod relationship;

use cmdbsync_core::text::{normalize_spaces, sanitize, truncate_with_ellipsis};
use cmdbsync_core::{MappingRule, Task};
use cmdbsync_device42::SourceRecord;

use crate::error::{SyncError, SyncResult};
use crate::mapping::resolve::{source_value, value_text};

pub use asset::sync_assets;
pub use catalog::sync_catalog;
pub use contract_asset::sync_contract_assets;
pub use delete::delete_missing;
pub use installation::sync_installations;
pub use relationship::{delete_relationships, sync_relationships};

/// Name a record is matched on in the target.
///
/// Taken from the rule targeting `name` with its escape and length bounds
/// applied, so a rerun finds what the previous run created. Falls back to
/// the record's own `name`.
#[must_use]
pub fn record_name(rules: &[MappingRule], record: &SourceRecord) -> Option<String> {
    let name = match rules.iter().find(|rule| rule.target == "name") {
        Some(rule) => {
            let mut name = value_text(&source_value(record, rule))?;
            if rule.escape {
                name = sanitize(&name);
            }
            if let Some(max) = rule.max_length {
                name = truncate_with_ellipsis(&name, max);
            }
            name
        }
        None => value_text(record.get("name")?)?,
    };

    let name = normalize_spaces(&name);
    (!name.trim().is_empty()).then_some(name)
}

/// Text of a record field, if it holds a scalar.
#[must_use]
pub fn field_text(record: &SourceRecord, field: &str) -> Option<String> {
    record.get(field).and_then(value_text)
}

/// Source fields naming the two sides of a linking task (`key`, `target-key`).
pub(crate) fn pair_fields(task: &Task) -> SyncResult<(&str, &str)> {
    match (&task.mapping.key, &task.mapping.target_key) {
        (Some(key), Some(target_key)) => Ok((key.as_str(), target_key.as_str())),
        _ => Err(SyncError::missing_metadata("mapping key and target-key")),
    }
}
