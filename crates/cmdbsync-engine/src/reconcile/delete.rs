//! Deletion of target records missing from the source.

use cmdbsync_core::Task;
use cmdbsync_device42::SourceRecord;
use cmdbsync_freshservice::cache::index_key;
use cmdbsync_freshservice::{BasicObject, RecordKind};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::stats::{RecordOutcome, TaskStats};

/// Field records are matched on when the mapping declares no key.
const DEFAULT_KEY: &str = "name";

/// Key value of a target record: the top-level field, then its `type_fields`.
/// `None` stands for a null or missing key and matches a source record
/// whose key is null or missing too.
fn target_key(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .filter(|v| !v.is_null())
        .or_else(|| object.get("type_fields")?.get(key))
        .and_then(index_key)
}

/// Delete every target record whose key matches no source record.
pub async fn delete_missing(
    ctx: &mut SyncContext,
    task: &Task,
    sources: &[SourceRecord],
) -> SyncResult<TaskStats> {
    let mut stats = TaskStats::default();
    let Some(kind) = RecordKind::from_collection(&task.target.model) else {
        warn!(model = %task.target.model, "Deleting this record kind is not supported");
        return Ok(stats);
    };
    if kind == RecordKind::Contract {
        warn!(model = %task.target.model, "Deleting contracts is not supported");
        return Ok(stats);
    }

    let key = task.mapping.key.as_deref().unwrap_or(DEFAULT_KEY);
    let path = if kind == RecordKind::Asset && !task.target.path.contains('?') {
        format!("{}?include=type_fields", task.target.path)
    } else {
        task.target.path.clone()
    };

    info!(collection = %kind.collection(), "Getting all existing objects in Freshservice");
    let existing = ctx.target.list(&path, kind.collection()).await?;

    let source_keys: Vec<Option<String>> = sources
        .iter()
        .map(|record| record.get(key).and_then(index_key))
        .collect();

    for object in &existing {
        if source_keys.contains(&target_key(object, key)) {
            continue;
        }
        let Some(basic) = BasicObject::from_value(object) else {
            continue;
        };
        let label = basic.name.clone().unwrap_or_else(|| basic.id.to_string());
        let id = match kind {
            RecordKind::Asset => basic.display_id_or_id(),
            _ => basic.id,
        };

        info!(record = %label, kind = %kind, "Deleting record");
        match ctx.target.delete(kind, id).await {
            Ok(()) => {
                info!(record = %label, "Deleted record");
                stats.record(RecordOutcome::Deleted);
            }
            Err(e) => {
                error!(record = %label, error = %e, "Error deleting record");
                stats.fail();
            }
        }
    }
    Ok(stats)
}
