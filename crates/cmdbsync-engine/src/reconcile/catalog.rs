//! Software, product and contract create-or-update.
//!
//! These records have no asset-type schema: every rule writes a flat field.

use cmdbsync_core::{Task, TaskKind};
use cmdbsync_device42::SourceRecord;
use cmdbsync_freshservice::{BasicObject, CollectionKey, RecordKind};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::mapping::build_payload;
use crate::reconcile::record_name;
use crate::retry::{DegradePolicy, RetryDecision};
use crate::stats::{RecordOutcome, TaskStats};

/// Record kind a catalog task writes.
#[must_use]
pub fn catalog_kind(kind: TaskKind) -> Option<RecordKind> {
    match kind {
        TaskKind::Software => Some(RecordKind::Application),
        TaskKind::Product => Some(RecordKind::Product),
        TaskKind::Contract => Some(RecordKind::Contract),
        _ => None,
    }
}

/// Create or update one catalog record per source record.
pub async fn sync_catalog(
    ctx: &mut SyncContext,
    task: &Task,
    sources: &[SourceRecord],
) -> SyncResult<TaskStats> {
    let kind = catalog_kind(task.kind)
        .ok_or_else(|| SyncError::missing_metadata(format!("record kind for task type {}", task.kind)))?;
    let key = CollectionKey::by_name(kind.collection());
    ctx.ensure_collection(&key, &task.target.path).await?;

    // Products belong to an asset type; lookups they create do too.
    let owner_type_id = match (kind, &task.target.asset_type) {
        (RecordKind::Product, Some(name)) => Some(
            ctx.asset_type_by_name(name)
                .await?
                .map(|t| t.id)
                .ok_or_else(|| SyncError::missing_metadata(format!("asset type '{name}'")))?,
        ),
        _ => None,
    };

    let mut stats = TaskStats::default();
    for record in sources {
        let Some(name) = record_name(&task.mapping.fields, record) else {
            warn!(task = %task.label(), "Source record has no name, skipping");
            stats.record(RecordOutcome::Skipped);
            continue;
        };

        match sync_record(ctx, task, kind, &key, record, &name, owner_type_id).await {
            Ok(outcome) => stats.record(outcome),
            Err(e) => {
                error!(record = %name, kind = %kind, error = %e, "Error syncing record");
                stats.fail();
            }
        }
    }
    Ok(stats)
}

async fn sync_record(
    ctx: &mut SyncContext,
    task: &Task,
    kind: RecordKind,
    key: &CollectionKey,
    record: &SourceRecord,
    name: &str,
    owner_type_id: Option<i64>,
) -> SyncResult<RecordOutcome> {
    let existing = ctx.cache.find(key, name).cloned();
    // Every contract record needs the approver; only a create sends it.
    let approver_id = match kind {
        RecordKind::Contract => Some(ctx.approver_id()?),
        _ => None,
    }
    .filter(|_| existing.is_none());

    let mut policy = DegradePolicy::new();
    loop {
        let mut payload = build_payload(
            ctx,
            record,
            &task.mapping.fields,
            None,
            owner_type_id,
            policy.skip_error_fields(),
        )
        .await?;
        if let Some(type_id) = owner_type_id {
            payload.set("asset_type_id", json!(type_id));
        }
        if let Some(approver_id) = approver_id {
            payload.set("approver_id", json!(approver_id));
        }

        let result = write_record(ctx, kind, key, name, existing.as_ref(), &payload.into_value()).await;
        match result {
            Ok(outcome) => return Ok(outcome),
            Err(e) => match policy.on_error(&e) {
                RetryDecision::RetryDegraded => {
                    warn!(record = %name, error = %e, "Duplicate value, retrying without error-skip fields");
                }
                RetryDecision::GiveUp => return Err(e),
            },
        }
    }
}

async fn write_record(
    ctx: &mut SyncContext,
    kind: RecordKind,
    key: &CollectionKey,
    name: &str,
    existing: Option<&BasicObject>,
    body: &Value,
) -> SyncResult<RecordOutcome> {
    match existing {
        None => {
            let created = ctx.target.insert(kind, body).await?;
            info!(record = %name, kind = %kind, id = created.id, "Added new record");
            ctx.cache.insert(key, name, created);
            Ok(RecordOutcome::Created)
        }
        Some(object) => {
            let id = ctx.target.update(kind, object.id, body).await?;
            info!(record = %name, kind = %kind, id = id, "Updated record");
            Ok(RecordOutcome::Updated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_kinds() {
        assert_eq!(catalog_kind(TaskKind::Software), Some(RecordKind::Application));
        assert_eq!(catalog_kind(TaskKind::Contract), Some(RecordKind::Contract));
        assert!(catalog_kind(TaskKind::Asset).is_none());
    }
}
