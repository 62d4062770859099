//! Asset create-or-update.

use cmdbsync_core::text::names_match;
use cmdbsync_core::Task;
use cmdbsync_device42::SourceRecord;
use cmdbsync_freshservice::{BasicObject, CollectionKey, RecordKind, SERVER_ASSET_TYPE};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::mapping::resolve::{source_value, value_text};
use crate::mapping::build_payload;
use crate::reconcile::record_name;
use crate::retry::{DegradePolicy, RetryDecision};
use crate::stats::{RecordOutcome, TaskStats};

/// Asset type whose updates must keep the assigned agent.
pub const BUSINESS_SERVICE_TYPE: &str = "Business Service";

/// Target field carrying the asset type.
const ASSET_TYPE_FIELD: &str = "asset_type_id";

/// Create or update one asset per source record.
pub async fn sync_assets(
    ctx: &mut SyncContext,
    task: &Task,
    sources: &[SourceRecord],
) -> SyncResult<TaskStats> {
    let key = CollectionKey::by_name(&task.target.model);
    ctx.ensure_collection(&key, &task.target.path).await?;
    let server_type_id = ctx
        .asset_type_by_name(SERVER_ASSET_TYPE)
        .await?
        .map(|t| t.id);

    let mut stats = TaskStats::default();
    for record in sources {
        let Some(name) = record_name(&task.mapping.fields, record) else {
            warn!(task = %task.label(), "Source record has no name, skipping");
            stats.record(RecordOutcome::Skipped);
            continue;
        };

        match sync_asset(ctx, task, record, &key, &name, server_type_id).await {
            Ok(outcome) => stats.record(outcome),
            Err(e) => {
                error!(record = %name, error = %e, "Error updating device");
                stats.fail();
            }
        }
    }
    Ok(stats)
}

async fn sync_asset(
    ctx: &mut SyncContext,
    task: &Task,
    record: &SourceRecord,
    key: &CollectionKey,
    name: &str,
    server_type_id: Option<i64>,
) -> SyncResult<RecordOutcome> {
    let existing = ctx.cache.find(key, name).cloned();

    // A specialized type on an existing asset is never replaced.
    let kept_type = existing
        .as_ref()
        .and_then(|object| object.asset_type_id)
        .filter(|type_id| Some(*type_id) != server_type_id);
    let type_id = match kept_type {
        Some(type_id) => type_id,
        None => declared_type(ctx, task, record).await?,
    };
    let schema = ctx.schema(type_id).await?;

    let keep_agent = match &existing {
        Some(object) if object.agent_id.is_some() => ctx
            .asset_type(type_id)
            .await?
            .is_some_and(|t| names_match(&t.name, BUSINESS_SERVICE_TYPE)),
        _ => false,
    };

    let mut policy = DegradePolicy::new();
    loop {
        let mut payload = build_payload(
            ctx,
            record,
            &task.mapping.fields,
            Some(schema.as_ref()),
            Some(type_id),
            policy.skip_error_fields(),
        )
        .await?;
        payload.set(ASSET_TYPE_FIELD, json!(type_id));
        if keep_agent {
            if let Some(agent_id) = existing.as_ref().and_then(|o| o.agent_id) {
                payload.set("agent_id", json!(agent_id));
            }
        }

        let result = write_asset(ctx, key, name, existing.as_ref(), &payload.into_value()).await;
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

async fn write_asset(
    ctx: &mut SyncContext,
    key: &CollectionKey,
    name: &str,
    existing: Option<&BasicObject>,
    body: &Value,
) -> SyncResult<RecordOutcome> {
    match existing {
        None => {
            info!(record = %name, "Adding device");
            let created = ctx.target.insert(RecordKind::Asset, body).await?;
            info!(record = %name, display_id = created.display_id_or_id(), "Added new asset");
            ctx.cache.insert(key, name, created);
            Ok(RecordOutcome::Created)
        }
        Some(object) => {
            info!(record = %name, "Updating device");
            let id = ctx
                .target
                .update(RecordKind::Asset, object.display_id_or_id(), body)
                .await?;
            info!(record = %name, id = id, "Updated asset");
            Ok(RecordOutcome::Updated)
        }
    }
}

/// Asset type a record declares: the `asset_type_id` rule, then the task's
/// asset type, then the generic server type.
async fn declared_type(ctx: &mut SyncContext, task: &Task, record: &SourceRecord) -> SyncResult<i64> {
    let from_rule = task
        .mapping
        .fields
        .iter()
        .find(|rule| rule.target == ASSET_TYPE_FIELD)
        .map(|rule| source_value(record, rule))
        .filter(|value| !value.is_null());

    if let Some(Value::Number(n)) = &from_rule {
        if let Some(id) = n.as_i64() {
            if let Some(asset_type) = ctx.asset_type(id).await? {
                return Ok(asset_type.id);
            }
        }
    }

    let name = from_rule
        .as_ref()
        .and_then(value_text)
        .or_else(|| task.target.asset_type.clone())
        .unwrap_or_else(|| SERVER_ASSET_TYPE.to_string());

    ctx.asset_type_by_name(&name)
        .await?
        .map(|t| t.id)
        .ok_or_else(|| SyncError::missing_metadata(format!("asset type '{name}'")))
}
