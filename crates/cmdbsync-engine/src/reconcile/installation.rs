//! Software installations on assets.

use std::collections::HashSet;

use cmdbsync_core::Task;
use cmdbsync_device42::SourceRecord;
use cmdbsync_freshservice::{BasicObject, CollectionKey};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::mapping::build_payload;
use crate::reconcile::relationship::{assets_key, find_asset, ASSETS_PATH};
use crate::reconcile::{field_text, pair_fields};
use crate::stats::{RecordOutcome, TaskStats};

/// Installation field holding the asset display id.
const MACHINE_FIELD: &str = "installation_machine_id";

fn applications_key() -> CollectionKey {
    CollectionKey::by_name("applications")
}

/// Install applications (`key`) on assets (`target-key`) unless already installed.
pub async fn sync_installations(
    ctx: &mut SyncContext,
    task: &Task,
    sources: &[SourceRecord],
) -> SyncResult<TaskStats> {
    let (key, target_key) = pair_fields(task)?;
    ctx.ensure_collection(&applications_key(), "api/v2/applications")
        .await?;
    ctx.ensure_collection(&assets_key(), ASSETS_PATH).await?;

    let mut stats = TaskStats::default();
    for record in sources {
        let Some(application) = field_text(record, key)
            .and_then(|name| ctx.cache.find(&applications_key(), &name).cloned())
        else {
            info!(software = ?field_text(record, key), "There is no such software in Freshservice");
            stats.record(RecordOutcome::Skipped);
            continue;
        };
        let Some(asset) = find_asset(ctx, record, target_key) else {
            info!(asset = ?field_text(record, target_key), "There is no such asset in Freshservice");
            stats.record(RecordOutcome::Skipped);
            continue;
        };

        match install(ctx, task, record, &application, &asset).await {
            Ok(outcome) => stats.record(outcome),
            Err(e) => {
                error!(
                    software = ?application.name,
                    asset = ?asset.name,
                    error = %e,
                    "Error adding installation"
                );
                stats.fail();
            }
        }
    }
    Ok(stats)
}

async fn install(
    ctx: &mut SyncContext,
    task: &Task,
    record: &SourceRecord,
    application: &BasicObject,
    asset: &BasicObject,
) -> SyncResult<RecordOutcome> {
    let application_id = application.display_id_or_id();
    let machine_id = asset.display_id_or_id();

    if ctx.cache.installations(application_id).is_none() {
        let installed: HashSet<i64> = ctx
            .target
            .installations(application_id)
            .await?
            .iter()
            .filter_map(|i| i.get(MACHINE_FIELD).and_then(Value::as_i64))
            .collect();
        ctx.cache.set_installations(application_id, installed);
    }
    if ctx
        .cache
        .installations(application_id)
        .is_some_and(|ids| ids.contains(&machine_id))
    {
        debug!(application_id = application_id, machine_id = machine_id, "Already installed");
        return Ok(RecordOutcome::Skipped);
    }

    let mut payload = build_payload(ctx, record, &task.mapping.fields, None, None, false).await?;
    payload.set(MACHINE_FIELD, json!(machine_id));

    let installation_id = ctx
        .target
        .insert_installation(application_id, &payload.into_value())
        .await?;
    ctx.cache.add_installation(application_id, machine_id);
    info!(
        application_id = application_id,
        machine_id = machine_id,
        installation_id = ?installation_id,
        "Added installation"
    );
    Ok(RecordOutcome::Created)
}
