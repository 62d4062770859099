//! Asset associations of contracts.

use std::collections::HashSet;

use cmdbsync_core::Task;
use cmdbsync_device42::SourceRecord;
use cmdbsync_freshservice::{BasicObject, CollectionKey};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::reconcile::relationship::{assets_key, find_asset, ASSETS_PATH};
use crate::reconcile::{field_text, pair_fields};
use crate::stats::{RecordOutcome, TaskStats};

fn contracts_key() -> CollectionKey {
    CollectionKey::by_name("contracts")
}

/// Associate assets (`target-key`) with contracts (`key`) unless already associated.
pub async fn sync_contract_assets(
    ctx: &mut SyncContext,
    task: &Task,
    sources: &[SourceRecord],
) -> SyncResult<TaskStats> {
    let (key, target_key) = pair_fields(task)?;
    ctx.ensure_collection(&contracts_key(), "api/v2/contracts")
        .await?;
    ctx.ensure_collection(&assets_key(), ASSETS_PATH).await?;

    let mut stats = TaskStats::default();
    for record in sources {
        let Some(contract) = field_text(record, key)
            .and_then(|name| ctx.cache.find(&contracts_key(), &name).cloned())
        else {
            info!(contract = ?field_text(record, key), "There is no such contract in Freshservice");
            stats.record(RecordOutcome::Skipped);
            continue;
        };
        let Some(asset) = find_asset(ctx, record, target_key) else {
            info!(asset = ?field_text(record, target_key), "There is no such asset in Freshservice");
            stats.record(RecordOutcome::Skipped);
            continue;
        };

        match associate(ctx, &contract, &asset).await {
            Ok(outcome) => stats.record(outcome),
            Err(e) => {
                error!(contract = ?contract.name, asset = ?asset.name, error = %e, "Error associating asset");
                stats.fail();
            }
        }
    }
    Ok(stats)
}

async fn associate(
    ctx: &mut SyncContext,
    contract: &BasicObject,
    asset: &BasicObject,
) -> SyncResult<RecordOutcome> {
    let asset_id = asset.display_id_or_id();

    if ctx.cache.contract_assets(contract.id).is_none() {
        let associated: HashSet<i64> = ctx
            .target
            .associated_assets(contract.id)
            .await?
            .iter()
            .filter_map(|a| a.get("display_id").or_else(|| a.get("id")).and_then(Value::as_i64))
            .collect();
        ctx.cache.set_contract_assets(contract.id, associated);
    }

    let mut asset_ids: Vec<i64> = match ctx.cache.contract_assets(contract.id) {
        Some(ids) if ids.contains(&asset_id) => {
            debug!(contract_id = contract.id, asset_id = asset_id, "Already associated");
            return Ok(RecordOutcome::Skipped);
        }
        Some(ids) => ids.iter().copied().collect(),
        None => Vec::new(),
    };
    asset_ids.push(asset_id);
    asset_ids.sort_unstable();

    ctx.target.associate_assets(contract.id, &asset_ids).await?;
    ctx.cache.add_contract_asset(contract.id, asset_id);
    info!(contract_id = contract.id, asset_id = asset_id, "Associated asset with contract");
    Ok(RecordOutcome::Created)
}
