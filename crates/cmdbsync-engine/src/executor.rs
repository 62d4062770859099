//! Task executor.
//!
//! Runs the enabled tasks in declaration order against one [`SyncContext`],
//! dispatching each to the reconciler its type and delete flag select.

use cmdbsync_core::{SyncConfig, Task, TaskKind};
use tracing::{info, instrument, warn};

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::reconcile;
use crate::stats::TaskStats;

/// Outcome of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub label: String,
    pub stats: TaskStats,
}

/// Run every enabled task of `config`.
///
/// Per-record failures are counted in the reports. A failure outside the
/// record loop of a task (source read, type lookup) stops the run.
pub async fn run_tasks(ctx: &mut SyncContext, config: &SyncConfig) -> SyncResult<Vec<TaskReport>> {
    let tasks: Vec<&Task> = config.enabled_tasks().collect();
    if tasks.is_empty() {
        info!("No tasks configured");
        return Ok(Vec::new());
    }

    if tasks
        .iter()
        .any(|t| t.kind == TaskKind::Contract && !t.target.delete)
    {
        ctx.resolve_approver().await?;
    }

    let mut reports = Vec::with_capacity(tasks.len());
    for task in tasks {
        let stats = run_task(ctx, task).await?;
        stats.log(task.label());
        reports.push(TaskReport {
            label: task.label().to_string(),
            stats,
        });
    }
    Ok(reports)
}

/// Fetch the source records of one task and reconcile them.
#[instrument(skip(ctx, task), fields(task = %task.label(), kind = %task.kind))]
pub async fn run_task(ctx: &mut SyncContext, task: &Task) -> SyncResult<TaskStats> {
    info!("Execute task");
    let sources = ctx.source.fetch(&task.resource).await?;
    info!(count = sources.len(), "Fetched source records");

    let stats = match (task.kind, task.target.delete) {
        (TaskKind::AffinityGroup | TaskKind::BusinessApp, false) => {
            reconcile::sync_relationships(ctx, task, &sources).await?
        }
        (TaskKind::AffinityGroup | TaskKind::BusinessApp, true) => {
            reconcile::delete_relationships(ctx, task, &sources).await?
        }
        (TaskKind::SoftwareInUse | TaskKind::ContractAsset, true) => {
            warn!("Deleting links of this task type is not supported");
            TaskStats::default()
        }
        (_, true) => reconcile::delete_missing(ctx, task, &sources).await?,
        (TaskKind::Asset, false) => reconcile::sync_assets(ctx, task, &sources).await?,
        (TaskKind::Software | TaskKind::Product | TaskKind::Contract, false) => {
            reconcile::sync_catalog(ctx, task, &sources).await?
        }
        (TaskKind::SoftwareInUse, false) => {
            reconcile::sync_installations(ctx, task, &sources).await?
        }
        (TaskKind::ContractAsset, false) => {
            reconcile::sync_contract_assets(ctx, task, &sources).await?
        }
    };
    Ok(stats)
}
