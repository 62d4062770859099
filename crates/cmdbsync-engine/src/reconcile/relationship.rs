//! Relationship edges between assets (affinity groups, business apps).
//!
//! New edges are queued and submitted in fixed-size batches to the
//! bulk-create endpoint. Each batch becomes an asynchronous job; once every
//! batch is submitted the jobs are polled at a fixed interval until they
//! finish or the attempt budget runs out.

use cmdbsync_core::text::names_match;
use cmdbsync_core::Task;
use cmdbsync_device42::SourceRecord;
use cmdbsync_freshservice::{BasicObject, CollectionKey, JobStatus, RelationshipEdge};
use tracing::{debug, error, info, warn};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::reconcile::{field_text, pair_fields};
use crate::stats::{RecordOutcome, TaskStats};

/// Collection both sides of an edge are looked up in.
pub(crate) const ASSETS_PATH: &str = "api/v2/assets";

pub(crate) fn assets_key() -> CollectionKey {
    CollectionKey::by_name("assets")
}

/// A submitted bulk-create job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    pub job_id: String,
    pub size: usize,
}

/// Relationship type of the task, or `None` (logged) when the target does not declare it.
async fn relationship_type_id(ctx: &mut SyncContext, task: &Task) -> SyncResult<Option<i64>> {
    let (Some(forward), Some(backward)) = (
        task.mapping.forward_relationship.as_deref(),
        task.mapping.backward_relationship.as_deref(),
    ) else {
        return Err(SyncError::missing_metadata("forward and backward relationship names"));
    };

    let found = ctx.relationship_type(forward, backward).await?;
    if found.is_none() {
        error!(
            forward = %forward,
            backward = %backward,
            "There is no such relationship type in Freshservice"
        );
    }
    Ok(found.map(|t| t.id))
}

pub(crate) fn find_asset(ctx: &SyncContext, record: &SourceRecord, field: &str) -> Option<BasicObject> {
    let name = field_text(record, field)?;
    ctx.cache.find(&assets_key(), &name).cloned()
}

// ── Creation ──────────────────────────────────────────────────────────

/// Create the edges the source declares and the target lacks.
pub async fn sync_relationships(
    ctx: &mut SyncContext,
    task: &Task,
    sources: &[SourceRecord],
) -> SyncResult<TaskStats> {
    let mut stats = TaskStats::default();
    let Some(type_id) = relationship_type_id(ctx, task).await? else {
        return Ok(stats);
    };
    let (key, target_key) = pair_fields(task)?;
    ctx.ensure_collection(&assets_key(), ASSETS_PATH).await?;

    let batch_size = ctx.options.batch_size;
    let mut queue: Vec<RelationshipEdge> = Vec::with_capacity(batch_size);
    let mut jobs: Vec<SubmittedJob> = Vec::new();

    for record in sources {
        match queue_edge(ctx, record, type_id, key, target_key).await {
            Ok(Some(edge)) => {
                queue.push(edge);
                if queue.len() >= batch_size {
                    submit_batch(ctx, &mut queue, &mut jobs, &mut stats).await;
                }
            }
            Ok(None) => stats.record(RecordOutcome::Skipped),
            Err(e) => {
                error!(record = ?field_text(record, key), error = %e, "Error creating relationship");
                stats.fail();
            }
        }
    }
    if !queue.is_empty() {
        submit_batch(ctx, &mut queue, &mut jobs, &mut stats).await;
    }

    poll_jobs(ctx, jobs, &mut stats).await;
    Ok(stats)
}

/// Edge to create for a record, or `None` when a side is missing or the edge exists.
async fn queue_edge(
    ctx: &mut SyncContext,
    record: &SourceRecord,
    type_id: i64,
    key: &str,
    target_key: &str,
) -> SyncResult<Option<RelationshipEdge>> {
    let Some(primary) = find_asset(ctx, record, key) else {
        info!(asset = ?field_text(record, key), "There is no dependent asset in Freshservice");
        return Ok(None);
    };
    let Some(secondary) = find_asset(ctx, record, target_key) else {
        info!(asset = ?field_text(record, target_key), "There is no dependency asset in Freshservice");
        return Ok(None);
    };

    let primary_id = primary.display_id_or_id();
    let secondary_id = secondary.display_id_or_id();

    if !ctx.cache.has_relationships(primary_id) {
        let existing = ctx.target.relationships_of(primary_id).await?;
        ctx.cache.init_relationships(primary_id);
        for relationship in existing.iter().filter(|r| r.primary_id == primary_id) {
            ctx.cache.add_relationship(
                primary_id,
                relationship.relationship_type_id,
                relationship.secondary_id,
            );
        }
    }

    if !ctx.cache.add_relationship(primary_id, type_id, secondary_id) {
        debug!(primary_id = primary_id, secondary_id = secondary_id, "Relationship already exists");
        return Ok(None);
    }
    Ok(Some(RelationshipEdge::between_assets(type_id, primary_id, secondary_id)))
}

async fn submit_batch(
    ctx: &SyncContext,
    queue: &mut Vec<RelationshipEdge>,
    jobs: &mut Vec<SubmittedJob>,
    stats: &mut TaskStats,
) {
    let batch = std::mem::take(queue);
    match ctx.target.bulk_create_relationships(&batch).await {
        Ok(job_id) => {
            info!(job_id = %job_id, size = batch.len(), "Submitted relationship batch");
            jobs.push(SubmittedJob {
                job_id,
                size: batch.len(),
            });
        }
        Err(e) => {
            error!(size = batch.len(), error = %e, "Error submitting relationship batch");
            stats.fail_many(batch.len());
        }
    }
}

/// Poll submitted jobs until none is pending or the attempt budget is spent.
pub async fn poll_jobs(ctx: &SyncContext, jobs: Vec<SubmittedJob>, stats: &mut TaskStats) {
    if jobs.is_empty() {
        return;
    }
    let attempts = ctx.options.poll_attempts(jobs.len());
    let mut pending = jobs;

    for attempt in 1..=attempts {
        if pending.is_empty() {
            break;
        }
        tokio::time::sleep(ctx.options.poll_interval).await;
        debug!(attempt = attempt, pending = pending.len(), "Polling relationship jobs");

        let mut still_pending = Vec::new();
        for job in pending {
            let state = match ctx.target.job(&job.job_id).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(job_id = %job.job_id, error = %e, "Could not read job status");
                    still_pending.push(job);
                    continue;
                }
            };

            match &state.status {
                JobStatus::Success => {
                    info!(job_id = %job.job_id, size = job.size, "Relationship job finished");
                    stats.record_many(RecordOutcome::Created, job.size);
                }
                JobStatus::Failed | JobStatus::Partial => {
                    let mut failed = 0;
                    for failure in state.failures() {
                        failed += 1;
                        error!(
                            job_id = %job.job_id,
                            primary_id = ?failure.primary_id,
                            secondary_id = ?failure.secondary_id,
                            error = ?failure.error,
                            "Relationship was not created"
                        );
                    }
                    if state.relationships.is_empty() {
                        failed = job.size;
                    }
                    error!(job_id = %job.job_id, status = %state.status, failed = failed, "Relationship job did not fully succeed");
                    stats.fail_many(failed);
                    stats.record_many(RecordOutcome::Created, job.size.saturating_sub(failed));
                }
                JobStatus::Queued | JobStatus::InProgress => still_pending.push(job),
                JobStatus::Unknown(status) => {
                    error!(job_id = %job.job_id, status = %status, "Unknown relationship job status");
                    stats.fail_many(job.size);
                }
            }
        }
        pending = still_pending;
    }

    for job in &pending {
        warn!(job_id = %job.job_id, size = job.size, "Relationship job still pending, giving up on it");
    }
}

// ── Deletion ──────────────────────────────────────────────────────────

/// Detach edges of the task's type whose primary→secondary pair no source
/// record declares.
pub async fn delete_relationships(
    ctx: &mut SyncContext,
    task: &Task,
    sources: &[SourceRecord],
) -> SyncResult<TaskStats> {
    let mut stats = TaskStats::default();
    let Some(type_id) = relationship_type_id(ctx, task).await? else {
        return Ok(stats);
    };
    let (key, target_key) = pair_fields(task)?;
    ctx.ensure_collection(&assets_key(), ASSETS_PATH).await?;

    // The name index keeps one asset per name; duplicates have edges too.
    let mut assets: Vec<BasicObject> = ctx
        .target
        .list(ASSETS_PATH, &assets_key().collection)
        .await?
        .iter()
        .filter_map(BasicObject::from_value)
        .collect();
    assets.sort_by_key(|asset| asset.id);

    for asset in &assets {
        let primary_id = asset.display_id_or_id();
        let name = asset.name.clone().unwrap_or_default();
        debug!(asset = %name, "Checking relationships of asset");

        let relationships = match ctx.target.relationships_of(primary_id).await {
            Ok(relationships) => relationships,
            Err(e) => {
                error!(asset = %name, error = %e, "Error reading relationships");
                stats.fail();
                continue;
            }
        };

        for relationship in relationships
            .iter()
            .filter(|r| r.relationship_type_id == type_id && r.primary_id == primary_id)
        {
            let declared = sources.iter().any(|record| {
                field_text(record, key).is_some_and(|k| names_match(&k, &name))
                    && find_asset(ctx, record, target_key)
                        .is_some_and(|secondary| secondary.display_id_or_id() == relationship.secondary_id)
            });
            if declared {
                continue;
            }

            // The cached edge set of the primary keeps this edge: cache
            // entries are never removed during a run.
            match ctx.target.detach_relationship(relationship.id).await {
                Ok(()) => {
                    info!(asset = %name, relationship_id = relationship.id, "Detached relationship");
                    stats.record(RecordOutcome::Deleted);
                }
                Err(e) => {
                    error!(asset = %name, relationship_id = relationship.id, error = %e, "Error detaching relationship");
                    stats.fail();
                }
            }
        }
    }
    Ok(stats)
}
