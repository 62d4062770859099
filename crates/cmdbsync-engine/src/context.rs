//! Run context shared by every task.
//!
//! One [`SyncContext`] is built per run and passed by `&mut` to every
//! reconciler and mapping operation. It owns both backend clients and the
//! [`ObjectCache`], so lookups populated by one task are reused by the next.

use std::sync::Arc;
use std::time::Duration;

use cmdbsync_core::{Settings, SyncTuning};
use cmdbsync_device42::Device42Client;
use cmdbsync_freshservice::{
    AssetType, AssetTypeSchema, BasicObject, CollectionKey, FreshServiceClient, FreshServiceConfig,
    ObjectCache, RelationshipType,
};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

/// Request timeout for both backends.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Collection of agents, indexed by email for approver lookups.
fn agents_by_email() -> CollectionKey {
    CollectionKey::new("agents", "email")
}

/// Run options derived from the settings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Relationships per bulk-create job.
    pub batch_size: usize,
    /// Wait between job polls.
    pub poll_interval: Duration,
    /// Extra share of poll rounds on top of one per job.
    pub poll_safety_margin: f64,
    /// Email of the agent approving new contracts.
    pub default_approver: Option<String>,
}

impl SyncOptions {
    /// Derive options from the sync tuning: the poll interval is the time the
    /// target needs to create one batch at the assumed throughput.
    #[must_use]
    pub fn from_tuning(tuning: &SyncTuning, default_approver: Option<String>) -> Self {
        let batch_size = tuning.relationship_batch_size.max(1);
        let poll_interval =
            Duration::from_secs_f64(batch_size as f64 / tuning.relationships_per_second);
        Self {
            batch_size,
            poll_interval,
            poll_safety_margin: tuning.poll_safety_margin.max(0.0),
            default_approver,
        }
    }

    /// Poll rounds allowed for `jobs` submitted jobs.
    #[must_use]
    pub fn poll_attempts(&self, jobs: usize) -> usize {
        let attempts = (jobs as f64 * (1.0 + self.poll_safety_margin)).ceil() as usize;
        attempts.max(1)
    }
}

/// State of one sync run.
#[derive(Debug)]
pub struct SyncContext {
    pub source: Device42Client,
    pub target: FreshServiceClient,
    pub cache: ObjectCache,
    pub options: SyncOptions,
    approver_id: Option<i64>,
}

impl SyncContext {
    /// Create a context from ready clients.
    #[must_use]
    pub fn new(source: Device42Client, target: FreshServiceClient, options: SyncOptions) -> Self {
        Self {
            source,
            target,
            cache: ObjectCache::new(),
            options,
            approver_id: None,
        }
    }

    /// Build both clients from the settings.
    pub fn from_settings(settings: &Settings) -> SyncResult<Self> {
        let source = Device42Client::new(&settings.device42, REQUEST_TIMEOUT)?;
        let target = FreshServiceClient::new(
            FreshServiceConfig::new(settings.freshservice_base_url(), &settings.freshservice.api_key)
                .with_timeout(REQUEST_TIMEOUT),
        )?;
        let options =
            SyncOptions::from_tuning(&settings.sync, settings.freshservice.default_approver.clone());

        Ok(Self::new(source, target, options))
    }

    // ── Collections ───────────────────────────────────────────────────

    /// Index a collection from `path` unless it is already cached.
    pub async fn ensure_collection(&mut self, key: &CollectionKey, path: &str) -> SyncResult<()> {
        if self.cache.is_loaded(key) {
            return Ok(());
        }
        info!(collection = %key, "Getting all existing objects in Freshservice");
        let records = self.target.list(path, &key.collection).await?;
        debug!(collection = %key, count = records.len(), "Indexed collection");
        self.cache.load(key.clone(), &records);
        Ok(())
    }

    /// Find an object of `collection` (read from `api/v2/<collection>`) by its name field.
    pub async fn find_object(
        &mut self,
        key: &CollectionKey,
        name: &str,
    ) -> SyncResult<Option<BasicObject>> {
        let path = format!("api/v2/{}", key.collection);
        self.ensure_collection(key, &path).await?;
        Ok(self.cache.find(key, name).cloned())
    }

    // ── Asset types ───────────────────────────────────────────────────

    /// Load the asset types unless cached.
    pub async fn ensure_asset_types(&mut self) -> SyncResult<()> {
        if self.cache.asset_types().is_none() {
            let types = self.target.asset_types().await?;
            debug!(count = types.len(), "Loaded asset types");
            self.cache.set_asset_types(types);
        }
        Ok(())
    }

    /// Asset type by name.
    pub async fn asset_type_by_name(&mut self, name: &str) -> SyncResult<Option<AssetType>> {
        self.ensure_asset_types().await?;
        Ok(self.cache.asset_type_by_name(name).cloned())
    }

    /// Asset type by id.
    pub async fn asset_type(&mut self, id: i64) -> SyncResult<Option<AssetType>> {
        self.ensure_asset_types().await?;
        Ok(self.cache.asset_type(id).cloned())
    }

    /// Field schema of an asset type, fetched once per run.
    pub async fn schema(&mut self, asset_type_id: i64) -> SyncResult<Arc<AssetTypeSchema>> {
        if let Some(schema) = self.cache.schema(asset_type_id) {
            return Ok(schema);
        }
        let schema = self.target.asset_type_fields(asset_type_id).await?;
        Ok(self.cache.insert_schema(schema))
    }

    // ── Relationship types ────────────────────────────────────────────

    /// Relationship type declared with these forward and backward names.
    pub async fn relationship_type(
        &mut self,
        forward: &str,
        backward: &str,
    ) -> SyncResult<Option<RelationshipType>> {
        if self.cache.relationship_types().is_none() {
            let types = self.target.relationship_types().await?;
            self.cache.set_relationship_types(types);
        }
        Ok(self
            .cache
            .relationship_types()
            .and_then(|types| types.iter().find(|t| t.matches(forward, backward)))
            .cloned())
    }

    // ── Contract approver ─────────────────────────────────────────────

    /// Resolve the configured approver email to an agent id.
    ///
    /// Called once before any contract task runs. A missing or unknown
    /// approver is only logged here; every contract create fails later.
    pub async fn resolve_approver(&mut self) -> SyncResult<Option<i64>> {
        let Some(email) = self.options.default_approver.clone() else {
            warn!("No default approver configured, contracts cannot be created");
            return Ok(None);
        };

        let key = agents_by_email();
        self.ensure_collection(&key, "api/v2/agents").await?;
        self.approver_id = self.cache.find(&key, &email).map(|agent| agent.id);

        match self.approver_id {
            Some(id) => info!(approver = %email, agent_id = id, "Resolved contract approver"),
            None => warn!(approver = %email, "Default approver is not a Freshservice agent"),
        }
        Ok(self.approver_id)
    }

    /// Agent id approving new contracts.
    pub fn approver_id(&self) -> SyncResult<i64> {
        self.approver_id.ok_or_else(|| match &self.options.default_approver {
            Some(email) => SyncError::missing_approver(format!("no agent with email '{email}'")),
            None => SyncError::missing_approver("default-approver is not configured"),
        })
    }
}
