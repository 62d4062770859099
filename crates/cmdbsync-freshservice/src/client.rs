//! Freshservice HTTP client (reqwest-based).
//!
//! Every request goes through [`FreshServiceClient::send`], which:
//! 1. Authenticates with the API key (basic auth, password `X`)
//! 2. Waits out `429 Too Many Requests` for the advertised `Retry-After`
//!    (or [`DEFAULT_RETRY_AFTER`]) and retries without bound
//! 3. Classifies uniqueness violations as [`FreshServiceError::DuplicateValue`]

use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{is_duplicate_value_body, FreshServiceError, FreshServiceResult};
use crate::models::{
    AssetType, AssetTypeFieldSection, AssetTypeSchema, BasicObject, Job, RecordKind, Relationship,
    RelationshipEdge, RelationshipType,
};
use crate::token::{TokenCache, INTEGRATION_NAME_HEADER};

/// Wait applied to a 429 response without a usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Client configuration.
#[derive(Clone)]
pub struct FreshServiceConfig {
    /// Base URL including scheme.
    pub base_url: String,
    /// API key.
    pub api_key: String,
    /// Wait applied to a 429 without `Retry-After`.
    pub default_retry_after: Duration,
    /// Records requested per page.
    pub page_size: u32,
    /// Request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for FreshServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("default_retry_after", &self.default_retry_after)
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FreshServiceConfig {
    /// Create a configuration with default paging and rate-limit behavior.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_retry_after: DEFAULT_RETRY_AFTER,
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(60),
        }
    }

    /// Set the wait used when a 429 carries no `Retry-After`.
    #[must_use]
    pub fn with_default_retry_after(mut self, wait: Duration) -> Self {
        self.default_retry_after = wait;
        self
    }

    /// Set the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for the Freshservice v2 API.
pub struct FreshServiceClient {
    config: FreshServiceConfig,
    http_client: Client,
    token: Mutex<TokenCache>,
}

impl std::fmt::Debug for FreshServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshServiceClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FreshServiceClient {
    /// Create a new client.
    pub fn new(config: FreshServiceConfig) -> FreshServiceResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                FreshServiceError::InvalidConfig(format!("Failed to build HTTP client: {e}"))
            })?;

        let config = FreshServiceConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };

        Ok(Self {
            config,
            http_client,
            token: Mutex::new(TokenCache::default()),
        })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    // ── Reads ─────────────────────────────────────────────────────────

    /// Read every page of a collection.
    ///
    /// Pages are requested until one comes back empty or without `key`.
    pub async fn list(&self, path: &str, key: &str) -> FreshServiceResult<Vec<Value>> {
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let query = [
                ("page", page.to_string()),
                ("per_page", self.config.page_size.to_string()),
            ];
            let body = self.send(Method::GET, path, &query, None, false).await?;
            match body.get(key) {
                Some(Value::Array(batch)) if !batch.is_empty() => {
                    items.extend(batch.iter().cloned());
                }
                _ => break,
            }
            page += 1;
        }

        debug!(path = %path, count = items.len(), "Read Freshservice collection");
        Ok(items)
    }

    /// All asset types.
    pub async fn asset_types(&self) -> FreshServiceResult<Vec<AssetType>> {
        let path = "api/v2/asset_types";
        self.list(path, "asset_types")
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| FreshServiceError::unexpected(path, e.to_string())))
            .collect()
    }

    /// Field schema of one asset type.
    pub async fn asset_type_fields(&self, asset_type_id: i64) -> FreshServiceResult<AssetTypeSchema> {
        let path = format!("api/v2/asset_types/{asset_type_id}/fields");
        let body = self.send(Method::GET, &path, &[], None, false).await?;
        let sections = body
            .get("asset_type_fields")
            .cloned()
            .ok_or_else(|| FreshServiceError::unexpected(&path, "missing 'asset_type_fields'"))?;
        let sections: Vec<AssetTypeFieldSection> = serde_json::from_value(sections)
            .map_err(|e| FreshServiceError::unexpected(&path, e.to_string()))?;

        Ok(AssetTypeSchema {
            asset_type_id,
            sections,
        })
    }

    /// All agents.
    pub async fn agents(&self) -> FreshServiceResult<Vec<Value>> {
        self.list("api/v2/agents", "agents").await
    }

    /// All relationship types.
    pub async fn relationship_types(&self) -> FreshServiceResult<Vec<RelationshipType>> {
        let path = "api/v2/relationship_types";
        self.list(path, "relationship_types")
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| FreshServiceError::unexpected(path, e.to_string())))
            .collect()
    }

    /// Relationships of an asset.
    pub async fn relationships_of(&self, display_id: i64) -> FreshServiceResult<Vec<Relationship>> {
        let path = format!("api/v2/assets/{display_id}/relationships");
        self.list(&path, "relationships")
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| FreshServiceError::unexpected(&path, e.to_string())))
            .collect()
    }

    /// Installations of an application.
    pub async fn installations(&self, application_id: i64) -> FreshServiceResult<Vec<Value>> {
        self.list(&format!("api/v2/applications/{application_id}/installations"), "installations")
            .await
    }

    /// Assets associated with a contract.
    pub async fn associated_assets(&self, contract_id: i64) -> FreshServiceResult<Vec<Value>> {
        self.list(&format!("api/v2/contracts/{contract_id}/associated-assets"), "associated_assets")
            .await
    }

    /// State of an asynchronous job.
    pub async fn job(&self, job_id: &str) -> FreshServiceResult<Job> {
        let path = format!("api/v2/jobs/{job_id}");
        let body = self.send(Method::GET, &path, &[], None, false).await?;
        serde_json::from_value(body).map_err(|e| FreshServiceError::unexpected(&path, e.to_string()))
    }

    // ── Writes ────────────────────────────────────────────────────────

    /// Create a record and return its cacheable projection.
    pub async fn insert(&self, kind: RecordKind, payload: &Value) -> FreshServiceResult<BasicObject> {
        let path = kind.path();
        let integration = kind == RecordKind::Asset;
        let body = self.send(Method::POST, &path, &[], Some(payload), integration).await?;
        Self::unwrap_record(&path, &body, kind.singular())
    }

    /// Update a record by id (display id for assets) and return its id.
    pub async fn update(&self, kind: RecordKind, id: i64, payload: &Value) -> FreshServiceResult<i64> {
        let path = format!("{}/{id}", kind.path());
        let integration = kind == RecordKind::Asset;
        let body = self.send(Method::PUT, &path, &[], Some(payload), integration).await?;
        Ok(Self::unwrap_record(&path, &body, kind.singular())?.id)
    }

    /// Permanently delete a record.
    ///
    /// Assets are moved to the trash first and then deleted forever.
    pub async fn delete(&self, kind: RecordKind, id: i64) -> FreshServiceResult<()> {
        let path = format!("{}/{id}", kind.path());
        match kind {
            RecordKind::Asset => {
                self.send(Method::DELETE, &path, &[], None, false).await?;
                self.send(Method::PUT, &format!("{path}/delete_forever"), &[], None, false)
                    .await?;
            }
            RecordKind::Application | RecordKind::Product => {
                self.send(Method::DELETE, &path, &[], None, false).await?;
            }
            RecordKind::Contract => {
                return Err(FreshServiceError::unexpected(&path, "contracts cannot be deleted"));
            }
        }
        Ok(())
    }

    /// Create a record in a lookup collection (vendors, products, groups, ...)
    /// from its name alone and return the created object.
    pub async fn insert_by_name(
        &self,
        collection: &str,
        name_field: &str,
        name: &str,
        asset_type_id: Option<i64>,
    ) -> FreshServiceResult<BasicObject> {
        let path = format!("api/v2/{collection}");
        let mut payload = json!({ name_field: name });
        if let Some(type_id) = asset_type_id {
            payload["asset_type_id"] = json!(type_id);
        }

        let body = self.send(Method::POST, &path, &[], Some(&payload), false).await?;
        body.as_object()
            .and_then(|map| map.values().next())
            .and_then(BasicObject::from_value)
            .ok_or_else(|| FreshServiceError::unexpected(&path, "created object has no id"))
    }

    /// Associate assets with a contract. `asset_ids` is the complete set.
    pub async fn associate_assets(&self, contract_id: i64, asset_ids: &[i64]) -> FreshServiceResult<()> {
        let path = format!("api/v2/contracts/{contract_id}");
        let payload = json!({ "associated_asset_ids": asset_ids });
        self.send(Method::PUT, &path, &[], Some(&payload), false).await?;
        Ok(())
    }

    /// Install an application on an asset and return the installation id.
    pub async fn insert_installation(
        &self,
        application_id: i64,
        payload: &Value,
    ) -> FreshServiceResult<Option<i64>> {
        let path = format!("api/v2/applications/{application_id}/installations");
        let body = self.send(Method::POST, &path, &[], Some(payload), false).await?;
        Ok(body
            .get("installation")
            .and_then(|i| i.get("id"))
            .and_then(Value::as_i64))
    }

    /// Submit a bulk relationship-create job and return its id.
    pub async fn bulk_create_relationships(&self, edges: &[RelationshipEdge]) -> FreshServiceResult<String> {
        let path = "api/v2/relationships/bulk-create";
        let payload = json!({ "relationships": edges });
        let body = self.send(Method::POST, path, &[], Some(&payload), false).await?;

        match body.get("job_id") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(FreshServiceError::unexpected(path, "missing 'job_id'")),
        }
    }

    /// Remove a relationship.
    pub async fn detach_relationship(&self, relationship_id: i64) -> FreshServiceResult<()> {
        let query = [("ids", relationship_id.to_string())];
        self.send(Method::DELETE, "api/v2/relationships", &query, None, false)
            .await?;
        Ok(())
    }

    // ── Internal HTTP Methods ─────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and return its JSON body (`Null` for empty bodies).
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        integration: bool,
    ) -> FreshServiceResult<Value> {
        let url = self.url(path);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let mut builder = self
                .http_client
                .request(method.clone(), &url)
                .basic_auth(&self.config.api_key, Some("X"));
            if !query.is_empty() {
                builder = builder.query(query);
            }
            if let Some(json_body) = body {
                builder = builder.json(json_body);
            }
            if integration {
                let token = self.token.lock().await.token(&self.config.api_key)?;
                builder = builder.header(INTEGRATION_NAME_HEADER, token);
            }

            debug!(method = %method, url = %url, attempt = attempt, "Sending Freshservice request");
            let response = builder.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = self.retry_after(&response);
                warn!(
                    method = %method,
                    url = %url,
                    attempt = attempt,
                    wait_ms = wait.as_millis(),
                    "Rate limited (429), waiting before retry"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                return Err(self.handle_error_response(&method, path, response).await);
            }

            if method == Method::DELETE || status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }

            let text = response.text().await?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text)
                .map_err(|e| FreshServiceError::unexpected(path, format!("invalid JSON: {e}")));
        }
    }

    fn retry_after(&self, response: &reqwest::Response) -> Duration {
        let Some(raw) = response.headers().get(header::RETRY_AFTER) else {
            return self.config.default_retry_after;
        };
        match raw.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) {
            Some(seconds) => Duration::from_secs(seconds),
            None => {
                info!(value = ?raw, "Unparseable Retry-After header, using default wait");
                self.config.default_retry_after
            }
        }
    }

    async fn handle_error_response(
        &self,
        method: &Method,
        path: &str,
        response: reqwest::Response,
    ) -> FreshServiceError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        if status == StatusCode::BAD_REQUEST && is_duplicate_value_body(&body) {
            return FreshServiceError::DuplicateValue {
                method: method.to_string(),
                path: path.to_string(),
                body,
            };
        }

        FreshServiceError::Status {
            method: method.to_string(),
            path: path.to_string(),
            status: status.as_u16(),
            body,
        }
    }

    fn unwrap_record(path: &str, body: &Value, key: &str) -> FreshServiceResult<BasicObject> {
        body.get(key)
            .and_then(BasicObject::from_value)
            .ok_or_else(|| FreshServiceError::unexpected(path, format!("missing '{key}' with an id")))
    }
}
