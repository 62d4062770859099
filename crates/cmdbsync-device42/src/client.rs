//! Device42 HTTP client (reqwest-based).

use std::time::Duration;

use cmdbsync_core::{Device42Settings, ResourceDescriptor, SourceMethod};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Device42Error, Device42Result};
use crate::SourceRecord;

/// Query run when a raw-query resource declares no query text.
pub const DEFAULT_DOQL_QUERY: &str = "SELECT * FROM view_device_v1 order by device_pk";

/// Client for the Device42 REST API.
#[derive(Clone)]
pub struct Device42Client {
    base_url: String,
    user: String,
    password: String,
    http_client: Client,
}

impl std::fmt::Debug for Device42Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device42Client")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl Device42Client {
    /// Create a client from the configured settings.
    ///
    /// Device42 appliances commonly run with self-signed certificates, so
    /// certificate verification is disabled.
    pub fn new(settings: &Device42Settings, timeout: Duration) -> Device42Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Device42Error::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_http_client(settings, http_client))
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(settings: &Device42Settings, http_client: Client) -> Self {
        Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            http_client,
        }
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch every record a task's resource descriptor names.
    ///
    /// A declared raw query wins over the paginated read. A POST resource
    /// without a query yields no records.
    pub async fn fetch(&self, resource: &ResourceDescriptor) -> Device42Result<Vec<SourceRecord>> {
        let path = resource.filtered_path();
        let records = if let Some(query) = resource.raw_query() {
            self.doql(&path, Some(query)).await?
        } else {
            match resource.method {
                SourceMethod::Get => {
                    let model = resource.model.as_deref().unwrap_or_default();
                    self.request(&path, model).await?
                }
                SourceMethod::Post => {
                    warn!(path = %path, "POST resource without a query, nothing to read");
                    Vec::new()
                }
            }
        };

        info!(path = %path, count = records.len(), "Fetched Device42 records");
        Ok(records)
    }

    /// Read a paginated collection.
    ///
    /// The first page is requested without paging parameters; when it reports
    /// a `limit` and a larger `total_count`, the remaining pages are read with
    /// `offset`/`limit` until the total is covered.
    pub async fn request(&self, path: &str, model: &str) -> Device42Result<Vec<SourceRecord>> {
        let first = self.get(path, &[]).await?;
        let mut records = Self::extract_records(path, &first, model)?;

        let limit = first.get("limit").and_then(Value::as_u64).unwrap_or(0);
        let total_count = first.get("total_count").and_then(Value::as_u64).unwrap_or(0);
        if limit == 0 {
            return Ok(records);
        }

        let mut offset = limit;
        while offset < total_count {
            debug!(path = %path, offset = offset, limit = limit, total = total_count, "Reading Device42 page");
            let page = self
                .get(path, &[("offset", offset.to_string()), ("limit", limit.to_string())])
                .await?;
            records.extend(Self::extract_records(path, &page, model)?);
            offset += limit;
        }

        Ok(records)
    }

    /// Run a DOQL query and return its rows.
    pub async fn doql(&self, path: &str, query: Option<&str>) -> Device42Result<Vec<SourceRecord>> {
        let query = query.unwrap_or(DEFAULT_DOQL_QUERY);
        let path = if path.ends_with('/') || path.contains('?') {
            path.to_string()
        } else {
            format!("{path}/")
        };

        debug!(path = %path, "Running DOQL query");
        let response = self
            .http_client
            .post(self.url(&path))
            .basic_auth(&self.user, Some(&self.password))
            .form(&[("output_type", "json"), ("query", query)])
            .send()
            .await?;
        let body = self.handle_response(Method::POST, &path, response).await?;

        match body {
            Value::Array(rows) => Ok(rows.into_iter().filter_map(into_record).collect()),
            other => Err(Device42Error::Parse {
                path,
                message: format!("expected a list of rows, got {}", json_kind(&other)),
            }),
        }
    }

    // ── Internal HTTP Methods ─────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Device42Result<Value> {
        debug!(path = %path, "Device42 GET");
        let mut builder = self
            .http_client
            .get(self.url(path))
            .basic_auth(&self.user, Some(&self.password));
        if !params.is_empty() {
            builder = builder.query(params);
        }
        let response = builder.send().await?;
        self.handle_response(Method::GET, path, response).await
    }

    async fn handle_response(
        &self,
        method: Method,
        path: &str,
        response: reqwest::Response,
    ) -> Device42Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Device42Error::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Device42Error::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn extract_records(path: &str, body: &Value, model: &str) -> Device42Result<Vec<SourceRecord>> {
        match body.get(model) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.iter().cloned().filter_map(into_record).collect()),
            Some(other) => Err(Device42Error::Parse {
                path: path.to_string(),
                message: format!("'{model}' is {} instead of a list", json_kind(other)),
            }),
        }
    }
}

fn into_record(value: Value) -> Option<SourceRecord> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(url: &str) -> Device42Settings {
        Device42Settings {
            url: url.to_string(),
            user: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn test_url_joins_path() {
        let client = Device42Client::with_http_client(&settings("https://d42.local/"), Client::new());
        assert_eq!(client.url("/api/1.0/devices/all/"), "https://d42.local/api/1.0/devices/all/");
        assert_eq!(client.url("api/1.0/devices/all/"), "https://d42.local/api/1.0/devices/all/");
    }

    #[test]
    fn test_extract_records_missing_model_is_empty() {
        let body = json!({"total_count": 0});
        assert!(Device42Client::extract_records("p", &body, "Devices").unwrap().is_empty());
    }

    #[test]
    fn test_extract_records_skips_non_objects() {
        let body = json!({"Devices": [{"name": "a"}, 5, {"name": "b"}]});
        let records = Device42Client::extract_records("p", &body, "Devices").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["name"], "b");
    }

    #[test]
    fn test_extract_records_rejects_scalar_model() {
        let body = json!({"Devices": "oops"});
        assert!(matches!(
            Device42Client::extract_records("p", &body, "Devices"),
            Err(Device42Error::Parse { .. })
        ));
    }

    #[test]
    fn test_debug_hides_password() {
        let client = Device42Client::with_http_client(&settings("https://d42.local"), Client::new());
        assert!(!format!("{client:?}").contains("secret"));
    }
}
