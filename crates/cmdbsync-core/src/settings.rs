//! Backend connection settings.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Source (Device42) connection settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device42Settings {
    /// Base URL, e.g. `https://d42.example.com`.
    pub url: String,
    /// Basic-auth user.
    pub user: String,
    /// Basic-auth password.
    pub password: String,
}

impl std::fmt::Debug for Device42Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device42Settings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Target (Freshservice) connection settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshServiceSettings {
    /// Base URL. A bare domain is accepted and served over HTTPS.
    pub url: String,
    /// API key.
    pub api_key: String,
    /// Email of the agent approving newly created contracts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_approver: Option<String>,
}

impl std::fmt::Debug for FreshServiceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshServiceSettings")
            .field("url", &self.url)
            .field("api_key", &"***")
            .field("default_approver", &self.default_approver)
            .finish()
    }
}

/// Relationship batching and job polling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTuning {
    /// Relationships submitted per bulk-create job.
    #[serde(default = "default_batch_size")]
    pub relationship_batch_size: usize,
    /// Assumed creation throughput of the target, used to size the poll interval.
    #[serde(default = "default_relationships_per_second")]
    pub relationships_per_second: f64,
    /// Extra share of poll attempts on top of one per submitted job.
    #[serde(default = "default_poll_safety_margin")]
    pub poll_safety_margin: f64,
}

fn default_batch_size() -> usize {
    20
}

fn default_relationships_per_second() -> f64 {
    2.0
}

fn default_poll_safety_margin() -> f64 {
    0.2
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            relationship_batch_size: default_batch_size(),
            relationships_per_second: default_relationships_per_second(),
            poll_safety_margin: default_poll_safety_margin(),
        }
    }
}

impl SyncTuning {
    /// Validate the tuning values.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.relationship_batch_size == 0 {
            return Err(ConfigError::invalid(
                "sync",
                "relationship-batch-size must be greater than zero",
            ));
        }
        if !(self.relationships_per_second > 0.0) {
            return Err(ConfigError::invalid(
                "sync",
                "relationships-per-second must be greater than zero",
            ));
        }
        if self.poll_safety_margin < 0.0 {
            return Err(ConfigError::invalid(
                "sync",
                "poll-safety-margin must not be negative",
            ));
        }
        Ok(())
    }
}

/// All backend settings of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub device42: Device42Settings,
    pub freshservice: FreshServiceSettings,
    #[serde(default)]
    pub sync: SyncTuning,
}

impl Settings {
    /// Validate URLs and tuning.
    pub fn validate(&self) -> ConfigResult<()> {
        url::Url::parse(&self.device42.url).map_err(|e| {
            ConfigError::invalid("settings.device42", format!("invalid url '{}': {e}", self.device42.url))
        })?;
        let fs_url = self.freshservice_base_url();
        url::Url::parse(&fs_url).map_err(|e| {
            ConfigError::invalid("settings.freshservice", format!("invalid url '{fs_url}': {e}"))
        })?;
        if self.freshservice.api_key.trim().is_empty() {
            return Err(ConfigError::invalid("settings.freshservice", "api_key is empty"));
        }
        self.sync.validate()
    }

    /// Freshservice base URL with a scheme.
    #[must_use]
    pub fn freshservice_base_url(&self) -> String {
        let url = self.freshservice.url.trim().trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        }
    }
}
