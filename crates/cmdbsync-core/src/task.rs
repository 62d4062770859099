//! Synchronization tasks.

use serde::{Deserialize, Serialize};

use crate::rule::MappingRule;

/// What a task synchronizes, which selects the reconciler that runs it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Devices and other configuration items written as assets.
    #[default]
    Asset,
    /// Affinity-group dependency edges between assets.
    AffinityGroup,
    /// Business-application edges between assets.
    BusinessApp,
    /// Software titles (target applications).
    Software,
    /// Software installations on assets.
    SoftwareInUse,
    /// Contracts.
    Contract,
    /// Assets associated with contracts.
    ContractAsset,
    /// Products.
    Product,
}

impl TaskKind {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Asset => "asset",
            TaskKind::AffinityGroup => "affinity_group",
            TaskKind::BusinessApp => "business_app",
            TaskKind::Software => "software",
            TaskKind::SoftwareInUse => "software_in_use",
            TaskKind::Contract => "contract",
            TaskKind::ContractAsset => "contract_asset",
            TaskKind::Product => "product",
        }
    }

    /// Whether the task manages relationship edges rather than records.
    #[must_use]
    pub fn is_relationship(&self) -> bool {
        matches!(self, TaskKind::AffinityGroup | TaskKind::BusinessApp)
    }

    /// Whether each source record links two target objects named by the
    /// mapping's `key` and `target-key`.
    #[must_use]
    pub fn links_pair(&self) -> bool {
        self.is_relationship() || matches!(self, TaskKind::SoftwareInUse | TaskKind::ContractAsset)
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "" | "asset" | "device" => Ok(TaskKind::Asset),
            "affinity_group" => Ok(TaskKind::AffinityGroup),
            "business_app" => Ok(TaskKind::BusinessApp),
            "software" => Ok(TaskKind::Software),
            "software_in_use" => Ok(TaskKind::SoftwareInUse),
            "contract" => Ok(TaskKind::Contract),
            "contract_asset" | "contract_association" => Ok(TaskKind::ContractAsset),
            "product" => Ok(TaskKind::Product),
            _ => Err(format!("unknown task type: {s}")),
        }
    }
}

/// HTTP method used to pull the source collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceMethod {
    #[default]
    Get,
    Post,
}

impl SourceMethod {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMethod::Get => "GET",
            SourceMethod::Post => "POST",
        }
    }
}

impl std::str::FromStr for SourceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "GET" => Ok(SourceMethod::Get),
            "POST" => Ok(SourceMethod::Post),
            _ => Err(format!("unsupported source method: {s}")),
        }
    }
}

/// Where the source records come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Source API path.
    pub path: String,
    /// HTTP method.
    #[serde(default)]
    pub method: SourceMethod,
    /// Name of the collection in a paginated response (e.g. `Devices`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Raw query executed instead of a paginated read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doql: Option<String>,
    /// Extra query text appended to the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_filter: Option<String>,
}

impl ResourceDescriptor {
    /// Raw query to run, if one is declared and not blank.
    #[must_use]
    pub fn raw_query(&self) -> Option<&str> {
        self.doql.as_deref().filter(|q| !q.trim().is_empty())
    }

    /// Source path with the extra filter appended.
    #[must_use]
    pub fn filtered_path(&self) -> String {
        match self.extra_filter.as_deref().map(str::trim) {
            Some(filter) if !filter.is_empty() => {
                let filter = filter.trim_start_matches(['?', '&']);
                let separator = if self.path.contains('?') { '&' } else { '?' };
                format!("{}{separator}{filter}", self.path)
            }
            _ => self.path.clone(),
        }
    }
}

/// Where the records are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Target API path.
    pub path: String,
    /// Collection name in target responses (e.g. `assets`).
    pub model: String,
    /// Asset type name new records are created with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    /// Delete target records missing from the source instead of upserting.
    #[serde(default)]
    pub delete: bool,
}

/// Mapping block of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMapping {
    /// Source key: record identity for deletion, primary side for edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Secondary side of an edge or association.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_key: Option<String>,
    /// Forward (downstream) relation name of the relationship type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_relationship: Option<String>,
    /// Backward (upstream) relation name of the relationship type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backward_relationship: Option<String>,
    /// Field rules in declaration order.
    #[serde(default)]
    pub fields: Vec<MappingRule>,
}

/// One synchronization unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Disabled tasks are skipped.
    pub enabled: bool,
    /// Human-readable description used in logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Task type.
    #[serde(default)]
    pub kind: TaskKind,
    /// Source descriptor.
    pub resource: ResourceDescriptor,
    /// Target descriptor.
    pub target: TargetDescriptor,
    /// Mapping block.
    #[serde(default)]
    pub mapping: TaskMapping,
}

impl Task {
    /// Label used in log output.
    #[must_use]
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.target.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(path: &str, filter: Option<&str>) -> ResourceDescriptor {
        ResourceDescriptor {
            path: path.to_string(),
            method: SourceMethod::Get,
            model: Some("Devices".to_string()),
            doql: None,
            extra_filter: filter.map(str::to_string),
        }
    }

    #[test]
    fn test_filtered_path_appends_query() {
        assert_eq!(
            resource("api/1.0/devices/all/", Some("type=virtual")).filtered_path(),
            "api/1.0/devices/all/?type=virtual"
        );
        assert_eq!(
            resource("api/1.0/devices/all/?limit=5", Some("&type=virtual")).filtered_path(),
            "api/1.0/devices/all/?limit=5&type=virtual"
        );
        assert_eq!(
            resource("api/1.0/devices/all/", Some("  ")).filtered_path(),
            "api/1.0/devices/all/"
        );
    }

    #[test]
    fn test_raw_query_ignores_blank() {
        let mut descriptor = resource("services/data/v1.0/query/", None);
        assert!(descriptor.raw_query().is_none());
        descriptor.doql = Some("   ".to_string());
        assert!(descriptor.raw_query().is_none());
        descriptor.doql = Some("select * from view_device_v1".to_string());
        assert_eq!(descriptor.raw_query(), Some("select * from view_device_v1"));
    }

    #[test]
    fn test_task_kind_from_str() {
        assert_eq!("affinity_group".parse::<TaskKind>().unwrap(), TaskKind::AffinityGroup);
        assert_eq!("software-in-use".parse::<TaskKind>().unwrap(), TaskKind::SoftwareInUse);
        assert_eq!("".parse::<TaskKind>().unwrap(), TaskKind::Asset);
        assert!("ticket".parse::<TaskKind>().is_err());
        assert!(TaskKind::BusinessApp.is_relationship());
        assert!(!TaskKind::Contract.is_relationship());
        assert!(TaskKind::ContractAsset.links_pair());
        assert!(!TaskKind::Product.links_pair());
    }
}
