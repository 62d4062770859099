//! Freshservice wire models.

use cmdbsync_core::text::normalize_spaces;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the generic server asset type.
pub const SERVER_ASSET_TYPE: &str = "Server";

/// Record kinds the client can create, update and delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Asset,
    Application,
    Product,
    Contract,
}

impl RecordKind {
    /// Collection name, used both in the API path and as the list response key.
    #[must_use]
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Asset => "assets",
            RecordKind::Application => "applications",
            RecordKind::Product => "products",
            RecordKind::Contract => "contracts",
        }
    }

    /// Key wrapping a single record in create/update responses.
    #[must_use]
    pub fn singular(&self) -> &'static str {
        match self {
            RecordKind::Asset => "asset",
            RecordKind::Application => "application",
            RecordKind::Product => "product",
            RecordKind::Contract => "contract",
        }
    }

    /// API path of the collection.
    #[must_use]
    pub fn path(&self) -> String {
        format!("api/v2/{}", self.collection())
    }

    /// Resolve a target model name to a record kind.
    #[must_use]
    pub fn from_collection(model: &str) -> Option<Self> {
        match model.trim().to_lowercase().as_str() {
            "assets" | "asset" => Some(RecordKind::Asset),
            "applications" | "application" | "software" => Some(RecordKind::Application),
            "products" | "product" => Some(RecordKind::Product),
            "contracts" | "contract" => Some(RecordKind::Contract),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.singular())
    }
}

/// Minimal projection of a target record kept in the object cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicObject {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type_id: Option<i64>,
}

impl BasicObject {
    /// Project a raw record. Returns `None` when it carries no numeric `id`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("id").and_then(Value::as_i64)?;
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let number = |key: &str| value.get(key).and_then(Value::as_i64);

        Some(Self {
            id,
            name: text("name").map(|n| normalize_spaces(&n)),
            display_id: number("display_id"),
            email: text("email"),
            agent_id: number("agent_id"),
            asset_type_id: number("asset_type_id"),
        })
    }

    /// Identifier used in asset-scoped endpoints, falling back to `id`.
    #[must_use]
    pub fn display_id_or_id(&self) -> i64 {
        self.display_id.unwrap_or(self.id)
    }
}

/// Asset type (CI type) declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetType {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_asset_type_id: Option<i64>,
}

/// One field of an asset type schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTypeField {
    /// Qualified field name; type-specific fields carry an `_<asset_type_id>` suffix.
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Owning asset type; `None` for fields shared by every type.
    #[serde(default)]
    pub asset_type_id: Option<i64>,
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub choices: Vec<Value>,
}

impl AssetTypeField {
    /// Labels of the declared choices.
    ///
    /// Choices come either as plain strings, as `[label, id]` pairs, or as
    /// objects carrying a `value` or `name`.
    #[must_use]
    pub fn choice_labels(&self) -> Vec<String> {
        self.choices
            .iter()
            .filter_map(|choice| match choice {
                Value::String(s) => Some(s.clone()),
                Value::Array(pair) => pair.first().and_then(Value::as_str).map(str::to_string),
                Value::Object(map) => map
                    .get("value")
                    .or_else(|| map.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect()
    }

    /// Whether the field belongs to a specific asset type and goes under `type_fields`.
    #[must_use]
    pub fn is_type_specific(&self) -> bool {
        self.asset_type_id.is_some()
    }
}

/// Fields grouped under one header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTypeFieldSection {
    pub field_header: String,
    #[serde(default)]
    pub fields: Vec<AssetTypeField>,
}

/// Complete field schema of one asset type.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetTypeSchema {
    pub asset_type_id: i64,
    pub sections: Vec<AssetTypeFieldSection>,
}

impl AssetTypeSchema {
    /// Find the schema field a rule writes to.
    ///
    /// `base_name` is compared after appending `_<asset_type_id>` for
    /// type-specific fields. Without a header every section is searched.
    #[must_use]
    pub fn find_field(&self, header: Option<&str>, base_name: &str) -> Option<&AssetTypeField> {
        self.sections
            .iter()
            .filter(|section| header.map_or(true, |h| section.field_header == h))
            .flat_map(|section| section.fields.iter())
            .find(|field| match field.asset_type_id {
                Some(type_id) => field.name == format!("{base_name}_{type_id}"),
                None => field.name == base_name,
            })
    }
}

/// Relationship type, identified by its two relation names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipType {
    pub id: i64,
    #[serde(default)]
    pub downstream_relation: String,
    #[serde(default)]
    pub upstream_relation: String,
}

impl RelationshipType {
    /// Whether the type declares these forward (downstream) and backward (upstream) names.
    #[must_use]
    pub fn matches(&self, forward: &str, backward: &str) -> bool {
        self.downstream_relation == forward && self.upstream_relation == backward
    }
}

/// Existing relationship of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub relationship_type_id: i64,
    pub primary_id: i64,
    #[serde(default)]
    pub primary_type: Option<String>,
    pub secondary_id: i64,
    #[serde(default)]
    pub secondary_type: Option<String>,
}

/// Relationship queued for bulk creation. Both sides are asset display ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub relationship_type_id: i64,
    pub primary_id: i64,
    pub primary_type: String,
    pub secondary_id: i64,
    pub secondary_type: String,
}

impl RelationshipEdge {
    /// Edge between two assets.
    #[must_use]
    pub fn between_assets(relationship_type_id: i64, primary_id: i64, secondary_id: i64) -> Self {
        Self {
            relationship_type_id,
            primary_id,
            primary_type: "asset".to_string(),
            secondary_id,
            secondary_type: "asset".to_string(),
        }
    }
}

/// Status of an asynchronous job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Queued,
    InProgress,
    Success,
    Partial,
    Failed,
    /// Any status the client does not know.
    Unknown(String),
}

impl JobStatus {
    /// Whether the job has not finished yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::InProgress)
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in progress",
            JobStatus::Success => "success",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
            JobStatus::Unknown(s) => s,
        }
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().replace('_', " ").as_str() {
            "queued" => JobStatus::Queued,
            "in progress" => JobStatus::InProgress,
            "success" => JobStatus::Success,
            "partial" => JobStatus::Partial,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Unknown(value),
        }
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-relationship result reported by a bulk-create job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRelationship {
    #[serde(default)]
    pub primary_id: Option<i64>,
    #[serde(default)]
    pub secondary_id: Option<i64>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Bulk-create job state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub status: JobStatus,
    #[serde(default)]
    pub relationships: Vec<JobRelationship>,
}

impl Job {
    /// Relationships the job failed to create.
    pub fn failures(&self) -> impl Iterator<Item = &JobRelationship> {
        self.relationships.iter().filter(|r| !r.success)
    }
}
