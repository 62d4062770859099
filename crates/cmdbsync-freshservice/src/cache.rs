//! Per-run object cache.
//!
//! Collections are indexed by a normalized name (NBSP replaced, lowercased)
//! the first time they are needed and then serve every existence check for
//! the rest of the run. Entries are only ever added: a record created during
//! the run is inserted right after the create so later lookups see it
//! without another fetch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cmdbsync_core::text::{names_match, normalize_name};
use serde_json::Value;

use crate::models::{AssetType, AssetTypeSchema, BasicObject, RelationshipType};

/// Identifies one name index: a collection and the field its records are matched on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    pub collection: String,
    pub name_field: String,
}

impl CollectionKey {
    pub fn new(collection: impl Into<String>, name_field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name_field: name_field.into(),
        }
    }

    /// Index of `collection` by its `name` field.
    pub fn by_name(collection: impl Into<String>) -> Self {
        Self::new(collection, "name")
    }
}

impl std::fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.collection, self.name_field)
    }
}

/// Normalized index key for a raw field value.
///
/// Strings are normalized like names; other scalars use their JSON text.
#[must_use]
pub fn index_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(normalize_name(s)),
        other => Some(other.to_string()),
    }
}

/// Name-indexed lookups shared by every task of a run.
#[derive(Debug, Default)]
pub struct ObjectCache {
    collections: HashMap<CollectionKey, HashMap<String, BasicObject>>,
    asset_types: Option<Vec<AssetType>>,
    relationship_types: Option<Vec<RelationshipType>>,
    schemas: HashMap<i64, Arc<AssetTypeSchema>>,
    installations: HashMap<i64, HashSet<i64>>,
    contract_assets: HashMap<i64, HashSet<i64>>,
    relationships: HashMap<i64, HashMap<i64, HashSet<i64>>>,
}

impl ObjectCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Name indexes ──────────────────────────────────────────────────

    /// Whether the collection has been indexed.
    #[must_use]
    pub fn is_loaded(&self, key: &CollectionKey) -> bool {
        self.collections.contains_key(key)
    }

    /// Index raw records of a collection. Records without an id or without
    /// the name field are skipped; on duplicate names the first record wins.
    pub fn load(&mut self, key: CollectionKey, records: &[Value]) {
        let index = self.collections.entry(key.clone()).or_default();
        for record in records {
            let Some(name) = record.get(&key.name_field).and_then(index_key) else {
                continue;
            };
            if let Some(object) = BasicObject::from_value(record) {
                index.entry(name).or_insert(object);
            }
        }
    }

    /// Look up an object by name.
    #[must_use]
    pub fn find(&self, key: &CollectionKey, name: &str) -> Option<&BasicObject> {
        self.collections.get(key)?.get(&normalize_name(name))
    }

    /// Look up an object by a raw field value.
    #[must_use]
    pub fn find_value(&self, key: &CollectionKey, value: &Value) -> Option<&BasicObject> {
        self.collections.get(key)?.get(&index_key(value)?)
    }

    /// Add an object under `name`, replacing any entry with the same name.
    pub fn insert(&mut self, key: &CollectionKey, name: &str, object: BasicObject) {
        self.collections
            .entry(key.clone())
            .or_default()
            .insert(normalize_name(name), object);
    }

    /// All objects of an indexed collection.
    pub fn objects(&self, key: &CollectionKey) -> impl Iterator<Item = &BasicObject> {
        self.collections.get(key).into_iter().flat_map(|index| index.values())
    }

    // ── Asset types and schemas ───────────────────────────────────────

    #[must_use]
    pub fn asset_types(&self) -> Option<&[AssetType]> {
        self.asset_types.as_deref()
    }

    pub fn set_asset_types(&mut self, types: Vec<AssetType>) {
        self.asset_types = Some(types);
    }

    /// Asset type by name, matched like every other cached name.
    #[must_use]
    pub fn asset_type_by_name(&self, name: &str) -> Option<&AssetType> {
        self.asset_types.as_ref()?.iter().find(|t| names_match(&t.name, name))
    }

    /// Asset type by id.
    #[must_use]
    pub fn asset_type(&self, id: i64) -> Option<&AssetType> {
        self.asset_types.as_ref()?.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn schema(&self, asset_type_id: i64) -> Option<Arc<AssetTypeSchema>> {
        self.schemas.get(&asset_type_id).cloned()
    }

    pub fn insert_schema(&mut self, schema: AssetTypeSchema) -> Arc<AssetTypeSchema> {
        let schema = Arc::new(schema);
        self.schemas.insert(schema.asset_type_id, Arc::clone(&schema));
        schema
    }

    // ── Relationship types ────────────────────────────────────────────

    #[must_use]
    pub fn relationship_types(&self) -> Option<&[RelationshipType]> {
        self.relationship_types.as_deref()
    }

    pub fn set_relationship_types(&mut self, types: Vec<RelationshipType>) {
        self.relationship_types = Some(types);
    }

    // ── Id sets ───────────────────────────────────────────────────────

    /// Asset ids an application is installed on, if fetched.
    #[must_use]
    pub fn installations(&self, application_id: i64) -> Option<&HashSet<i64>> {
        self.installations.get(&application_id)
    }

    pub fn set_installations(&mut self, application_id: i64, asset_ids: HashSet<i64>) {
        self.installations.insert(application_id, asset_ids);
    }

    /// Record a new installation. Returns `false` when it was already known.
    pub fn add_installation(&mut self, application_id: i64, asset_id: i64) -> bool {
        self.installations
            .entry(application_id)
            .or_default()
            .insert(asset_id)
    }

    /// Asset ids associated with a contract, if fetched.
    #[must_use]
    pub fn contract_assets(&self, contract_id: i64) -> Option<&HashSet<i64>> {
        self.contract_assets.get(&contract_id)
    }

    pub fn set_contract_assets(&mut self, contract_id: i64, asset_ids: HashSet<i64>) {
        self.contract_assets.insert(contract_id, asset_ids);
    }

    /// Record a new association. Returns `false` when it was already known.
    pub fn add_contract_asset(&mut self, contract_id: i64, asset_id: i64) -> bool {
        self.contract_assets
            .entry(contract_id)
            .or_default()
            .insert(asset_id)
    }

    // ── Relationship edges ────────────────────────────────────────────

    /// Whether the edges of a primary asset have been fetched.
    #[must_use]
    pub fn has_relationships(&self, primary_id: i64) -> bool {
        self.relationships.contains_key(&primary_id)
    }

    /// Mark a primary asset as fetched, with no edges yet.
    pub fn init_relationships(&mut self, primary_id: i64) {
        self.relationships.entry(primary_id).or_default();
    }

    /// Record an edge of `type_id` from `primary_id` to `secondary_id`.
    /// Returns `false` when it was already known.
    pub fn add_relationship(&mut self, primary_id: i64, type_id: i64, secondary_id: i64) -> bool {
        self.relationships
            .entry(primary_id)
            .or_default()
            .entry(type_id)
            .or_default()
            .insert(secondary_id)
    }

    /// Whether an edge is known.
    #[must_use]
    pub fn has_relationship(&self, primary_id: i64, type_id: i64, secondary_id: i64) -> bool {
        self.relationships
            .get(&primary_id)
            .and_then(|by_type| by_type.get(&type_id))
            .is_some_and(|secondaries| secondaries.contains(&secondary_id))
    }
}
