//! # Freshservice client
//!
//! Read/write access to the Freshservice target: paginated reads, record
//! create/update/delete, relationship bulk-create jobs, and the per-run
//! [`ObjectCache`] that keeps name lookups in memory for the whole run.
//!
//! ## Crate Organization
//!
//! - [`client`] - HTTP client with rate-limit handling and duplicate-value detection
//! - [`models`] - Wire models (asset types, field schemas, relationships, jobs)
//! - [`cache`] - Name-indexed object cache and id-set caches
//! - [`token`] - Integration-name JWT sent with asset writes
//! - [`error`] - Client errors

pub mod cache;
pub mod client;
pub mod error;
pub mod models;
pub mod token;

pub use cache::{CollectionKey, ObjectCache};
pub use client::{FreshServiceClient, FreshServiceConfig, DEFAULT_PAGE_SIZE, DEFAULT_RETRY_AFTER};
pub use error::{FreshServiceError, FreshServiceResult};
pub use models::{
    AssetType, AssetTypeField, AssetTypeFieldSection, AssetTypeSchema, BasicObject, Job,
    JobRelationship, JobStatus, RecordKind, Relationship, RelationshipEdge, RelationshipType,
    SERVER_ASSET_TYPE,
};
