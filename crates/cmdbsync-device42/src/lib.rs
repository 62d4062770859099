//! # Device42 client
//!
//! Read-only access to the Device42 source: paginated REST collections and
//! DOQL queries. Every source record is returned as a loose JSON object so
//! the mapping engine can address arbitrary attributes.

pub mod client;
pub mod error;

pub use client::{Device42Client, DEFAULT_DOQL_QUERY};
pub use error::{Device42Error, Device42Result};

/// A source record as returned by Device42.
pub type SourceRecord = serde_json::Map<String, serde_json::Value>;
