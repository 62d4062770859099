//! # cmdbsync core
//!
//! Domain model for the Device42 to Freshservice CMDB synchronization.
//!
//! The mapping file declares backend settings and an ordered list of tasks.
//! Each task names a source collection, a target collection, and the
//! per-field [`MappingRule`]s that turn a source record into a target payload.
//!
//! ## Crate Organization
//!
//! - [`rule`] - Field mapping rules (addressing mode, coercion, bounds)
//! - [`task`] - Task, resource and target descriptors
//! - [`settings`] - Backend connection settings and sync tuning
//! - [`xml`] - Mapping-file loader
//! - [`text`] - Name normalization and string sanitizing helpers
//! - [`error`] - Configuration errors

pub mod error;
pub mod rule;
pub mod settings;
pub mod task;
pub mod text;
pub mod xml;

pub use error::{ConfigError, ConfigResult};
pub use rule::{FieldAddressing, MappingDefault, MappingRule, TargetType, ValueMapping, ValueMappingItem};
pub use settings::{Device42Settings, FreshServiceSettings, Settings, SyncTuning};
pub use task::{ResourceDescriptor, SourceMethod, TargetDescriptor, Task, TaskKind, TaskMapping};
pub use xml::{load_config, parse_config, SyncConfig};
