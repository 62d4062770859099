//! # cmdbsync engine
//!
//! Field mapping engine, reconcilers and task executor of the Device42 to
//! Freshservice CMDB sync.
//!
//! A run builds one [`SyncContext`] from the mapping file's settings and
//! hands it to [`run_tasks`]. Tasks execute in declaration order on a single
//! thread; lookups cached by one task are reused by the next.
//!
//! ## Crate Organization
//!
//! - [`context`] - Run context: both clients, the object cache, run options
//! - [`mapping`] - Per-field resolution, validation and payload assembly
//! - [`reconcile`] - Create/update/delete decisions per task type
//! - [`retry`] - Degrade-and-retry policy for duplicate-value conflicts
//! - [`executor`] - Task dispatch
//! - [`stats`] - Per-task counters
//! - [`error`] - Sync errors

pub mod context;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod reconcile;
pub mod retry;
pub mod stats;

pub use context::{SyncContext, SyncOptions};
pub use error::{SyncError, SyncResult};
pub use executor::{run_task, run_tasks, TaskReport};
pub use retry::{DegradePolicy, DegradeState, RetryDecision};
pub use stats::{RecordOutcome, TaskStats};
