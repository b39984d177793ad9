//! listsync reconciliation engine
//!
//! This module keeps the local store and the remote list service consistent:
//! - Snapshot construction for both sides
//! - Three-way diff against per-record sync watermarks
//! - Last-write-wins conflict resolution (external wins ties)
//! - Pull and push execution with per-record failure isolation
//! - Single-flight orchestration and periodic scheduling

pub mod config;
pub mod conflict;
pub mod diff;
pub mod lock;
pub mod orchestrator;
pub mod pull;
pub mod push;
pub mod report;
pub mod scheduler;
pub mod snapshot;

// Re-export main types
pub use config::SyncConfig;
pub use conflict::{resolve, Resolution};
pub use diff::{ListPair, SyncDiff};
pub use lock::{RunGuard, RunLock};
pub use orchestrator::Orchestrator;
pub use pull::PullExecutor;
pub use push::{linked_item_action, LinkedItemAction, PushExecutor};
pub use report::{BucketCounts, RecordKey, RunOutcome, SyncAction, SyncError, SyncReport};
pub use scheduler::{SyncScheduler, SyncSchedulerHandle};
pub use snapshot::{ExternalItem, ExternalList, ExternalSnapshot, LocalSnapshot};
