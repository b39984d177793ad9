//! Run results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::error;

use listsync_common::{ExternalId, ListId};

/// The action a record-level failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    PullCreate,
    PullUpdate,
    PullDelete,
    PushCreate,
    PushUpdate,
    PushDelete,
    PushDeleteItem,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncAction::PullCreate => "pull_create",
            SyncAction::PullUpdate => "pull_update",
            SyncAction::PullDelete => "pull_delete",
            SyncAction::PushCreate => "push_create",
            SyncAction::PushUpdate => "push_update",
            SyncAction::PushDelete => "push_delete",
            SyncAction::PushDeleteItem => "push_delete_item",
        };
        f.write_str(name)
    }
}

/// Identifies the record a failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKey {
    External(ExternalId),
    Local(ListId),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::External(id) => write!(f, "{}", id),
            RecordKey::Local(id) => write!(f, "local id {}", id),
        }
    }
}

/// One isolated record-level failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncError {
    pub action: SyncAction,
    pub key: RecordKey,
    pub message: String,
}

impl SyncError {
    pub fn new(action: SyncAction, key: RecordKey, error: impl fmt::Display) -> Self {
        Self {
            action,
            key,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for {}: {}", self.action, self.key, self.message)
    }
}

/// Build a record-level failure and log it.
pub(crate) fn record(action: SyncAction, key: RecordKey, e: impl fmt::Display) -> SyncError {
    let failure = SyncError::new(action, key, e);
    error!("{}", failure);
    failure
}

/// Number of entries classified into each bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub pull_creates: usize,
    pub pull_updates: usize,
    pub pull_deletes: usize,
    pub push_creates: usize,
    pub push_updates: usize,
    pub push_deletes: usize,
}

impl BucketCounts {
    pub fn total(&self) -> usize {
        self.pull_creates
            + self.pull_updates
            + self.pull_deletes
            + self.push_creates
            + self.push_updates
            + self.push_deletes
    }
}

impl fmt::Display for BucketCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pull: {} created, {} updated, {} deleted; push: {} created, {} updated, {} deleted",
            self.pull_creates,
            self.pull_updates,
            self.pull_deletes,
            self.push_creates,
            self.push_updates,
            self.push_deletes
        )
    }
}

/// Aggregated result of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub counts: BucketCounts,
    pub errors: Vec<SyncError>,
    pub duration: Duration,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What a call to the orchestrator did.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The run went through; record-level failures are in the report.
    Completed(SyncReport),
    /// Another run held the lock; nothing was touched.
    Skipped,
}

impl RunOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped)
    }
}
