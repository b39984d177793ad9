//! Classification of lists into sync actions.

use std::collections::{BTreeSet, HashSet};

use listsync_common::ExternalId;
use listsync_remote::model::has_source_id;
use listsync_store::TodoList;

use crate::conflict::{resolve, Resolution};
use crate::report::BucketCounts;
use crate::snapshot::{ExternalList, ExternalSnapshot, LocalSnapshot};

/// A remote list and the local list linked to it.
#[derive(Debug, Clone)]
pub struct ListPair {
    pub external: ExternalList,
    pub local: TodoList,
}

/// The six action buckets of one run.
#[derive(Debug, Clone, Default)]
pub struct SyncDiff {
    /// Remote lists with no local counterpart.
    pub pull_creates: Vec<ExternalList>,
    /// Linked pairs where the remote version wins.
    pub pull_updates: Vec<ListPair>,
    /// Linked local lists whose remote record is gone.
    pub pull_deletes: Vec<TodoList>,
    /// Local lists never pushed.
    pub push_creates: Vec<TodoList>,
    /// Linked pairs where the local version wins.
    pub push_updates: Vec<ListPair>,
    /// Remote lists whose originating local list was deleted.
    pub push_deletes: Vec<ExternalList>,
}

impl SyncDiff {
    /// Classify every list of both snapshots.
    ///
    /// Push-deletes are detected first and excluded from the pull pass, so
    /// every remote list lands in at most one bucket.
    pub fn compute(external: &ExternalSnapshot, local: &LocalSnapshot) -> Self {
        let mut diff = Self::default();

        let local_ids: HashSet<String> = local.list_ids().map(|id| id.to_string()).collect();
        for ext in external.values() {
            if !has_source_id(ext.source_id.as_deref()) {
                continue;
            }
            let source_id = ext.source_id.as_deref().unwrap_or_default().trim();
            if !local_ids.contains(source_id) {
                diff.push_deletes.push(ext.clone());
            }
        }

        let excluded: BTreeSet<&ExternalId> =
            diff.push_deletes.iter().map(|ext| &ext.external_id).collect();
        for (external_id, ext) in external {
            if excluded.contains(external_id) {
                continue;
            }
            let Some(local_list) = local.synced.get(external_id) else {
                diff.pull_creates.push(ext.clone());
                continue;
            };

            let pair = || ListPair {
                external: ext.clone(),
                local: local_list.clone(),
            };
            match resolve(ext.updated_at, local_list.updated_at, local_list.synced_at) {
                Resolution::Pull => diff.pull_updates.push(pair()),
                Resolution::Push => diff.push_updates.push(pair()),
                Resolution::None => {}
            }
        }

        diff.pull_deletes = local
            .synced
            .iter()
            .filter(|(external_id, _)| !external.contains_key(*external_id))
            .map(|(_, list)| list.clone())
            .collect();

        diff.push_creates = local.unsynced.clone();
        diff
    }

    /// Bucket sizes.
    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            pull_creates: self.pull_creates.len(),
            pull_updates: self.pull_updates.len(),
            pull_deletes: self.pull_deletes.len(),
            push_creates: self.push_creates.len(),
            push_updates: self.push_updates.len(),
            push_deletes: self.push_deletes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }
}
