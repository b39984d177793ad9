//! Applies remote versions to the local store.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use listsync_common::{Error, ExternalId, ItemId, Result};
use listsync_store::{LocalStore, LocalStoreExt, NewItem, StampScope, StoreTx, TodoList};

use crate::diff::{ListPair, SyncDiff};
use crate::report::{record, RecordKey, SyncAction, SyncError};
use crate::snapshot::{ExternalItem, ExternalList};

/// Executes the pull buckets of a diff.
///
/// Each entry runs in its own transaction; a failure is recorded and the
/// next entry proceeds.
pub struct PullExecutor<'a, S: LocalStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: LocalStore + ?Sized> PullExecutor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Apply creates, then updates, then deletes.
    pub fn execute(&self, diff: &SyncDiff) -> Vec<SyncError> {
        let mut errors = Vec::new();

        for ext in &diff.pull_creates {
            if let Err(e) = self.create_list(ext) {
                errors.push(record(SyncAction::PullCreate, ext_key(&ext.external_id), e));
            }
        }
        for pair in &diff.pull_updates {
            if let Err(e) = self.update_list(pair) {
                errors.push(record(
                    SyncAction::PullUpdate,
                    ext_key(&pair.external.external_id),
                    e,
                ));
            }
        }
        for local in &diff.pull_deletes {
            if let Err(e) = self.delete_list(local) {
                errors.push(record(SyncAction::PullDelete, RecordKey::Local(local.id), e));
            }
        }

        errors
    }

    fn create_list(&self, ext: &ExternalList) -> Result<()> {
        let now = Utc::now();
        let id = self.store.write(|tx| {
            let id = tx.create_list(&ext.name, Some(&ext.external_id), now)?;
            for item in &ext.items {
                tx.create_item(id, &new_item(item), now)?;
            }
            Ok(id)
        })?;

        // Stamped separately; an unstamped linked list resolves again next run.
        self.store.write(|tx| {
            tx.stamp_list(id, now)?;
            tx.stamp_items(id, now, StampScope::All)
        })?;

        debug!("Pulled new list {} as {}", ext.external_id, id);
        Ok(())
    }

    fn update_list(&self, pair: &ListPair) -> Result<()> {
        let now = Utc::now();
        let ext = &pair.external;
        self.store.write(|tx| {
            let list = tx
                .find_list(pair.local.id)?
                .ok_or_else(|| Error::NotFound(format!("List {}", pair.local.id)))?;
            tx.update_list_name(list.id, &ext.name, now)?;
            tx.stamp_list(list.id, now)?;
            reconcile_items(tx, &list, &ext.items, now)
        })?;

        debug!("Pulled update of {} into {}", ext.external_id, pair.local.id);
        Ok(())
    }

    fn delete_list(&self, local: &TodoList) -> Result<()> {
        self.store.write(|tx| tx.delete_list(local.id))?;
        debug!("Deleted list {} removed remotely", local.id);
        Ok(())
    }
}

/// Make the list's items match the remote ones, keyed by external id.
///
/// Unlinked local items are left alone.
fn reconcile_items(
    tx: &mut dyn StoreTx,
    list: &TodoList,
    ext_items: &[ExternalItem],
    now: DateTime<Utc>,
) -> Result<()> {
    let local_by_ext: HashMap<&ExternalId, ItemId> = list
        .items
        .iter()
        .filter_map(|item| item.external_id.as_ref().map(|ext| (ext, item.id)))
        .collect();

    for ext_item in ext_items {
        let id = match local_by_ext.get(&ext_item.external_id) {
            Some(&id) => {
                tx.update_item(id, &ext_item.description, ext_item.completed, now)?;
                id
            }
            None => tx.create_item(list.id, &new_item(ext_item), now)?,
        };
        tx.stamp_item(id, now)?;
    }

    let remote_ids: HashSet<&ExternalId> = ext_items.iter().map(|i| &i.external_id).collect();
    for (ext, id) in local_by_ext {
        if !remote_ids.contains(ext) {
            tx.delete_item(id)?;
        }
    }
    Ok(())
}

fn new_item(item: &ExternalItem) -> NewItem {
    NewItem::new(item.description.clone())
        .completed(item.completed)
        .linked(item.external_id.clone())
}

fn ext_key(id: &ExternalId) -> RecordKey {
    RecordKey::External(id.clone())
}
