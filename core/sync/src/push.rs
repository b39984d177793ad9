//! Applies local versions to the remote side.

use chrono::Utc;
use tracing::debug;

use listsync_common::{Error, ExternalId, ItemId, Result};
use listsync_remote::model::has_source_id;
use listsync_remote::{CreateListRequest, NewRemoteItem, RemoteApi, RemoteList};
use listsync_store::{LocalStore, LocalStoreExt, StampScope, TodoList};

use crate::diff::{ListPair, SyncDiff};
use crate::report::{record, RecordKey, SyncAction, SyncError};
use crate::snapshot::ExternalList;

/// What to do remotely with a linked local item during a push-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedItemAction {
    /// Send the local fields to the remote item.
    Update,
    /// Delete the remote item.
    DeleteRemote,
}

/// Decide the remote action for a local item linked to `item_external_id`.
///
/// An item missing from the diff-time snapshot is taken as deleted on the
/// remote side, which also matches items linked after the snapshot was read.
pub fn linked_item_action(external: &ExternalList, item_external_id: &ExternalId) -> LinkedItemAction {
    match external.item(item_external_id) {
        Some(_) => LinkedItemAction::Update,
        None => LinkedItemAction::DeleteRemote,
    }
}

/// Executes the push buckets of a diff.
///
/// Remote calls run one at a time. Watermarks are stamped with the instant
/// the remote calls finished.
pub struct PushExecutor<'a, S: LocalStore + ?Sized, R: RemoteApi + ?Sized> {
    store: &'a S,
    remote: &'a R,
}

impl<'a, S, R> PushExecutor<'a, S, R>
where
    S: LocalStore + ?Sized,
    R: RemoteApi + ?Sized,
{
    pub fn new(store: &'a S, remote: &'a R) -> Self {
        Self { store, remote }
    }

    /// Apply creates, then updates, then deletes.
    pub async fn execute(&self, diff: &SyncDiff) -> Vec<SyncError> {
        let mut errors = Vec::new();

        for local in &diff.push_creates {
            if let Err(e) = self.create_list(local).await {
                errors.push(record(SyncAction::PushCreate, RecordKey::Local(local.id), e));
            }
        }
        for pair in &diff.push_updates {
            if let Err(e) = self.update_list(pair, &mut errors).await {
                errors.push(record(
                    SyncAction::PushUpdate,
                    RecordKey::External(pair.external.external_id.clone()),
                    e,
                ));
            }
        }
        for ext in &diff.push_deletes {
            if let Err(e) = self.delete_list(ext).await {
                errors.push(record(
                    SyncAction::PushDelete,
                    RecordKey::External(ext.external_id.clone()),
                    e,
                ));
            }
        }

        errors
    }

    async fn create_list(&self, local: &TodoList) -> Result<()> {
        let request = CreateListRequest {
            source_id: local.id.to_string(),
            name: local.name.clone(),
            items: local
                .items
                .iter()
                .map(|item| NewRemoteItem {
                    source_id: item.id.to_string(),
                    description: item.description.clone(),
                    completed: item.completed,
                })
                .collect(),
        };

        let created = self.remote.create_list(&request).await?;
        let now = Utc::now();

        self.store.write(|tx| {
            let list = tx
                .find_list(local.id)?
                .ok_or_else(|| Error::NotFound(format!("List {}", local.id)))?;
            tx.link_list(list.id, &created.id, now)?;
            for (item_id, external_id) in echoed_items(&created) {
                if list.item(item_id).is_some() {
                    tx.link_item(item_id, external_id, now)?;
                }
            }
            Ok(())
        })?;

        debug!("Pushed new list {} as {}", local.id, created.id);
        Ok(())
    }

    /// Push the local name and linked items.
    ///
    /// A failed item delete is recorded into `errors` and the update goes on;
    /// any other failure aborts the list without stamping it.
    async fn update_list(&self, pair: &ListPair, errors: &mut Vec<SyncError>) -> Result<()> {
        let ext = &pair.external;
        let local = &pair.local;

        self.remote.update_list(&ext.external_id, &local.name).await?;

        for item in &local.items {
            let Some(item_ext_id) = &item.external_id else {
                continue;
            };
            match linked_item_action(ext, item_ext_id) {
                LinkedItemAction::Update => {
                    self.remote
                        .update_item(&ext.external_id, item_ext_id, &item.description, item.completed)
                        .await?;
                }
                LinkedItemAction::DeleteRemote => {
                    if let Err(e) = self.remote.delete_item(&ext.external_id, item_ext_id).await {
                        if !e.is_not_found_status() {
                            errors.push(record(
                                SyncAction::PushDeleteItem,
                                RecordKey::External(item_ext_id.clone()),
                                e,
                            ));
                        }
                    }
                }
            }
        }

        let now = Utc::now();
        self.store.write(|tx| {
            tx.stamp_list(local.id, now)?;
            tx.stamp_items(local.id, now, StampScope::Linked)
        })?;

        debug!("Pushed update of {} to {}", local.id, ext.external_id);
        Ok(())
    }

    async fn delete_list(&self, ext: &ExternalList) -> Result<()> {
        match self.remote.delete_list(&ext.external_id).await {
            Ok(()) => {
                debug!("Deleted remote list {}", ext.external_id);
                Ok(())
            }
            Err(e) if e.is_not_found_status() => {
                debug!("Remote list {} already gone", ext.external_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Items of a create response that carry a usable local id.
fn echoed_items(created: &RemoteList) -> impl Iterator<Item = (ItemId, &ExternalId)> {
    created.items.iter().filter_map(|item| {
        let source_id = item.source_id.as_deref();
        if !has_source_id(source_id) {
            return None;
        }
        let item_id = source_id?.parse::<ItemId>().ok()?;
        Some((item_id, &item.id))
    })
}
