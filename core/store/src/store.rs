//! Local store trait definition.

use chrono::{DateTime, Utc};

use listsync_common::{Error, ExternalId, ItemId, ListId, Result};

use crate::model::{NewItem, StampScope, TodoList};

/// Local store trait for different backends.
///
/// Reads are point-in-time; every write happens inside [`LocalStore::transaction`].
pub trait LocalStore: Send + Sync {
    /// Get the backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Read every list with its items.
    ///
    /// # Postconditions
    /// - Lists are ordered by id, items within a list by id
    fn load_all(&self) -> Result<Vec<TodoList>>;

    /// Run `work` as one atomic unit.
    ///
    /// # Postconditions
    /// - If `work` returns `Ok`, all of its writes are committed
    /// - If `work` returns `Err`, none of its writes are visible and the error is returned
    fn transaction(&self, work: &mut dyn FnMut(&mut dyn StoreTx) -> Result<()>) -> Result<()>;
}

/// Write access inside a transaction.
///
/// Mutations take the instant they happen at and set `updated_at` to it.
/// `link_*` and `stamp_*` never move `updated_at`.
pub trait StoreTx {
    /// Read one list with its items.
    fn find_list(&mut self, id: ListId) -> Result<Option<TodoList>>;

    /// Create an empty list.
    ///
    /// # Errors
    /// - Blank name
    /// - `external_id` already used by another list
    fn create_list(
        &mut self,
        name: &str,
        external_id: Option<&ExternalId>,
        at: DateTime<Utc>,
    ) -> Result<ListId>;

    /// Create an item in a list.
    ///
    /// # Errors
    /// - List not found
    /// - Description too short
    /// - `external_id` already used by another item
    fn create_item(&mut self, list_id: ListId, item: &NewItem, at: DateTime<Utc>) -> Result<ItemId>;

    /// Rename a list.
    fn update_list_name(&mut self, id: ListId, name: &str, at: DateTime<Utc>) -> Result<()>;

    /// Overwrite an item's content fields.
    fn update_item(
        &mut self,
        id: ItemId,
        description: &str,
        completed: bool,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Delete one item.
    fn delete_item(&mut self, id: ItemId) -> Result<()>;

    /// Delete a list and all of its items.
    fn delete_list(&mut self, id: ListId) -> Result<()>;

    /// Set a list's external id and watermark.
    fn link_list(&mut self, id: ListId, external_id: &ExternalId, synced_at: DateTime<Utc>)
        -> Result<()>;

    /// Set an item's external id and watermark.
    fn link_item(&mut self, id: ItemId, external_id: &ExternalId, synced_at: DateTime<Utc>)
        -> Result<()>;

    /// Set a list's watermark.
    fn stamp_list(&mut self, id: ListId, synced_at: DateTime<Utc>) -> Result<()>;

    /// Set an item's watermark.
    fn stamp_item(&mut self, id: ItemId, synced_at: DateTime<Utc>) -> Result<()>;

    /// Set the watermark on the list's items selected by `scope`.
    fn stamp_items(&mut self, list_id: ListId, synced_at: DateTime<Utc>, scope: StampScope)
        -> Result<()>;
}

/// Convenience methods available on every store.
pub trait LocalStoreExt: LocalStore {
    /// Run `work` in a transaction and return its value.
    fn write<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T>,
    {
        let mut work = Some(work);
        let mut output = None;
        self.transaction(&mut |tx| {
            let work = work
                .take()
                .ok_or_else(|| Error::Store("Transaction body invoked twice".to_string()))?;
            output = Some(work(tx)?);
            Ok(())
        })?;
        output.ok_or_else(|| Error::Store("Transaction produced no value".to_string()))
    }

    /// Read one list outside of any write.
    fn find_list(&self, id: ListId) -> Result<Option<TodoList>> {
        Ok(self.load_all()?.into_iter().find(|list| list.id == id))
    }

    /// Read one list by its external id.
    fn find_by_external_id(&self, external_id: &ExternalId) -> Result<Option<TodoList>> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|list| list.external_id.as_ref() == Some(external_id)))
    }
}

impl<S: LocalStore + ?Sized> LocalStoreExt for S {}
