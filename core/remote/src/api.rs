//! Remote API trait definition.

use async_trait::async_trait;

use listsync_common::{ExternalId, Result};

use crate::model::{CreateListRequest, RemoteItem, RemoteList};

/// Operations the sync engine needs from the remote list store.
///
/// Implementations own retry and backoff for transient failures. Every
/// non-success answer is reported as `Error::Remote` carrying the status
/// and the raw body.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch every list with its nested items.
    async fn fetch_all_lists(&self) -> Result<Vec<RemoteList>>;

    /// Create a list, optionally with items.
    ///
    /// # Postconditions
    /// - Returns the created record with server-assigned ids
    /// - Each returned item echoes the `source_id` it was sent with
    async fn create_list(&self, request: &CreateListRequest) -> Result<RemoteList>;

    /// Rename a list.
    async fn update_list(&self, external_id: &ExternalId, name: &str) -> Result<RemoteList>;

    /// Delete a list and its items.
    ///
    /// # Errors
    /// - `Error::Remote` with status 404 if the list does not exist
    async fn delete_list(&self, external_id: &ExternalId) -> Result<()>;

    /// Overwrite an item's content fields.
    async fn update_item(
        &self,
        list_external_id: &ExternalId,
        item_external_id: &ExternalId,
        description: &str,
        completed: bool,
    ) -> Result<RemoteItem>;

    /// Delete one item.
    ///
    /// # Errors
    /// - `Error::Remote` with status 404 if the item does not exist
    async fn delete_item(
        &self,
        list_external_id: &ExternalId,
        item_external_id: &ExternalId,
    ) -> Result<()>;
}
