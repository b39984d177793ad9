//! In-memory local store for testing.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::RwLock;

use listsync_common::{Error, ExternalId, ItemId, ListId, Result};

use crate::model::{validate_description, validate_list_name, NewItem, StampScope, TodoItem, TodoList};
use crate::store::{LocalStore, StoreTx};

/// Table contents. Lists are stored without their items.
#[derive(Debug, Clone, Default)]
struct Tables {
    lists: BTreeMap<ListId, TodoList>,
    items: BTreeMap<ItemId, TodoItem>,
    last_list_id: i64,
    last_item_id: i64,
}

impl Tables {
    fn assemble(&self, list: &TodoList) -> TodoList {
        let mut list = list.clone();
        list.items = self
            .items
            .values()
            .filter(|item| item.list_id == list.id)
            .cloned()
            .collect();
        list
    }

    fn list_mut(&mut self, id: ListId) -> Result<&mut TodoList> {
        self.lists
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("List {}", id)))
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut TodoItem> {
        self.items
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Item {}", id)))
    }

    fn ensure_list_link_free(&self, external_id: &ExternalId, except: Option<ListId>) -> Result<()> {
        let taken = self
            .lists
            .values()
            .any(|l| l.external_id.as_ref() == Some(external_id) && Some(l.id) != except);
        if taken {
            return Err(Error::AlreadyExists(format!("List with external id {}", external_id)));
        }
        Ok(())
    }

    fn ensure_item_link_free(&self, external_id: &ExternalId, except: Option<ItemId>) -> Result<()> {
        let taken = self
            .items
            .values()
            .any(|i| i.external_id.as_ref() == Some(external_id) && Some(i.id) != except);
        if taken {
            return Err(Error::AlreadyExists(format!("Item with external id {}", external_id)));
        }
        Ok(())
    }
}

/// In-memory local store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Ids are never reused, matching the SQLite backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn load_all(&self) -> Result<Vec<TodoList>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| Error::Store("Memory store lock poisoned".to_string()))?;
        Ok(tables.lists.values().map(|l| tables.assemble(l)).collect())
    }

    fn transaction(&self, work: &mut dyn FnMut(&mut dyn StoreTx) -> Result<()>) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| Error::Store("Memory store lock poisoned".to_string()))?;

        // Work on a copy; publish it only if the whole unit succeeds.
        let mut staged = tables.clone();
        work(&mut MemoryTx { tables: &mut staged })?;
        *tables = staged;
        Ok(())
    }
}

struct MemoryTx<'a> {
    tables: &'a mut Tables,
}

impl StoreTx for MemoryTx<'_> {
    fn find_list(&mut self, id: ListId) -> Result<Option<TodoList>> {
        Ok(self.tables.lists.get(&id).map(|l| self.tables.assemble(l)))
    }

    fn create_list(
        &mut self,
        name: &str,
        external_id: Option<&ExternalId>,
        at: DateTime<Utc>,
    ) -> Result<ListId> {
        validate_list_name(name)?;
        if let Some(ext) = external_id {
            self.tables.ensure_list_link_free(ext, None)?;
        }

        self.tables.last_list_id += 1;
        let id = ListId(self.tables.last_list_id);
        self.tables.lists.insert(
            id,
            TodoList {
                id,
                external_id: external_id.cloned(),
                name: name.to_string(),
                updated_at: at,
                synced_at: None,
                items: Vec::new(),
            },
        );
        Ok(id)
    }

    fn create_item(&mut self, list_id: ListId, item: &NewItem, at: DateTime<Utc>) -> Result<ItemId> {
        if !self.tables.lists.contains_key(&list_id) {
            return Err(Error::NotFound(format!("List {}", list_id)));
        }
        validate_description(&item.description)?;
        if let Some(ext) = &item.external_id {
            self.tables.ensure_item_link_free(ext, None)?;
        }

        self.tables.last_item_id += 1;
        let id = ItemId(self.tables.last_item_id);
        self.tables.items.insert(
            id,
            TodoItem {
                id,
                list_id,
                external_id: item.external_id.clone(),
                description: item.description.clone(),
                completed: item.completed,
                updated_at: at,
                synced_at: None,
            },
        );
        Ok(id)
    }

    fn update_list_name(&mut self, id: ListId, name: &str, at: DateTime<Utc>) -> Result<()> {
        validate_list_name(name)?;
        let list = self.tables.list_mut(id)?;
        list.name = name.to_string();
        list.updated_at = at;
        Ok(())
    }

    fn update_item(
        &mut self,
        id: ItemId,
        description: &str,
        completed: bool,
        at: DateTime<Utc>,
    ) -> Result<()> {
        validate_description(description)?;
        let item = self.tables.item_mut(id)?;
        item.description = description.to_string();
        item.completed = completed;
        item.updated_at = at;
        Ok(())
    }

    fn delete_item(&mut self, id: ItemId) -> Result<()> {
        self.tables
            .items
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Item {}", id)))
    }

    fn delete_list(&mut self, id: ListId) -> Result<()> {
        self.tables
            .lists
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("List {}", id)))?;
        self.tables.items.retain(|_, item| item.list_id != id);
        Ok(())
    }

    fn link_list(
        &mut self,
        id: ListId,
        external_id: &ExternalId,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        self.tables.ensure_list_link_free(external_id, Some(id))?;
        let list = self.tables.list_mut(id)?;
        list.external_id = Some(external_id.clone());
        list.synced_at = Some(synced_at);
        Ok(())
    }

    fn link_item(
        &mut self,
        id: ItemId,
        external_id: &ExternalId,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        self.tables.ensure_item_link_free(external_id, Some(id))?;
        let item = self.tables.item_mut(id)?;
        item.external_id = Some(external_id.clone());
        item.synced_at = Some(synced_at);
        Ok(())
    }

    fn stamp_list(&mut self, id: ListId, synced_at: DateTime<Utc>) -> Result<()> {
        self.tables.list_mut(id)?.synced_at = Some(synced_at);
        Ok(())
    }

    fn stamp_item(&mut self, id: ItemId, synced_at: DateTime<Utc>) -> Result<()> {
        self.tables.item_mut(id)?.synced_at = Some(synced_at);
        Ok(())
    }

    fn stamp_items(
        &mut self,
        list_id: ListId,
        synced_at: DateTime<Utc>,
        scope: StampScope,
    ) -> Result<()> {
        for item in self.tables.items.values_mut() {
            if item.list_id == list_id && scope.covers(item.external_id.as_ref()) {
                item.synced_at = Some(synced_at);
            }
        }
        Ok(())
    }
}
