//! SQLite-based local store.
//!
//! Persists lists and items with their sync watermarks.

use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use listsync_common::{Error, ExternalId, ItemId, ListId, Result};

use crate::model::{validate_description, validate_list_name, NewItem, StampScope, TodoItem, TodoList};
use crate::store::{LocalStore, StoreTx};

// AUTOINCREMENT keeps deleted ids from being handed out again: a remote
// record pointing at a deleted list must never match a newer one.
const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS todo_lists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        external_id TEXT,
        updated_at TEXT NOT NULL,
        synced_at TEXT
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_todo_lists_external_id
        ON todo_lists(external_id);

    CREATE TABLE IF NOT EXISTS todo_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        todo_list_id INTEGER NOT NULL REFERENCES todo_lists(id) ON DELETE CASCADE,
        description TEXT NOT NULL,
        completed INTEGER NOT NULL DEFAULT 0,
        external_id TEXT,
        updated_at TEXT NOT NULL,
        synced_at TEXT
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_todo_items_external_id
        ON todo_items(external_id);

    CREATE INDEX IF NOT EXISTS idx_todo_items_list
        ON todo_items(todo_list_id);
"#;

const LIST_COLUMNS: &str = "id, name, external_id, updated_at, synced_at";
const ITEM_COLUMNS: &str =
    "id, todo_list_id, description, completed, external_id, updated_at, synced_at";

/// Local store backed by a SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create or open a store database.
    ///
    /// # Arguments
    /// - `db_path`: Path to the SQLite database file
    ///
    /// # Errors
    /// - Database creation or schema setup failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).map_err(store_error)?;
        let store = Self::init(conn)?;
        info!("Local store opened at {}", db_path.as_ref().display());
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(store_error)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(store_error)?;
        conn.execute_batch(SCHEMA).map_err(store_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("SQLite connection lock poisoned".to_string()))
    }
}

impl LocalStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn load_all(&self) -> Result<Vec<TodoList>> {
        let conn = self.lock()?;

        let mut items_by_list: HashMap<ListId, Vec<TodoItem>> = HashMap::new();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM todo_items ORDER BY todo_list_id, id",
                ITEM_COLUMNS
            ))
            .map_err(store_error)?;
        let rows = stmt.query_map([], item_from_row).map_err(store_error)?;
        for item in rows {
            let item = item.map_err(store_error)?;
            items_by_list.entry(item.list_id).or_default().push(item);
        }

        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM todo_lists ORDER BY id", LIST_COLUMNS))
            .map_err(store_error)?;
        let rows = stmt.query_map([], list_from_row).map_err(store_error)?;

        let mut lists = Vec::new();
        for list in rows {
            let mut list = list.map_err(store_error)?;
            list.items = items_by_list.remove(&list.id).unwrap_or_default();
            lists.push(list);
        }
        Ok(lists)
    }

    fn transaction(&self, work: &mut dyn FnMut(&mut dyn StoreTx) -> Result<()>) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_error)?;

        // Dropping `tx` without commit rolls back.
        work(&mut SqliteTx { conn: &tx })?;
        tx.commit().map_err(store_error)
    }
}

struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl SqliteTx<'_> {
    fn expect_one(&self, changed: usize, what: String) -> Result<()> {
        if changed == 0 {
            return Err(Error::NotFound(what));
        }
        Ok(())
    }

    fn load_items(&self, list_id: ListId) -> Result<Vec<TodoItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM todo_items WHERE todo_list_id = ?1 ORDER BY id",
                ITEM_COLUMNS
            ))
            .map_err(store_error)?;
        let items = stmt
            .query_map([list_id.0], item_from_row)
            .map_err(store_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_error)?;
        Ok(items)
    }
}

impl StoreTx for SqliteTx<'_> {
    fn find_list(&mut self, id: ListId) -> Result<Option<TodoList>> {
        let list = self
            .conn
            .query_row(
                &format!("SELECT {} FROM todo_lists WHERE id = ?1", LIST_COLUMNS),
                [id.0],
                list_from_row,
            )
            .optional()
            .map_err(store_error)?;

        match list {
            Some(mut list) => {
                list.items = self.load_items(id)?;
                Ok(Some(list))
            }
            None => Ok(None),
        }
    }

    fn create_list(
        &mut self,
        name: &str,
        external_id: Option<&ExternalId>,
        at: DateTime<Utc>,
    ) -> Result<ListId> {
        validate_list_name(name)?;
        self.conn
            .execute(
                "INSERT INTO todo_lists (name, external_id, updated_at) VALUES (?1, ?2, ?3)",
                params![name, external_id.map(ExternalId::as_str), at],
            )
            .map_err(store_error)?;
        let id = ListId(self.conn.last_insert_rowid());
        debug!("Created list {}", id);
        Ok(id)
    }

    fn create_item(&mut self, list_id: ListId, item: &NewItem, at: DateTime<Utc>) -> Result<ItemId> {
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT id FROM todo_lists WHERE id = ?1", [list_id.0], |row| {
                row.get(0)
            })
            .optional()
            .map_err(store_error)?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("List {}", list_id)));
        }
        validate_description(&item.description)?;

        self.conn
            .execute(
                r#"
                INSERT INTO todo_items (todo_list_id, description, completed, external_id, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    list_id.0,
                    item.description,
                    item.completed,
                    item.external_id.as_ref().map(ExternalId::as_str),
                    at,
                ],
            )
            .map_err(store_error)?;
        Ok(ItemId(self.conn.last_insert_rowid()))
    }

    fn update_list_name(&mut self, id: ListId, name: &str, at: DateTime<Utc>) -> Result<()> {
        validate_list_name(name)?;
        let changed = self
            .conn
            .execute(
                "UPDATE todo_lists SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, at, id.0],
            )
            .map_err(store_error)?;
        self.expect_one(changed, format!("List {}", id))
    }

    fn update_item(
        &mut self,
        id: ItemId,
        description: &str,
        completed: bool,
        at: DateTime<Utc>,
    ) -> Result<()> {
        validate_description(description)?;
        let changed = self
            .conn
            .execute(
                "UPDATE todo_items SET description = ?1, completed = ?2, updated_at = ?3 WHERE id = ?4",
                params![description, completed, at, id.0],
            )
            .map_err(store_error)?;
        self.expect_one(changed, format!("Item {}", id))
    }

    fn delete_item(&mut self, id: ItemId) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM todo_items WHERE id = ?1", [id.0])
            .map_err(store_error)?;
        self.expect_one(changed, format!("Item {}", id))
    }

    fn delete_list(&mut self, id: ListId) -> Result<()> {
        debug!("Deleting list {}", id);
        let changed = self
            .conn
            .execute("DELETE FROM todo_lists WHERE id = ?1", [id.0])
            .map_err(store_error)?;
        self.expect_one(changed, format!("List {}", id))
    }

    fn link_list(
        &mut self,
        id: ListId,
        external_id: &ExternalId,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE todo_lists SET external_id = ?1, synced_at = ?2 WHERE id = ?3",
                params![external_id.as_str(), synced_at, id.0],
            )
            .map_err(store_error)?;
        self.expect_one(changed, format!("List {}", id))
    }

    fn link_item(
        &mut self,
        id: ItemId,
        external_id: &ExternalId,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE todo_items SET external_id = ?1, synced_at = ?2 WHERE id = ?3",
                params![external_id.as_str(), synced_at, id.0],
            )
            .map_err(store_error)?;
        self.expect_one(changed, format!("Item {}", id))
    }

    fn stamp_list(&mut self, id: ListId, synced_at: DateTime<Utc>) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE todo_lists SET synced_at = ?1 WHERE id = ?2",
                params![synced_at, id.0],
            )
            .map_err(store_error)?;
        self.expect_one(changed, format!("List {}", id))
    }

    fn stamp_item(&mut self, id: ItemId, synced_at: DateTime<Utc>) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE todo_items SET synced_at = ?1 WHERE id = ?2",
                params![synced_at, id.0],
            )
            .map_err(store_error)?;
        self.expect_one(changed, format!("Item {}", id))
    }

    fn stamp_items(
        &mut self,
        list_id: ListId,
        synced_at: DateTime<Utc>,
        scope: StampScope,
    ) -> Result<()> {
        let sql = match scope {
            StampScope::All => "UPDATE todo_items SET synced_at = ?1 WHERE todo_list_id = ?2",
            StampScope::Linked => {
                "UPDATE todo_items SET synced_at = ?1 WHERE todo_list_id = ?2 AND external_id IS NOT NULL"
            }
        };
        self.conn
            .execute(sql, params![synced_at, list_id.0])
            .map_err(store_error)?;
        Ok(())
    }
}

fn list_from_row(row: &Row<'_>) -> rusqlite::Result<TodoList> {
    Ok(TodoList {
        id: ListId(row.get(0)?),
        name: row.get(1)?,
        external_id: external_id_from(row.get(2)?),
        updated_at: row.get(3)?,
        synced_at: row.get(4)?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<TodoItem> {
    Ok(TodoItem {
        id: ItemId(row.get(0)?),
        list_id: ListId(row.get(1)?),
        description: row.get(2)?,
        completed: row.get(3)?,
        external_id: external_id_from(row.get(4)?),
        updated_at: row.get(5)?,
        synced_at: row.get(6)?,
    })
}

fn external_id_from(raw: Option<String>) -> Option<ExternalId> {
    raw.and_then(|s| ExternalId::new(s).ok())
}

/// Unique-index violations are duplicates; every other failure, other
/// constraint kinds included, is a store error.
fn store_error(err: rusqlite::Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::AlreadyExists(err.to_string())
        }
        _ => Error::Store(err.to_string()),
    }
}
