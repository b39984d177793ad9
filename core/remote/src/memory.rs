//! In-process remote API for testing.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use listsync_common::{Error, ExternalId, Result};

use crate::api::RemoteApi;
use crate::model::{CreateListRequest, RemoteItem, RemoteList};

/// Remote operations, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    FetchAll,
    CreateList,
    UpdateList,
    DeleteList,
    UpdateItem,
    DeleteItem,
}

/// A call received by [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    FetchAll,
    CreateList(CreateListRequest),
    UpdateList {
        id: ExternalId,
        name: String,
    },
    DeleteList(ExternalId),
    UpdateItem {
        list: ExternalId,
        item: ExternalId,
        description: String,
        completed: bool,
    },
    DeleteItem {
        list: ExternalId,
        item: ExternalId,
    },
}

#[derive(Debug, Clone)]
enum Fault {
    Status(u16, String),
    Network,
}

#[derive(Debug, Clone)]
struct StoredItem {
    id: ExternalId,
    source_id: Option<String>,
    description: String,
    completed: bool,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredList {
    id: ExternalId,
    source_id: Option<String>,
    name: String,
    updated_at: DateTime<Utc>,
    items: Vec<StoredItem>,
}

#[derive(Debug, Default)]
struct RemoteState {
    /// Insertion order is the order `fetch_all_lists` returns.
    lists: Vec<StoredList>,
    calls: Vec<RemoteCall>,
    faults: HashMap<RemoteOp, VecDeque<Fault>>,
}

impl RemoteState {
    fn take_fault(&mut self, op: RemoteOp) -> Result<()> {
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(Fault::Status(status, body)) => Err(Error::Remote { status, body }),
            Some(Fault::Network) => Err(Error::Network(format!("{:?}: connection refused", op))),
            None => Ok(()),
        }
    }

    fn list_mut(&mut self, id: &ExternalId) -> Result<&mut StoredList> {
        self.lists
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(not_found)
    }
}

/// In-memory remote list store.
///
/// Behaves like the REST API: assigns ids, maintains `updated_at`, echoes
/// `source_id`s and answers 404 for unknown records. Every call is recorded,
/// and failures can be queued per operation.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<RemoteState>,
}

impl MemoryRemote {
    /// Create an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        // A poisoned lock only happens after a panicking test; keep serving.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a list created on the remote side.
    pub fn seed_list(
        &self,
        name: &str,
        source_id: Option<&str>,
        items: &[(&str, bool)],
    ) -> RemoteList {
        let now = Utc::now();
        let list = StoredList {
            id: new_id(),
            source_id: source_id.map(str::to_string),
            name: name.to_string(),
            updated_at: now,
            items: items
                .iter()
                .map(|(description, completed)| StoredItem {
                    id: new_id(),
                    source_id: None,
                    description: description.to_string(),
                    completed: *completed,
                    updated_at: now,
                })
                .collect(),
        };
        let rendered = render_list(&list);
        self.state().lists.push(list);
        rendered
    }

    /// Rename a list as a remote user would, at the given instant.
    pub fn edit_list(&self, id: &ExternalId, name: &str, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state();
        let list = state.list_mut(id)?;
        list.name = name.to_string();
        list.updated_at = at;
        Ok(())
    }

    /// Overwrite a list's `updated_at` without other changes.
    pub fn touch_list(&self, id: &ExternalId, at: DateTime<Utc>) -> Result<()> {
        self.state().list_mut(id)?.updated_at = at;
        Ok(())
    }

    /// Remove a list as a remote user would.
    pub fn remove_list(&self, id: &ExternalId) -> Result<()> {
        let mut state = self.state();
        let before = state.lists.len();
        state.lists.retain(|l| &l.id != id);
        if state.lists.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    /// Current contents, as `fetch_all_lists` would return them.
    pub fn lists(&self) -> Vec<RemoteList> {
        self.state().lists.iter().map(render_list).collect()
    }

    /// Look up one list.
    pub fn list(&self, id: &ExternalId) -> Option<RemoteList> {
        self.state()
            .lists
            .iter()
            .find(|l| &l.id == id)
            .map(render_list)
    }

    /// Calls received so far, oldest first.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make the next call of `op` answer with `status`.
    pub fn fail_next(&self, op: RemoteOp, status: u16) {
        self.state()
            .faults
            .entry(op)
            .or_default()
            .push_back(Fault::Status(status, format!("{{\"error\":\"injected {}\"}}", status)));
    }

    /// Make the next call of `op` fail without a response.
    pub fn fail_next_network(&self, op: RemoteOp) {
        self.state()
            .faults
            .entry(op)
            .or_default()
            .push_back(Fault::Network);
    }
}

#[async_trait]
impl RemoteApi for MemoryRemote {
    async fn fetch_all_lists(&self) -> Result<Vec<RemoteList>> {
        let mut state = self.state();
        state.calls.push(RemoteCall::FetchAll);
        state.take_fault(RemoteOp::FetchAll)?;
        Ok(state.lists.iter().map(render_list).collect())
    }

    async fn create_list(&self, request: &CreateListRequest) -> Result<RemoteList> {
        let mut state = self.state();
        state.calls.push(RemoteCall::CreateList(request.clone()));
        state.take_fault(RemoteOp::CreateList)?;

        let now = Utc::now();
        let list = StoredList {
            id: new_id(),
            source_id: Some(request.source_id.clone()),
            name: request.name.clone(),
            updated_at: now,
            items: request
                .items
                .iter()
                .map(|item| StoredItem {
                    id: new_id(),
                    source_id: Some(item.source_id.clone()),
                    description: item.description.clone(),
                    completed: item.completed,
                    updated_at: now,
                })
                .collect(),
        };
        let rendered = render_list(&list);
        state.lists.push(list);
        Ok(rendered)
    }

    async fn update_list(&self, external_id: &ExternalId, name: &str) -> Result<RemoteList> {
        let mut state = self.state();
        state.calls.push(RemoteCall::UpdateList {
            id: external_id.clone(),
            name: name.to_string(),
        });
        state.take_fault(RemoteOp::UpdateList)?;

        let list = state.list_mut(external_id)?;
        list.name = name.to_string();
        list.updated_at = Utc::now();
        Ok(render_list(list))
    }

    async fn delete_list(&self, external_id: &ExternalId) -> Result<()> {
        let mut state = self.state();
        state.calls.push(RemoteCall::DeleteList(external_id.clone()));
        state.take_fault(RemoteOp::DeleteList)?;

        let before = state.lists.len();
        state.lists.retain(|l| &l.id != external_id);
        if state.lists.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn update_item(
        &self,
        list_external_id: &ExternalId,
        item_external_id: &ExternalId,
        description: &str,
        completed: bool,
    ) -> Result<RemoteItem> {
        let mut state = self.state();
        state.calls.push(RemoteCall::UpdateItem {
            list: list_external_id.clone(),
            item: item_external_id.clone(),
            description: description.to_string(),
            completed,
        });
        state.take_fault(RemoteOp::UpdateItem)?;

        let list = state.list_mut(list_external_id)?;
        let item = list
            .items
            .iter_mut()
            .find(|i| &i.id == item_external_id)
            .ok_or_else(not_found)?;
        item.description = description.to_string();
        item.completed = completed;
        item.updated_at = Utc::now();
        Ok(render_item(item))
    }

    async fn delete_item(
        &self,
        list_external_id: &ExternalId,
        item_external_id: &ExternalId,
    ) -> Result<()> {
        let mut state = self.state();
        state.calls.push(RemoteCall::DeleteItem {
            list: list_external_id.clone(),
            item: item_external_id.clone(),
        });
        state.take_fault(RemoteOp::DeleteItem)?;

        let list = state.list_mut(list_external_id)?;
        let before = list.items.len();
        list.items.retain(|i| &i.id != item_external_id);
        if list.items.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}

fn new_id() -> ExternalId {
    ExternalId::new(Uuid::new_v4().to_string()).expect("UUIDs are never blank")
}

fn not_found() -> Error {
    Error::Remote {
        status: 404,
        body: "{\"error\":\"Not found\"}".to_string(),
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn render_item(item: &StoredItem) -> RemoteItem {
    RemoteItem {
        id: item.id.clone(),
        source_id: item.source_id.clone(),
        description: item.description.clone(),
        completed: Some(item.completed),
        updated_at: Some(timestamp(item.updated_at)),
    }
}

fn render_list(list: &StoredList) -> RemoteList {
    RemoteList {
        id: list.id.clone(),
        source_id: list.source_id.clone(),
        name: list.name.clone(),
        updated_at: Some(timestamp(list.updated_at)),
        items: list.items.iter().map(render_item).collect(),
    }
}
