//! Wire records exchanged with the remote API.

use serde::{Deserialize, Serialize};

use listsync_common::ExternalId;

/// A list as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteList {
    /// Remote identity.
    pub id: ExternalId,
    /// Local id of the list this record was pushed from, if any.
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub name: String,
    /// Raw timestamp; parsed during snapshot construction.
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub items: Vec<RemoteItem>,
}

/// An item as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: ExternalId,
    /// Local id of the item this record was pushed from, echoed back on create.
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of a create-list call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateListRequest {
    pub source_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<NewRemoteItem>,
}

/// An item sent along with a create-list call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRemoteItem {
    /// Client-chosen correlation id (the local item id).
    pub source_id: String,
    pub description: String,
    pub completed: bool,
}

/// Body of an update-list call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UpdateListBody {
    pub name: String,
}

/// Body of an update-item call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UpdateItemBody {
    pub description: String,
    pub completed: bool,
}

/// True if a source id is present and not blank.
pub fn has_source_id(source_id: Option<&str>) -> bool {
    source_id.is_some_and(|s| !s.trim().is_empty())
}
