//! Records held by the local store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use listsync_common::{Error, ExternalId, ItemId, ListId, Result};

/// Minimum length of an item description.
pub const MIN_DESCRIPTION_LEN: usize = 5;

/// A local list with its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoList {
    pub id: ListId,
    /// Remote identity, set once the list is linked.
    pub external_id: Option<ExternalId>,
    pub name: String,
    /// Instant of the last mutation.
    pub updated_at: DateTime<Utc>,
    /// Last instant both sides were known equal. `None` means never synced.
    pub synced_at: Option<DateTime<Utc>>,
    pub items: Vec<TodoItem>,
}

impl TodoList {
    /// True if the list changed since its last sync, or was never synced.
    pub fn has_pending_changes(&self) -> bool {
        match self.synced_at {
            Some(synced_at) => self.updated_at > synced_at,
            None => true,
        }
    }

    /// Find one of this list's items by local id.
    pub fn item(&self, id: ItemId) -> Option<&TodoItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// A local item; belongs to exactly one list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: ItemId,
    pub list_id: ListId,
    pub external_id: Option<ExternalId>,
    pub description: String,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Fields for creating an item.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub description: String,
    pub completed: bool,
    pub external_id: Option<ExternalId>,
}

impl NewItem {
    /// Create an unlinked, open item.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            completed: false,
            external_id: None,
        }
    }

    /// Set the completion flag.
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Link the item to a remote id.
    pub fn linked(mut self, external_id: ExternalId) -> Self {
        self.external_id = Some(external_id);
        self
    }
}

/// Which items of a list a watermark stamp applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampScope {
    /// Every item of the list.
    All,
    /// Only items that already carry an external id.
    Linked,
}

impl StampScope {
    /// Whether an item with the given link state is covered.
    pub fn covers(self, external_id: Option<&ExternalId>) -> bool {
        match self {
            StampScope::All => true,
            StampScope::Linked => external_id.is_some(),
        }
    }
}

/// Reject blank list names.
pub fn validate_list_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("List name can't be blank".to_string()));
    }
    Ok(())
}

/// Reject descriptions shorter than [`MIN_DESCRIPTION_LEN`] characters.
pub fn validate_description(description: &str) -> Result<()> {
    if description.chars().count() < MIN_DESCRIPTION_LEN {
        return Err(Error::InvalidInput(format!(
            "Description is too short (minimum is {} characters): {:?}",
            MIN_DESCRIPTION_LEN, description
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn list(updated_at: DateTime<Utc>, synced_at: Option<DateTime<Utc>>) -> TodoList {
        TodoList {
            id: ListId(1),
            external_id: None,
            name: "Groceries".to_string(),
            updated_at,
            synced_at,
            items: Vec::new(),
        }
    }

    #[test]
    fn test_pending_changes() {
        let now = Utc::now();
        assert!(list(now, None).has_pending_changes());
        assert!(list(now, Some(now - Duration::minutes(1))).has_pending_changes());
        assert!(!list(now, Some(now)).has_pending_changes());
    }

    #[test]
    fn test_validation() {
        assert!(validate_list_name("Weekend").is_ok());
        assert!(validate_list_name("  ").is_err());
        assert!(validate_description("Buy milk").is_ok());
        assert!(validate_description("milk").is_err());
    }

    #[test]
    fn test_stamp_scope() {
        let ext = ExternalId::new("item-1").unwrap();
        assert!(StampScope::All.covers(None));
        assert!(!StampScope::Linked.covers(None));
        assert!(StampScope::Linked.covers(Some(&ext)));
    }
}
