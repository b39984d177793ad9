//! Point-in-time snapshots of both sides.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;

use listsync_common::{Error, ExternalId, ListId, Result};
use listsync_remote::{RemoteItem, RemoteList};
use listsync_store::{LocalStore, TodoList};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A remote item with parsed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalItem {
    pub external_id: ExternalId,
    pub source_id: Option<String>,
    pub description: String,
    pub completed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A remote list with parsed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalList {
    pub external_id: ExternalId,
    pub source_id: Option<String>,
    pub name: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<ExternalItem>,
}

impl ExternalList {
    /// Find an item by its remote id.
    pub fn item(&self, external_id: &ExternalId) -> Option<&ExternalItem> {
        self.items.iter().find(|item| &item.external_id == external_id)
    }
}

/// Every remote list, keyed by remote id.
pub type ExternalSnapshot = BTreeMap<ExternalId, ExternalList>;

/// Every local list, split by link state.
#[derive(Debug, Clone, Default)]
pub struct LocalSnapshot {
    /// Linked lists, keyed by remote id.
    pub synced: BTreeMap<ExternalId, TodoList>,
    /// Lists never pushed, in id order.
    pub unsynced: Vec<TodoList>,
}

impl LocalSnapshot {
    /// Split lists by whether they carry an external id.
    pub fn from_lists(lists: Vec<TodoList>) -> Self {
        let mut snapshot = Self::default();
        for list in lists {
            match list.external_id.clone() {
                Some(external_id) => {
                    snapshot.synced.insert(external_id, list);
                }
                None => snapshot.unsynced.push(list),
            }
        }
        snapshot
    }

    /// Ids of every list in the snapshot.
    pub fn list_ids(&self) -> impl Iterator<Item = ListId> + '_ {
        self.synced
            .values()
            .chain(self.unsynced.iter())
            .map(|list| list.id)
    }

    pub fn len(&self) -> usize {
        self.synced.len() + self.unsynced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index remote lists by id and parse their timestamps.
///
/// # Errors
/// - A non-blank timestamp that cannot be parsed
pub fn build_external(lists: Vec<RemoteList>) -> Result<ExternalSnapshot> {
    let mut snapshot = ExternalSnapshot::new();
    for list in lists {
        let items = list
            .items
            .into_iter()
            .map(external_item)
            .collect::<Result<Vec<_>>>()?;
        let entry = ExternalList {
            updated_at: parse_timestamp(list.updated_at.as_deref())?,
            external_id: list.id,
            source_id: list.source_id,
            name: list.name,
            items,
        };
        snapshot.insert(entry.external_id.clone(), entry);
    }
    Ok(snapshot)
}

/// Read the whole local store.
pub fn build_local<S: LocalStore + ?Sized>(store: &S) -> Result<LocalSnapshot> {
    Ok(LocalSnapshot::from_lists(store.load_all()?))
}

fn external_item(item: RemoteItem) -> Result<ExternalItem> {
    Ok(ExternalItem {
        updated_at: parse_timestamp(item.updated_at.as_deref())?,
        external_id: item.id,
        source_id: item.source_id,
        description: item.description,
        completed: item.completed.unwrap_or(false),
    })
}

/// Parse a remote timestamp. Offset-less values are taken as UTC.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(None),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Some(parsed.and_utc()));
        }
    }
    Err(Error::InvalidInput(format!("Unparsable remote timestamp: {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use listsync_common::ItemId;

    fn ext(id: &str) -> ExternalId {
        ExternalId::new(id).unwrap()
    }

    fn local(id: i64, external_id: Option<&str>) -> TodoList {
        TodoList {
            id: ListId(id),
            external_id: external_id.map(ext),
            name: format!("List {}", id),
            updated_at: Utc::now(),
            synced_at: None,
            items: Vec::new(),
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap();

        assert_eq!(parse_timestamp(Some("2026-02-15T12:00:00Z")).unwrap(), Some(expected));
        assert_eq!(
            parse_timestamp(Some("2026-02-15T14:00:00+02:00")).unwrap(),
            Some(expected)
        );
        assert_eq!(parse_timestamp(Some("2026-02-15 12:00:00")).unwrap(), Some(expected));
        assert_eq!(
            parse_timestamp(Some("2026-02-15T12:00:00.250")).unwrap(),
            Some(expected + Duration::milliseconds(250))
        );
    }

    #[test]
    fn test_parse_timestamp_blank_and_garbage() {
        assert_eq!(parse_timestamp(None).unwrap(), None);
        assert_eq!(parse_timestamp(Some("  ")).unwrap(), None);
        assert!(matches!(
            parse_timestamp(Some("yesterday")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_external_indexes_and_defaults() {
        let lists: Vec<RemoteList> = serde_json::from_str(
            r#"[
                {"id": "ext-2", "name": "Second", "source_id": "4"},
                {"id": "ext-1", "name": "First", "updated_at": "2026-02-15T12:00:00Z",
                 "items": [{"id": "item-1", "description": "Remote item"}]}
            ]"#,
        )
        .unwrap();

        let snapshot = build_external(lists).unwrap();

        let keys: Vec<_> = snapshot.keys().map(ExternalId::as_str).collect();
        assert_eq!(keys, vec!["ext-1", "ext-2"]);
        let first = &snapshot[&ext("ext-1")];
        assert!(first.updated_at.is_some());
        assert!(!first.items[0].completed);
        assert!(first.item(&ext("item-1")).is_some());
        assert_eq!(snapshot[&ext("ext-2")].source_id.as_deref(), Some("4"));
        assert_eq!(snapshot[&ext("ext-2")].updated_at, None);
    }

    #[test]
    fn test_build_external_rejects_bad_item_timestamp() {
        let lists: Vec<RemoteList> = serde_json::from_str(
            r#"[{"id": "ext-1", "name": "First",
                 "items": [{"id": "item-1", "description": "Remote item", "updated_at": "soon"}]}]"#,
        )
        .unwrap();

        assert!(build_external(lists).is_err());
    }

    #[test]
    fn test_local_snapshot_partitions() {
        let mut linked = local(1, Some("ext-1"));
        linked.items.push(listsync_store::TodoItem {
            id: ItemId(1),
            list_id: ListId(1),
            external_id: None,
            description: "Local item".to_string(),
            completed: false,
            updated_at: Utc::now(),
            synced_at: None,
        });
        let snapshot = LocalSnapshot::from_lists(vec![linked, local(2, None), local(3, None)]);

        assert_eq!(snapshot.synced.len(), 1);
        assert_eq!(snapshot.synced[&ext("ext-1")].items.len(), 1);
        assert_eq!(snapshot.unsynced.len(), 2);
        assert_eq!(snapshot.len(), 3);

        let mut ids: Vec<_> = snapshot.list_ids().collect();
        ids.sort();
        assert_eq!(ids, vec![ListId(1), ListId(2), ListId(3)]);
    }
}
