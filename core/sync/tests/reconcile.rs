//! End-to-end reconciliation runs against in-process stores.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

use listsync_common::ExternalId;
use listsync_remote::{MemoryRemote, RemoteApi, RemoteCall, RemoteOp};
use listsync_store::{LocalStore, LocalStoreExt, MemoryStore, NewItem, SqliteStore};
use listsync_sync::{Orchestrator, RecordKey, RunLock, RunOutcome, SyncAction, SyncReport};

fn setup<S: LocalStore>(store: S) -> (Orchestrator<S, MemoryRemote>, Arc<S>, Arc<MemoryRemote>) {
    let store = Arc::new(store);
    let remote = Arc::new(MemoryRemote::new());
    let orchestrator = Orchestrator::with_lock(store.clone(), remote.clone(), RunLock::new());
    (orchestrator, store, remote)
}

async fn run<S: LocalStore>(orchestrator: &Orchestrator<S, MemoryRemote>) -> SyncReport {
    match orchestrator.run().await.unwrap() {
        RunOutcome::Completed(report) => report,
        RunOutcome::Skipped => panic!("run was skipped"),
    }
}

/// Let the clock move past the last watermark.
async fn tick() {
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
}

#[tokio::test]
async fn test_pull_create() {
    let (orchestrator, store, remote) = setup(MemoryStore::new());
    let seeded = remote.seed_list("Remote Only", None, &[("Remote item", false), ("Done item", true)]);

    let report = run(&orchestrator).await;

    assert_eq!(report.counts.pull_creates, 1);
    assert!(report.is_clean());
    let list = store.find_by_external_id(&seeded.id).unwrap().unwrap();
    assert_eq!(list.name, "Remote Only");
    assert!(list.synced_at.is_some());
    assert_eq!(list.items.len(), 2);
    assert_eq!(list.items[0].external_id.as_ref(), Some(&seeded.items[0].id));
    assert!(list.items[1].completed);
    assert!(list.items.iter().all(|item| item.synced_at.is_some()));
}

#[tokio::test]
async fn test_conflict_external_wins() {
    let (orchestrator, store, remote) = setup(MemoryStore::new());
    let now = Utc::now();
    let seeded = remote.seed_list("Remote Name", None, &[("Remote version", true)]);
    remote.touch_list(&seeded.id, now - Duration::hours(1)).unwrap();

    let id = store
        .write(|tx| {
            let id = tx.create_list("Local Name", Some(&seeded.id), now - Duration::hours(2))?;
            let item = NewItem::new("Local version").linked(seeded.items[0].id.clone());
            tx.create_item(id, &item, now - Duration::hours(2))?;
            tx.stamp_list(id, now - Duration::days(1))?;
            Ok(id)
        })
        .unwrap();

    let report = run(&orchestrator).await;

    assert_eq!(report.counts.pull_updates, 1);
    assert_eq!(report.counts.push_updates, 0);
    let list = store.find_list(id).unwrap().unwrap();
    assert_eq!(list.name, "Remote Name");
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].description, "Remote version");
    assert!(list.items[0].completed);
    assert!(!remote
        .calls()
        .iter()
        .any(|call| matches!(call, RemoteCall::UpdateList { .. })));
}

#[tokio::test]
async fn test_push_delete_orphaned_remote_list() {
    let (orchestrator, _store, remote) = setup(MemoryStore::new());
    let orphan = remote.seed_list("Orphan", Some("999"), &[]);

    let report = run(&orchestrator).await;

    assert_eq!(report.counts.push_deletes, 1);
    assert!(report.is_clean());
    assert!(remote.calls().contains(&RemoteCall::DeleteList(orphan.id.clone())));
    assert!(remote.lists().is_empty());
}

#[tokio::test]
async fn test_push_delete_404_is_not_an_error() {
    let (orchestrator, _store, remote) = setup(MemoryStore::new());
    remote.seed_list("Orphan", Some("999"), &[]);
    remote.fail_next(RemoteOp::DeleteList, 404);

    let report = run(&orchestrator).await;

    assert_eq!(report.counts.push_deletes, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_push_create_links_list_and_items() {
    let (orchestrator, store, remote) = setup(MemoryStore::new());
    let id = store
        .write(|tx| {
            let id = tx.create_list("Local Only", None, Utc::now())?;
            tx.create_item(id, &NewItem::new("First local item"), Utc::now())?;
            tx.create_item(id, &NewItem::new("Second local item").completed(true), Utc::now())?;
            Ok(id)
        })
        .unwrap();

    let report = run(&orchestrator).await;

    assert_eq!(report.counts.push_creates, 1);
    let remote_list = remote.lists().remove(0);
    assert_eq!(remote_list.source_id, Some(id.to_string()));
    assert_eq!(remote_list.items.len(), 2);

    let list = store.find_list(id).unwrap().unwrap();
    assert_eq!(list.external_id, Some(remote_list.id.clone()));
    for (local, remote) in list.items.iter().zip(&remote_list.items) {
        assert_eq!(remote.source_id, Some(local.id.to_string()));
        assert_eq!(local.external_id.as_ref(), Some(&remote.id));
        assert!(local.synced_at.is_some());
    }
}

#[tokio::test]
async fn test_second_run_is_a_fixed_point() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join("listsync.db")).unwrap();
    let (orchestrator, store, remote) = setup(store);

    remote.seed_list("Remote Only", None, &[("Remote item", false)]);
    remote.seed_list("Orphan", Some("999"), &[]);
    store
        .write(|tx| {
            let id = tx.create_list("Local Only", None, Utc::now())?;
            tx.create_item(id, &NewItem::new("Local item"), Utc::now())?;
            Ok(())
        })
        .unwrap();

    let first = run(&orchestrator).await;
    assert_eq!(first.counts.pull_creates, 1);
    assert_eq!(first.counts.push_creates, 1);
    assert_eq!(first.counts.push_deletes, 1);
    assert!(first.is_clean());

    tick().await;
    let second = run(&orchestrator).await;
    assert_eq!(second.counts.total(), 0, "{:?}", second.counts);
    assert_eq!(store.load_all().unwrap().len(), 2);
    assert_eq!(remote.lists().len(), 2);
}

#[tokio::test]
async fn test_skipped_while_another_run_holds_the_lock() {
    let (orchestrator, store, remote) = setup(MemoryStore::new());
    remote.seed_list("Remote Only", None, &[]);

    let guard = orchestrator.lock().try_acquire().unwrap();
    let outcome = orchestrator.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Skipped);
    assert!(remote.calls().is_empty());
    assert!(store.load_all().unwrap().is_empty());

    drop(guard);
    assert_eq!(run(&orchestrator).await.counts.pull_creates, 1);
}

#[tokio::test]
async fn test_shared_lock_across_orchestrators() {
    let lock = RunLock::new();
    let remote = Arc::new(MemoryRemote::new());
    let first = Orchestrator::with_lock(Arc::new(MemoryStore::new()), remote.clone(), lock.clone());
    let second = Orchestrator::with_lock(Arc::new(MemoryStore::new()), remote, lock.clone());

    let _guard = first.lock().try_acquire().unwrap();
    assert!(second.run().await.unwrap().is_skipped());
}

#[tokio::test]
async fn test_record_failure_does_not_stop_the_run() {
    let (orchestrator, store, remote) = setup(MemoryStore::new());
    let (failing, passing) = store
        .write(|tx| {
            let failing = tx.create_list("First", None, Utc::now())?;
            let passing = tx.create_list("Second", None, Utc::now())?;
            Ok((failing, passing))
        })
        .unwrap();
    remote.seed_list("Remote Only", None, &[]);
    remote.fail_next(RemoteOp::CreateList, 500);

    let report = run(&orchestrator).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].action, SyncAction::PushCreate);
    assert_eq!(report.errors[0].key, RecordKey::Local(failing));
    assert_eq!(report.counts.pull_creates, 1);
    assert!(store.find_list(failing).unwrap().unwrap().external_id.is_none());
    assert!(store.find_list(passing).unwrap().unwrap().external_id.is_some());

    // The failed list is retried by the next run.
    let report = run(&orchestrator).await;
    assert_eq!(report.counts.push_creates, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_fetch_failure_is_run_level() {
    let (orchestrator, store, remote) = setup(MemoryStore::new());
    store
        .write(|tx| tx.create_list("Local Only", None, Utc::now()))
        .unwrap();
    remote.fail_next(RemoteOp::FetchAll, 503);

    let err = orchestrator.run().await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(!orchestrator.lock().is_held());
    assert!(remote.lists().is_empty());
}

#[tokio::test]
async fn test_unparsable_remote_timestamp_is_run_level() {
    struct BadClock(MemoryRemote);

    #[async_trait::async_trait]
    impl RemoteApi for BadClock {
        async fn fetch_all_lists(&self) -> listsync_common::Result<Vec<listsync_remote::RemoteList>> {
            let mut lists = self.0.fetch_all_lists().await?;
            for list in &mut lists {
                list.updated_at = Some("not a time".to_string());
            }
            Ok(lists)
        }
        async fn create_list(
            &self,
            request: &listsync_remote::CreateListRequest,
        ) -> listsync_common::Result<listsync_remote::RemoteList> {
            self.0.create_list(request).await
        }
        async fn update_list(
            &self,
            id: &ExternalId,
            name: &str,
        ) -> listsync_common::Result<listsync_remote::RemoteList> {
            self.0.update_list(id, name).await
        }
        async fn delete_list(&self, id: &ExternalId) -> listsync_common::Result<()> {
            self.0.delete_list(id).await
        }
        async fn update_item(
            &self,
            list: &ExternalId,
            item: &ExternalId,
            description: &str,
            completed: bool,
        ) -> listsync_common::Result<listsync_remote::RemoteItem> {
            self.0.update_item(list, item, description, completed).await
        }
        async fn delete_item(&self, list: &ExternalId, item: &ExternalId) -> listsync_common::Result<()> {
            self.0.delete_item(list, item).await
        }
    }

    let inner = MemoryRemote::new();
    inner.seed_list("Remote Only", None, &[]);
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::with_lock(store.clone(), Arc::new(BadClock(inner)), RunLock::new());

    assert!(orchestrator.run().await.is_err());
    assert!(store.load_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_item_changes_are_pulled() {
    let (orchestrator, store, remote) = setup(SqliteStore::in_memory().unwrap());
    let seeded = remote.seed_list(
        "Shared",
        None,
        &[("Kept item", false), ("Edited item", false), ("Dropped item", false)],
    );
    run(&orchestrator).await;

    tick().await;
    remote
        .update_item(&seeded.id, &seeded.items[1].id, "Edited remotely", true)
        .await
        .unwrap();
    remote.delete_item(&seeded.id, &seeded.items[2].id).await.unwrap();
    remote.touch_list(&seeded.id, Utc::now()).unwrap();

    let report = run(&orchestrator).await;

    assert_eq!(report.counts.pull_updates, 1);
    let list = store.find_by_external_id(&seeded.id).unwrap().unwrap();
    let items: Vec<_> = list
        .items
        .iter()
        .map(|item| (item.description.as_str(), item.completed))
        .collect();
    assert_eq!(items, vec![("Kept item", false), ("Edited remotely", true)]);

    tick().await;
    assert_eq!(run(&orchestrator).await.counts.total(), 0);
}

#[tokio::test]
async fn test_remote_rename_is_pulled() {
    let (orchestrator, store, remote) = setup(MemoryStore::new());
    let seeded = remote.seed_list("Groceries", None, &[("Buy milk", false)]);
    run(&orchestrator).await;

    tick().await;
    remote.edit_list(&seeded.id, "Weekly groceries", Utc::now()).unwrap();
    remote.clear_calls();

    let report = run(&orchestrator).await;

    assert_eq!(report.counts.pull_updates, 1);
    assert_eq!(report.counts.total(), 1);
    let list = store.find_by_external_id(&seeded.id).unwrap().unwrap();
    assert_eq!(list.name, "Weekly groceries");
    assert_eq!(list.synced_at, Some(list.updated_at));
    assert!(remote.calls().iter().all(|call| matches!(call, RemoteCall::FetchAll)));

    tick().await;
    assert_eq!(run(&orchestrator).await.counts.total(), 0);
}

#[tokio::test]
async fn test_local_changes_are_pushed() {
    let (orchestrator, store, remote) = setup(MemoryStore::new());
    let seeded = remote.seed_list("Shared", None, &[("Remote item", false)]);
    run(&orchestrator).await;
    let list = store.find_by_external_id(&seeded.id).unwrap().unwrap();

    tick().await;
    store
        .write(|tx| {
            tx.update_list_name(list.id, "Renamed locally", Utc::now())?;
            tx.update_item(list.items[0].id, "Edited locally", true, Utc::now())?;
            tx.create_item(list.id, &NewItem::new("Added locally"), Utc::now())?;
            Ok(())
        })
        .unwrap();
    remote.clear_calls();

    let report = run(&orchestrator).await;

    assert_eq!(report.counts.push_updates, 1);
    assert!(report.is_clean());
    let remote_list = remote.list(&seeded.id).unwrap();
    assert_eq!(remote_list.name, "Renamed locally");
    assert_eq!(remote_list.items.len(), 1);
    assert_eq!(remote_list.items[0].description, "Edited locally");
    assert_eq!(remote_list.items[0].completed, Some(true));

    // Items without an external id are not sent and stay unlinked.
    let list = store.find_list(list.id).unwrap().unwrap();
    assert!(list.items[1].external_id.is_none());
    assert!(list.items[1].synced_at.is_none());

    tick().await;
    assert_eq!(run(&orchestrator).await.counts.total(), 0);
}

#[tokio::test]
async fn test_remote_list_removal_is_pulled() {
    let (orchestrator, store, remote) = setup(MemoryStore::new());
    let seeded = remote.seed_list("Short lived", None, &[("Remote item", false)]);
    run(&orchestrator).await;

    remote.remove_list(&seeded.id).unwrap();
    let report = run(&orchestrator).await;

    assert_eq!(report.counts.pull_deletes, 1);
    assert!(store.load_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_local_list_removal_is_pushed() {
    let (orchestrator, store, remote) = setup(MemoryStore::new());
    let id = store
        .write(|tx| tx.create_list("Short lived", None, Utc::now()))
        .unwrap();
    run(&orchestrator).await;
    assert_eq!(remote.lists().len(), 1);

    store.write(|tx| tx.delete_list(id)).unwrap();
    let report = run(&orchestrator).await;

    assert_eq!(report.counts.push_deletes, 1);
    assert!(remote.lists().is_empty());
}
