//! Single-flight reconciliation runs.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use listsync_common::Result;
use listsync_remote::RemoteApi;
use listsync_store::LocalStore;

use crate::diff::SyncDiff;
use crate::lock::RunLock;
use crate::pull::PullExecutor;
use crate::push::PushExecutor;
use crate::report::{RunOutcome, SyncReport};
use crate::snapshot::{build_external, build_local};

/// Drives snapshot, diff, pull and push under a run lock.
pub struct Orchestrator<S: LocalStore + ?Sized, R: RemoteApi + ?Sized> {
    store: Arc<S>,
    remote: Arc<R>,
    lock: RunLock,
}

impl<S: LocalStore + ?Sized, R: RemoteApi + ?Sized> Clone for Orchestrator<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            remote: self.remote.clone(),
            lock: self.lock.clone(),
        }
    }
}

impl<S: LocalStore + ?Sized, R: RemoteApi + ?Sized> Orchestrator<S, R> {
    /// Create an orchestrator guarded by the process-wide lock.
    pub fn new(store: Arc<S>, remote: Arc<R>) -> Self {
        Self::with_lock(store, remote, RunLock::global())
    }

    /// Create an orchestrator guarded by `lock`.
    pub fn with_lock(store: Arc<S>, remote: Arc<R>, lock: RunLock) -> Self {
        Self {
            store,
            remote,
            lock,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn lock(&self) -> &RunLock {
        &self.lock
    }

    /// Run one reconciliation.
    ///
    /// Returns [`RunOutcome::Skipped`] without touching either side if a run
    /// is already active. Record-level failures are collected in the report.
    ///
    /// # Errors
    /// - Fetching or parsing the remote lists fails
    /// - Reading the local store fails
    pub async fn run(&self) -> Result<RunOutcome> {
        let Some(_guard) = self.lock.try_acquire() else {
            warn!("Sync already running, skipping");
            return Ok(RunOutcome::Skipped);
        };

        let started = Instant::now();
        info!("Sync started (store: {})", self.store.name());

        let external = build_external(self.remote.fetch_all_lists().await?)?;
        let local = build_local(self.store.as_ref())?;
        let diff = SyncDiff::compute(&external, &local);
        let counts = diff.counts();

        let mut errors = PullExecutor::new(self.store.as_ref()).execute(&diff);
        errors.extend(
            PushExecutor::new(self.store.as_ref(), self.remote.as_ref())
                .execute(&diff)
                .await,
        );

        let report = SyncReport {
            counts,
            errors,
            duration: started.elapsed(),
        };
        info!("Sync finished in {:?}: {}", report.duration, report.counts);
        if !report.is_clean() {
            let summary: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
            warn!(
                "Sync completed with {} errors: {}",
                report.errors.len(),
                summary.join("; ")
            );
        }

        Ok(RunOutcome::Completed(report))
    }
}
