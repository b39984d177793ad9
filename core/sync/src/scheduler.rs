//! Sync scheduling - periodic runs and on-demand requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use listsync_common::{Error, Result};
use listsync_remote::{RetryConfig, RetryExecutor};

use crate::report::RunOutcome;

/// Sync request types.
#[derive(Debug)]
enum SyncRequest {
    /// Run now, out of schedule.
    Run,
    /// Shutdown the scheduler.
    Shutdown,
}

type Request = (SyncRequest, oneshot::Sender<Result<RunOutcome>>);

/// Front end for requesting runs and stopping the scheduler.
pub struct SyncScheduler {
    /// Channel to send sync requests.
    request_tx: mpsc::Sender<Request>,
    /// Shutdown signal.
    shutdown: Arc<RwLock<bool>>,
}

impl SyncScheduler {
    /// Create a scheduler that runs every `period`.
    ///
    /// A failed scheduled run is retried according to `run_retry`, then
    /// discarded until the next tick.
    pub fn new(period: Duration, run_retry: RetryConfig) -> (Self, SyncSchedulerHandle) {
        let (request_tx, request_rx) = mpsc::channel(16);
        let shutdown = Arc::new(RwLock::new(false));

        let scheduler = Self {
            request_tx,
            shutdown: shutdown.clone(),
        };

        let handle = SyncSchedulerHandle {
            period,
            run_retry: RetryExecutor::new(run_retry),
            run_immediately: false,
            request_rx,
            shutdown,
        };

        (scheduler, handle)
    }

    /// Run once now and wait for the outcome. Not retried.
    pub async fn request_sync(&self) -> Result<RunOutcome> {
        let (response_tx, response_rx) = oneshot::channel();

        self.request_tx
            .send((SyncRequest::Run, response_tx))
            .await
            .map_err(|_| Error::Sync("Scheduler not running".to_string()))?;

        response_rx
            .await
            .map_err(|_| Error::Sync("Failed to receive sync result".to_string()))?
    }

    /// Shutdown the scheduler.
    pub async fn shutdown(&self) {
        *self.shutdown.write().await = true;

        let (response_tx, _) = oneshot::channel();
        let _ = self
            .request_tx
            .send((SyncRequest::Shutdown, response_tx))
            .await;
    }
}

/// Handle for the scheduler background task.
pub struct SyncSchedulerHandle {
    period: Duration,
    run_retry: RetryExecutor,
    run_immediately: bool,
    request_rx: mpsc::Receiver<Request>,
    shutdown: Arc<RwLock<bool>>,
}

impl SyncSchedulerHandle {
    /// Fire the first scheduled run at start instead of after one period.
    pub fn run_immediately(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }

    /// Run the scheduler background task.
    ///
    /// This should be spawned in a tokio task. The `sync_fn` is called
    /// on every tick and on every request.
    pub async fn run<F, Fut>(self, sync_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RunOutcome>> + Send,
    {
        let Self {
            period,
            run_retry,
            run_immediately,
            mut request_rx,
            shutdown,
        } = self;

        let start = if run_immediately {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Sync scheduler started (every {:?})", period);

        loop {
            if *shutdown.read().await {
                info!("Sync scheduler shutting down");
                break;
            }

            tokio::select! {
                request = request_rx.recv() => {
                    match request {
                        Some((SyncRequest::Run, response_tx)) => {
                            debug!("Processing sync request");
                            let _ = response_tx.send(sync_fn().await);
                        }
                        Some((SyncRequest::Shutdown, _)) | None => {
                            info!("Received shutdown request");
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    debug!("Triggering scheduled sync");
                    scheduled_run(&run_retry, &sync_fn).await;
                }
            }
        }
    }
}

/// One scheduled run with run-level retries. Failures end in the log.
async fn scheduled_run<F, Fut>(run_retry: &RetryExecutor, sync_fn: &F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<RunOutcome>>,
{
    let attempts = run_retry.config().attempts();
    match run_retry.execute_if("Scheduled sync", sync_fn, |_| true).await {
        Ok(RunOutcome::Completed(report)) => {
            debug!("Scheduled sync completed: {}", report.counts);
        }
        Ok(RunOutcome::Skipped) => {
            info!("Scheduled sync skipped, a run is already active");
        }
        Err(e) => {
            error!("Scheduled sync discarded after {} attempts: {}", attempts, e);
        }
    }
}
