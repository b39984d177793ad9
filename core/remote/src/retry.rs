//! Exponential backoff for remote calls and whole sync runs.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use listsync_common::{Error, Result};

/// Retries after the first attempt, unless configured otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_MULTIPLIER: f64 = 2.0;
const DEFAULT_JITTER: f64 = 0.25;

/// Backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Upper bound before jitter is applied.
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of each delay randomly added or removed, in `0.0..=1.0`.
    pub jitter: f64,
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: DEFAULT_JITTER,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Fixed delays, for tests and tight loops.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let growth = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let mut secs = (self.initial_delay.as_secs_f64() * growth).min(self.max_delay.as_secs_f64());

        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter > 0.0 {
            secs *= 1.0 - jitter + rand::random::<f64>() * 2.0 * jitter;
        }

        Duration::from_secs_f64(secs.max(0.0))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

/// Runs fallible async operations under a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation`, retrying failures accepted by `retryable`.
    ///
    /// `label` names the operation in log lines. Callers usually pass
    /// [`Error::is_transient`] or a narrower predicate built on it.
    pub async fn execute_if<F, Fut, T, C>(&self, label: &str, operation: F, retryable: C) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&Error) -> bool,
    {
        let attempts = self.config.attempts();
        let mut attempt = 1;

        loop {
            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}/{}", label, attempt, attempts);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !retryable(&err) || attempt >= attempts {
                if attempt > 1 {
                    warn!("{} gave up after {} attempts: {}", label, attempt, err);
                }
                return Err(err);
            }

            let delay = self.config.delay_before_retry(attempt);
            warn!(
                "{} attempt {}/{} failed: {}; retrying in {:?}",
                label, attempt, attempts, err, delay
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}
