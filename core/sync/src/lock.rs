//! Single-flight run lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Non-blocking exclusive lock gating reconciliation runs.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct RunLock {
    held: Arc<AtomicBool>,
}

impl RunLock {
    /// Create a private lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide lock.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<RunLock> = OnceLock::new();
        GLOBAL.get_or_init(RunLock::new).clone()
    }

    /// Take the lock if it is free. Never waits.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                held: self.held.clone(),
            })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof of holding a [`RunLock`]; releases it on drop.
#[derive(Debug)]
pub struct RunGuard {
    held: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
