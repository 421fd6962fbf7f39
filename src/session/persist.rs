use crate::services::{OutcomePatch, ResponseStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Guarantees the session outcome is written at most once per attempt.
///
/// Two independent call sites race to finalize a scored session (the
/// transport's own end event, and the orchestrator's completion backstop);
/// the guard is claimed with a compare-and-swap *before* the write is
/// awaited, so a second trigger arriving in the same tick can never start a
/// second write. The guard is the only representation of `has_persisted`
/// and this coordinator is its only writer.
pub struct PersistenceCoordinator {
    store: Arc<dyn ResponseStore>,
    has_persisted: AtomicBool,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<dyn ResponseStore>) -> Self {
        Self {
            store,
            has_persisted: AtomicBool::new(false),
        }
    }

    /// Write the outcome, keyed by `call_id`. Returns whether this call won
    /// the guard (and therefore attempted the write).
    ///
    /// A failed write is logged and not retried; the guard stays claimed
    /// either way, and the user-visible ended screen never waits on it.
    pub async fn persist_outcome(&self, call_id: &str, patch: OutcomePatch) -> bool {
        if self
            .has_persisted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(call_id, "outcome already persisted; skipping");
            return false;
        }

        match self.store.upsert(call_id, patch).await {
            Ok(()) => info!(call_id, "session outcome persisted"),
            Err(e) => error!(call_id, "failed to persist session outcome: {e:#}"),
        }
        true
    }

    pub fn has_persisted(&self) -> bool {
        self.has_persisted.load(Ordering::SeqCst)
    }

    /// Re-arm the guard for a brand-new attempt.
    pub fn rearm(&self) {
        self.has_persisted.store(false, Ordering::SeqCst);
    }
}
