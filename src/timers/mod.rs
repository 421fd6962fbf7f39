//! Session timers
//!
//! Two mutually exclusive timers, one active at a time:
//! - an elapsed-seconds counter for scored sessions (display only; it never
//!   ends the call), and
//! - a fixed countdown for practice sessions, which notifies the
//!   orchestrator once on expiry and stops itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Runs the session's single active timer as a spawned tick task.
pub struct TimerController {
    elapsed_secs: Arc<AtomicU64>,
    remaining_secs: Arc<AtomicU64>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for TimerController {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerController {
    pub fn new() -> Self {
        Self {
            elapsed_secs: Arc::new(AtomicU64::new(0)),
            remaining_secs: Arc::new(AtomicU64::new(0)),
            tick_task: Mutex::new(None),
        }
    }

    /// Start counting elapsed seconds from zero. Stops any running timer.
    pub async fn start_elapsed(&self) {
        self.stop().await;
        self.elapsed_secs.store(0, Ordering::SeqCst);

        let elapsed = Arc::clone(&self.elapsed_secs);
        let task = tokio::spawn(async move {
            debug!("elapsed timer started");
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                elapsed.fetch_add(1, Ordering::SeqCst);
            }
        });

        let mut slot = self.tick_task.lock().await;
        *slot = Some(task);
    }

    /// Start a countdown from `total`. Sends `expired_event` once when it
    /// reaches zero, then stops. Stops any running timer first.
    pub async fn start_countdown<E: Send + 'static>(
        &self,
        total: Duration,
        expired_tx: mpsc::Sender<E>,
        expired_event: E,
    ) {
        self.stop().await;
        let total_secs = total.as_secs();
        self.remaining_secs.store(total_secs, Ordering::SeqCst);

        let remaining = Arc::clone(&self.remaining_secs);
        let task = tokio::spawn(async move {
            debug!(total_secs, "practice countdown started");
            for _ in 0..total_secs {
                tokio::time::sleep(Duration::from_secs(1)).await;
                remaining.fetch_sub(1, Ordering::SeqCst);
            }
            info!("practice countdown expired");
            // The orchestrator may already be tearing down; a closed channel
            // just means nobody is left to care.
            let _ = expired_tx.send(expired_event).await;
        });

        let mut slot = self.tick_task.lock().await;
        *slot = Some(task);
    }

    /// Abort whichever timer is running.
    pub async fn stop(&self) {
        let mut slot = self.tick_task.lock().await;
        if let Some(task) = slot.take() {
            task.abort();
        }
    }

    /// Seconds elapsed under the scored timer.
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs.load(Ordering::SeqCst)
    }

    /// Seconds remaining under the practice countdown.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs.load(Ordering::SeqCst)
    }
}
