//! Attention integrity monitoring
//!
//! Watches page-visibility changes during a connected, scored session and
//! records discrete attention-loss events. Quick glances and hides triggered
//! by the candidate's own input are filtered out:
//! - the tab must stay hidden for more than [`HIDDEN_THRESHOLD`], and
//! - no pointer/keyboard interaction may have happened within
//!   [`INTERACTION_GRACE`] before the hide (a notification click the
//!   candidate caused themselves is not a loss of attention).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Minimum hidden span that counts as an attention loss.
pub const HIDDEN_THRESHOLD: Duration = Duration::from_millis(1000);

/// Window before a hide in which user input excuses it.
pub const INTERACTION_GRACE: Duration = Duration::from_millis(500);

/// One detected instance of the candidate's tab being hidden mid-session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionLossEvent {
    pub timestamp: DateTime<Utc>,
    pub hidden_duration_ms: u64,
}

/// Tracks visibility changes and emits [`AttentionLossEvent`]s.
///
/// The monitor is mounted for the whole page lifetime but only counts while
/// tracking is enabled, which the orchestrator flips on for connected scored
/// sessions and off for everything else.
#[derive(Debug)]
pub struct IntegrityMonitor {
    tracking: bool,
    hidden_threshold: Duration,
    interaction_grace: Duration,
    /// When the page went hidden, and whether that hide was preceded by a
    /// qualifying user interaction.
    hidden_at: Option<(Instant, bool)>,
    last_interaction: Option<Instant>,
    events: Vec<AttentionLossEvent>,
}

impl Default for IntegrityMonitor {
    fn default() -> Self {
        Self::new(HIDDEN_THRESHOLD, INTERACTION_GRACE)
    }
}

impl IntegrityMonitor {
    pub fn new(hidden_threshold: Duration, interaction_grace: Duration) -> Self {
        Self {
            tracking: false,
            hidden_threshold,
            interaction_grace,
            hidden_at: None,
            last_interaction: None,
            events: Vec::new(),
        }
    }

    /// Enable or disable counting. Either flip discards a pending hide so
    /// activity straddling the boundary is never counted.
    pub fn set_tracking(&mut self, tracking: bool) {
        self.tracking = tracking;
        self.hidden_at = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Record a pointer or keyboard interaction.
    pub fn note_interaction(&mut self) {
        self.last_interaction = Some(Instant::now());
    }

    /// The page went hidden.
    pub fn on_hidden(&mut self) {
        let now = Instant::now();
        let recently_interacting = self
            .last_interaction
            .is_some_and(|at| now.duration_since(at) <= self.interaction_grace);
        self.hidden_at = Some((now, recently_interacting));
    }

    /// The page became visible again. Returns the event if this hide
    /// qualified as an attention loss.
    pub fn on_visible(&mut self) -> Option<AttentionLossEvent> {
        // A spurious "visible" with no recorded hide is ignored.
        let (hidden_at, recently_interacting) = self.hidden_at.take()?;

        if !self.tracking {
            return None;
        }

        let hidden_duration = hidden_at.elapsed();
        if hidden_duration <= self.hidden_threshold {
            debug!(
                hidden_ms = hidden_duration.as_millis() as u64,
                "hide too short to count as attention loss"
            );
            return None;
        }
        if recently_interacting {
            debug!("hide followed user interaction; not counted");
            return None;
        }

        let event = AttentionLossEvent {
            timestamp: Utc::now(),
            hidden_duration_ms: hidden_duration.as_millis() as u64,
        };
        self.events.push(event.clone());
        Some(event)
    }

    /// Monotonically increasing count of detected events.
    pub fn count(&self) -> usize {
        self.events.len()
    }

    /// The full ordered event list.
    pub fn events(&self) -> &[AttentionLossEvent] {
        &self.events
    }
}
