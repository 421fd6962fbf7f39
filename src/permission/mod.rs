//! Microphone permission gate
//!
//! Wraps the host platform's media-device access behind the [`MediaHost`]
//! trait and tracks the last observed permission status. Every acquisition
//! is probe-only: the device handle is released immediately, because the
//! voice transport must be the only holder of the microphone during a call.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Microphone permission as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicPermission {
    Granted,
    Denied,
    /// Unknown; the host would prompt. Also the fallback where the host
    /// cannot report ambient permission state without prompting.
    Prompt,
}

/// An acquired audio-only device handle. Releases the device on drop.
#[derive(Debug)]
pub struct MicProbe {
    device: String,
}

impl MicProbe {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl Drop for MicProbe {
    fn drop(&mut self) {
        debug!(device = %self.device, "released microphone probe");
    }
}

/// Outcome of a microphone request: an exclusive probe handle, or a denial.
#[derive(Debug)]
pub enum MicGrant {
    Granted(MicProbe),
    Denied,
}

/// Host platform media access.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Prompt for (or silently acquire, if already granted) an audio-only
    /// stream. `Err` is reserved for host faults; an ordinary user denial is
    /// `Ok(MicGrant::Denied)`.
    async fn request_microphone(&self) -> Result<MicGrant>;

    /// Ambient permission state, without prompting.
    fn query_permission(&self) -> MicPermission;
}

/// Requests and tracks microphone authorization for one session.
pub struct PermissionGate {
    host: Arc<dyn MediaHost>,
    status: Mutex<MicPermission>,
}

impl PermissionGate {
    pub fn new(host: Arc<dyn MediaHost>) -> Self {
        let initial = host.query_permission();
        Self {
            host,
            status: Mutex::new(initial),
        }
    }

    /// Prompt the user and record the outcome. Denial is a status value,
    /// never an error; host faults are folded into `Denied` so the caller
    /// can always offer a retry.
    pub async fn request_access(&self) -> MicPermission {
        let outcome = match self.host.request_microphone().await {
            Ok(MicGrant::Granted(probe)) => {
                drop(probe);
                MicPermission::Granted
            }
            Ok(MicGrant::Denied) => MicPermission::Denied,
            Err(e) => {
                warn!("microphone request failed: {e:#}");
                MicPermission::Denied
            }
        };

        let mut status = self.status.lock().await;
        *status = outcome;
        outcome
    }

    /// Just-in-time access check, run directly before a session start.
    /// Always re-acquires and immediately releases, so a grant revoked since
    /// the original prompt is caught here.
    pub async fn probe(&self) -> bool {
        let ok = matches!(
            self.host.request_microphone().await,
            Ok(MicGrant::Granted(_))
        );
        let mut status = self.status.lock().await;
        *status = if ok {
            MicPermission::Granted
        } else {
            MicPermission::Denied
        };
        ok
    }

    /// Last observed permission status.
    pub async fn status(&self) -> MicPermission {
        *self.status.lock().await
    }
}

/// Deterministic [`MediaHost`] for the demo binary and tests.
pub struct StaticMediaHost {
    grant: AtomicBool,
    probes: AtomicUsize,
}

impl StaticMediaHost {
    pub fn granting() -> Self {
        Self::new(true)
    }

    pub fn denying() -> Self {
        Self::new(false)
    }

    fn new(grant: bool) -> Self {
        Self {
            grant: AtomicBool::new(grant),
            probes: AtomicUsize::new(0),
        }
    }

    /// Flip the grant outcome, simulating a revocation (or late grant).
    pub fn set_granting(&self, grant: bool) {
        self.grant.store(grant, Ordering::SeqCst);
    }

    /// How many times the microphone was actually acquired.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaHost for StaticMediaHost {
    async fn request_microphone(&self) -> Result<MicGrant> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.grant.load(Ordering::SeqCst) {
            Ok(MicGrant::Granted(MicProbe::new("static-host")))
        } else {
            Ok(MicGrant::Denied)
        }
    }

    fn query_permission(&self) -> MicPermission {
        // The static host never knows ambient state up front.
        MicPermission::Prompt
    }
}
