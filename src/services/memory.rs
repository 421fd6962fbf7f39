//! In-memory collaborator implementations for the demo binary and tests.

use super::{
    CallRegistry, EligibilityCheck, EligibilityVerdict, OutcomePatch, RegistrationRequest,
    RegistrationResponse, ResponseStore,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::info;

/// Registry that hands out UUID temporary ids and records every call.
pub struct InMemoryRegistry {
    assistant_ref: String,
    registrations: Mutex<Vec<RegistrationRequest>>,
    reconciliations: Mutex<Vec<(String, String)>>,
    fail_registrations: AtomicBool,
}

impl InMemoryRegistry {
    pub fn new(assistant_ref: impl Into<String>) -> Self {
        Self {
            assistant_ref: assistant_ref.into(),
            registrations: Mutex::new(Vec::new()),
            reconciliations: Mutex::new(Vec::new()),
            fail_registrations: AtomicBool::new(false),
        }
    }

    /// Make subsequent registrations fail, for failure-path tests.
    pub fn set_failing(&self, failing: bool) {
        self.fail_registrations.store(failing, Ordering::SeqCst);
    }

    pub async fn registration_count(&self) -> usize {
        self.registrations.lock().await.len()
    }

    pub async fn reconciliations(&self) -> Vec<(String, String)> {
        self.reconciliations.lock().await.clone()
    }
}

#[async_trait]
impl CallRegistry for InMemoryRegistry {
    async fn register(&self, request: RegistrationRequest) -> Result<RegistrationResponse> {
        if self.fail_registrations.load(Ordering::SeqCst) {
            bail!("call registration service unavailable");
        }
        let resolved = request.dynamic_variables.clone();
        let mut registrations = self.registrations.lock().await;
        registrations.push(request);

        Ok(RegistrationResponse {
            temporary_call_id: format!("tmp-{}", uuid::Uuid::new_v4()),
            assistant_ref: self.assistant_ref.clone(),
            resolved_dynamic_variables: resolved,
        })
    }

    async fn reconcile(&self, temporary_call_id: &str, transport_call_id: &str) -> Result<()> {
        info!(temporary_call_id, transport_call_id, "reconciled call id");
        let mut reconciliations = self.reconciliations.lock().await;
        reconciliations.push((temporary_call_id.to_string(), transport_call_id.to_string()));
        Ok(())
    }
}

/// Store that keeps every patch per call id and can be told to fail writes.
#[derive(Default)]
pub struct InMemoryResponseStore {
    records: Mutex<HashMap<String, Vec<OutcomePatch>>>,
    fail_writes: AtomicBool,
}

impl InMemoryResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent upserts fail, for failure-path tests.
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// All patches written for a call id, oldest first.
    pub async fn patches_for(&self, call_id: &str) -> Vec<OutcomePatch> {
        self.records
            .lock()
            .await
            .get(call_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total writes across all call ids.
    pub async fn write_count(&self) -> usize {
        self.records.lock().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl ResponseStore for InMemoryResponseStore {
    async fn upsert(&self, call_id: &str, patch: OutcomePatch) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("response store unavailable");
        }
        let mut records = self.records.lock().await;
        records.entry(call_id.to_string()).or_default().push(patch);
        Ok(())
    }
}

/// Eligibility check backed by a set of already-completed candidate emails
/// and an optional allow list.
#[derive(Default)]
pub struct StaticEligibility {
    completed: Mutex<HashSet<String>>,
    allowed: Mutex<Option<HashSet<String>>>,
}

impl StaticEligibility {
    pub fn allowing_everyone() -> Self {
        Self::default()
    }

    /// Mark an email as having already completed the interview.
    pub async fn mark_completed(&self, email: &str) {
        self.completed.lock().await.insert(email.to_lowercase());
    }

    /// Restrict attempts to the given respondent emails.
    pub async fn restrict_to(&self, emails: &[&str]) {
        let set = emails.iter().map(|e| e.to_lowercase()).collect();
        *self.allowed.lock().await = Some(set);
    }
}

#[async_trait]
impl EligibilityCheck for StaticEligibility {
    async fn check(&self, _interview_ref: &str, email: &str) -> Result<EligibilityVerdict> {
        let email = email.to_lowercase();

        if self.completed.lock().await.contains(&email) {
            return Ok(EligibilityVerdict::Rejected {
                reason: "You have already completed this interview.".to_string(),
            });
        }
        if let Some(allowed) = self.allowed.lock().await.as_ref() {
            if !allowed.contains(&email) {
                return Ok(EligibilityVerdict::Rejected {
                    reason: "This interview is limited to invited candidates.".to_string(),
                });
            }
        }
        Ok(EligibilityVerdict::Allowed)
    }
}
