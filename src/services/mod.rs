//! External collaborators
//!
//! The orchestrator consumes three backend services; all of them live behind
//! trait seams so the session logic never knows a wire format:
//! - [`CallRegistry`]: registers a call before the transport starts and
//!   later reconciles the temporary id with the transport-assigned one.
//! - [`ResponseStore`]: upsert-by-call-id persistence for the session
//!   outcome. Accepts partial field sets; identity fields may arrive in an
//!   earlier write than the final `ended` write.
//! - [`EligibilityCheck`]: whether this candidate may still attempt the
//!   interview.

mod memory;

pub use memory::{InMemoryRegistry, InMemoryResponseStore, StaticEligibility};

use crate::integrity::AttentionLossEvent;
use crate::session::SessionMode;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who is taking the interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub name: String,
    pub email: String,
}

/// Call registration request, sent before the transport is started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub candidate: CandidateIdentity,
    pub interview_ref: String,
    pub dynamic_variables: HashMap<String, String>,
    pub mode: SessionMode,
}

/// Registration response: a temporary call id to key early writes by, the
/// assistant to start, and the server-resolved variable map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub temporary_call_id: String,
    pub assistant_ref: String,
    pub resolved_dynamic_variables: HashMap<String, String>,
}

/// Partial outcome write. Every field except `ended` is optional so earlier
/// writes can carry identity alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutcomePatch {
    pub ended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attention_loss_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attention_loss_events: Option<Vec<AttentionLossEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_email: Option<String>,
}

/// Outcome of the pre-start eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilityVerdict {
    Allowed,
    /// The candidate may not attempt this interview. The reason is shown to
    /// the user as-is; this is not a technical error.
    Rejected { reason: String },
}

/// Call-registration service.
#[async_trait]
pub trait CallRegistry: Send + Sync {
    async fn register(&self, request: RegistrationRequest) -> Result<RegistrationResponse>;

    /// Swap the temporary call id for the transport-assigned real one once
    /// the transport confirms the call.
    async fn reconcile(&self, temporary_call_id: &str, transport_call_id: &str) -> Result<()>;
}

/// Response-persistence service.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn upsert(&self, call_id: &str, patch: OutcomePatch) -> Result<()>;
}

/// Pre-start candidate eligibility.
#[async_trait]
pub trait EligibilityCheck: Send + Sync {
    async fn check(&self, interview_ref: &str, email: &str) -> Result<EligibilityVerdict>;
}
