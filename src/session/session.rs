use super::persist::PersistenceCoordinator;
use super::state::{is_valid_email, EndReason, SessionMode, SessionStatus};
use crate::config::SessionTuning;
use crate::integrity::{AttentionLossEvent, IntegrityMonitor};
use crate::permission::{MediaHost, MicPermission, PermissionGate};
use crate::services::{
    CallRegistry, CandidateIdentity, EligibilityCheck, EligibilityVerdict, OutcomePatch,
    RegistrationRequest, ResponseStore,
};
use crate::timers::TimerController;
use crate::transcript::{Speaker, TranscriptAggregator, TranscriptTurn};
use crate::transport::{CallDescriptor, TransportEvent, VoiceTransport};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// What the interview is about, fixed for the lifetime of the page.
#[derive(Debug, Clone)]
pub struct InterviewPlan {
    pub interview_ref: String,
    pub objective: String,
    pub job_context: String,
    pub questions: Vec<String>,
    /// Advisory planned length shown to the candidate. Never force-ends the
    /// call; termination is driven by the agent, the transport, or the user.
    pub planned_duration_mins: u32,
    /// Anonymous interviews skip the required-fields gate for scored starts.
    pub anonymous: bool,
}

/// The external collaborators a session is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub media_host: Arc<dyn MediaHost>,
    pub transport: Arc<dyn VoiceTransport>,
    pub registry: Arc<dyn CallRegistry>,
    pub store: Arc<dyn ResponseStore>,
    pub eligibility: Arc<dyn EligibilityCheck>,
}

/// Events the orchestrator sends itself, alongside the transport stream.
#[derive(Debug, Clone, Copy)]
enum ControlEvent {
    PracticeExpired,
}

/// Point-in-time view of the session for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub mode: SessionMode,
    pub muted: bool,
    pub candidate_name: String,
    pub candidate_email: String,
    pub call_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,
    pub rejection_reason: Option<String>,
    pub elapsed_secs: u64,
    pub remaining_secs: u64,
    pub agent_line: String,
    pub candidate_line: String,
    pub agent_speaking: bool,
    pub candidate_speaking: bool,
    pub attention_loss_count: usize,
    pub attention_warning: Option<AttentionLossEvent>,
    pub has_persisted: bool,
}

/// Mutable per-attempt state. Only the state machine and the two components
/// it delegates to (timers, transcript aggregator) write here.
struct SessionInner {
    status: SessionStatus,
    mode: SessionMode,
    candidate_name: String,
    candidate_email: String,
    muted: bool,
    /// Transport-assigned call id, set once the transport confirms.
    call_id: Option<String>,
    /// Registry-assigned id, used until the real call id exists.
    temporary_call_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    end_reason: Option<EndReason>,
    rejection_reason: Option<String>,
    transcript: TranscriptAggregator,
    integrity: IntegrityMonitor,
    agent_speaking: bool,
    candidate_speaking: bool,
    /// Latest detected attention loss, held until the user dismisses it.
    attention_warning: Option<AttentionLossEvent>,
}

impl SessionInner {
    fn fresh(mode: SessionMode, tuning: &SessionTuning) -> Self {
        Self {
            status: SessionStatus::Idle,
            mode,
            candidate_name: String::new(),
            candidate_email: String::new(),
            muted: false,
            call_id: None,
            temporary_call_id: None,
            started_at: None,
            ended_at: None,
            end_reason: None,
            rejection_reason: None,
            transcript: TranscriptAggregator::new(),
            integrity: IntegrityMonitor::new(
                Duration::from_millis(tuning.hidden_threshold_ms),
                Duration::from_millis(tuning.interaction_grace_ms),
            ),
            agent_speaking: false,
            candidate_speaking: false,
            attention_warning: None,
        }
    }
}

struct SessionCore {
    plan: InterviewPlan,
    tuning: SessionTuning,
    practice_duration: Duration,
    inner: Mutex<SessionInner>,
    gate: PermissionGate,
    timers: TimerController,
    transport: Arc<dyn VoiceTransport>,
    registry: Arc<dyn CallRegistry>,
    eligibility: Arc<dyn EligibilityCheck>,
    coordinator: PersistenceCoordinator,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

/// Orchestrates one live interview attempt: owns session status, wires the
/// supporting components together, and decides admissible transitions.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct InterviewSession {
    core: Arc<SessionCore>,
}

impl InterviewSession {
    pub fn new(
        plan: InterviewPlan,
        mode: SessionMode,
        tuning: SessionTuning,
        collaborators: Collaborators,
    ) -> Self {
        let inner = SessionInner::fresh(mode, &tuning);
        let practice_duration = Duration::from_secs(tuning.practice_duration_secs);
        Self {
            core: Arc::new(SessionCore {
                plan,
                tuning,
                practice_duration,
                inner: Mutex::new(inner),
                gate: PermissionGate::new(collaborators.media_host),
                timers: TimerController::new(),
                transport: collaborators.transport,
                registry: collaborators.registry,
                eligibility: collaborators.eligibility,
                coordinator: PersistenceCoordinator::new(collaborators.store),
                event_loop: Mutex::new(None),
            }),
        }
    }

    /// Prompt for microphone access and move the machine accordingly:
    /// granted lands on `ReadyToStart`, denial returns to `Idle` so the user
    /// can retry.
    pub async fn request_permission(&self) -> MicPermission {
        {
            let mut inner = self.core.inner.lock().await;
            if inner.status == SessionStatus::Idle {
                self.core
                    .set_status(&mut inner, SessionStatus::PermissionPending);
            }
        }

        let outcome = self.core.gate.request_access().await;

        let mut inner = self.core.inner.lock().await;
        if inner.status == SessionStatus::PermissionPending {
            let next = match outcome {
                MicPermission::Granted => SessionStatus::ReadyToStart,
                MicPermission::Denied | MicPermission::Prompt => SessionStatus::Idle,
            };
            self.core.set_status(&mut inner, next);
        }
        outcome
    }

    /// Record candidate identity. Allowed at any point before the session
    /// ends; the outcome write reads whatever is current at that moment.
    pub async fn set_candidate(&self, name: &str, email: &str) {
        let mut inner = self.core.inner.lock().await;
        if inner.status.is_terminal() {
            warn!("ignoring candidate update on a finished session");
            return;
        }
        inner.candidate_name = name.to_string();
        inner.candidate_email = email.to_string();
    }

    /// Explicit start action. Runs the gating sequence and, if everything
    /// passes, registers the call and starts the transport.
    ///
    /// An eligibility rejection is not an error: the session lands on
    /// `Rejected` with a user-facing reason and `Ok(())` is returned.
    /// Registration or transport failures revert to `ReadyToStart` and
    /// surface as `Err` so the user can retry without reloading.
    pub async fn start(&self) -> Result<()> {
        let core = &self.core;

        {
            let inner = core.inner.lock().await;
            if inner.status != SessionStatus::ReadyToStart {
                bail!("session is not ready to start");
            }
        }

        if core.gate.status().await != MicPermission::Granted {
            bail!("microphone permission has not been granted");
        }
        // Just-in-time probe: permission can be revoked between grant and use.
        if !core.gate.probe().await {
            bail!("microphone access is no longer available");
        }

        let (mode, candidate, variables) = {
            let inner = core.inner.lock().await;
            let candidate = CandidateIdentity {
                name: inner.candidate_name.trim().to_string(),
                email: inner.candidate_email.trim().to_string(),
            };
            let variables = core.dynamic_variables(&inner);
            (inner.mode, candidate, variables)
        };

        if mode == SessionMode::Scored
            && !core.plan.anonymous
            && (candidate.name.is_empty() || !is_valid_email(&candidate.email))
        {
            bail!("candidate name and a valid email are required");
        }

        if mode == SessionMode::Scored {
            let verdict = core
                .eligibility
                .check(&core.plan.interview_ref, &candidate.email)
                .await
                .context("eligibility check failed")?;
            if let EligibilityVerdict::Rejected { reason } = verdict {
                info!(%reason, "candidate not eligible; session rejected");
                let mut inner = core.inner.lock().await;
                if core.set_status(&mut inner, SessionStatus::Rejected) {
                    inner.rejection_reason = Some(reason);
                }
                return Ok(());
            }
        }

        {
            // State may have moved while the checks above were awaited.
            let mut inner = core.inner.lock().await;
            if inner.status != SessionStatus::ReadyToStart {
                bail!("session is not ready to start");
            }
            core.set_status(&mut inner, SessionStatus::Connecting);
        }

        let request = RegistrationRequest {
            candidate,
            interview_ref: core.plan.interview_ref.clone(),
            dynamic_variables: variables,
            mode,
        };
        let response = match core.registry.register(request).await {
            Ok(response) => response,
            Err(e) => {
                core.revert_to_ready().await;
                return Err(e).context("call registration failed");
            }
        };

        {
            let mut inner = core.inner.lock().await;
            inner.temporary_call_id = Some(response.temporary_call_id.clone());
        }

        let descriptor = CallDescriptor {
            assistant_ref: response.assistant_ref,
            dynamic_variables: response.resolved_dynamic_variables,
        };
        let transport_rx = match core.transport.start(&descriptor).await {
            Ok(rx) => rx,
            Err(e) => {
                core.revert_to_ready().await;
                return Err(e).context("voice transport failed to start");
            }
        };
        info!(transport = core.transport.name(), "voice transport starting");

        let (control_tx, control_rx) = mpsc::channel(8);
        let task =
            SessionCore::spawn_event_loop(Arc::clone(core), transport_rx, control_tx, control_rx);
        let mut slot = core.event_loop.lock().await;
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }

        Ok(())
    }

    /// Explicit end action: force the transport to stop, then finalize.
    pub async fn end(&self) -> Result<()> {
        {
            let inner = self.core.inner.lock().await;
            if !matches!(
                inner.status,
                SessionStatus::Connecting | SessionStatus::Connected
            ) {
                bail!("no active call to end");
            }
        }
        info!("user requested end of session");
        // Finalize before asking the transport to stop, so the end reason
        // reflects the user action rather than the stop confirmation that
        // races in right behind it.
        self.core.finalize(EndReason::UserAction).await;
        if let Err(e) = self.core.transport.stop().await {
            warn!("transport stop failed: {e:#}");
        }
        Ok(())
    }

    /// Toggle the candidate's mute state. Only meaningful while connected.
    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        {
            let inner = self.core.inner.lock().await;
            if inner.status != SessionStatus::Connected {
                bail!("mute can only change during a connected session");
            }
        }
        self.core.transport.set_muted(muted).await?;
        let mut inner = self.core.inner.lock().await;
        inner.muted = muted;
        Ok(())
    }

    /// Forward a pointer/keyboard interaction to the integrity monitor.
    pub async fn note_interaction(&self) {
        let mut inner = self.core.inner.lock().await;
        inner.integrity.note_interaction();
    }

    /// The page went hidden.
    pub async fn page_hidden(&self) {
        let mut inner = self.core.inner.lock().await;
        inner.integrity.on_hidden();
    }

    /// The page became visible again. Returns the attention-loss event if
    /// this hide qualified; the same event is held as the pending in-session
    /// warning until dismissed.
    pub async fn page_visible(&self) -> Option<AttentionLossEvent> {
        let mut inner = self.core.inner.lock().await;
        let event = inner.integrity.on_visible()?;
        info!(
            hidden_ms = event.hidden_duration_ms,
            total = inner.integrity.count(),
            "attention loss detected"
        );
        inner.attention_warning = Some(event.clone());
        Some(event)
    }

    /// Dismiss the in-session attention warning.
    pub async fn dismiss_attention_warning(&self) {
        let mut inner = self.core.inner.lock().await;
        inner.attention_warning = None;
    }

    pub async fn status(&self) -> SessionStatus {
        self.core.inner.lock().await.status
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.core.inner.lock().await;
        SessionSnapshot {
            status: inner.status,
            mode: inner.mode,
            muted: inner.muted,
            candidate_name: inner.candidate_name.clone(),
            candidate_email: inner.candidate_email.clone(),
            call_id: inner.call_id.clone(),
            started_at: inner.started_at,
            ended_at: inner.ended_at,
            end_reason: inner.end_reason,
            rejection_reason: inner.rejection_reason.clone(),
            elapsed_secs: self.core.timers.elapsed_secs(),
            remaining_secs: self.core.timers.remaining_secs(),
            agent_line: inner.transcript.live_line(Speaker::Agent).to_string(),
            candidate_line: inner.transcript.live_line(Speaker::Candidate).to_string(),
            agent_speaking: inner.agent_speaking,
            candidate_speaking: inner.candidate_speaking,
            attention_loss_count: inner.integrity.count(),
            attention_warning: inner.attention_warning.clone(),
            has_persisted: self.core.coordinator.has_persisted(),
        }
    }

    /// The full ordered transcript collected so far.
    pub async fn transcript_turns(&self) -> Vec<TranscriptTurn> {
        self.core.inner.lock().await.transcript.turns().to_vec()
    }

    /// The ordered attention-loss events collected so far.
    pub async fn attention_events(&self) -> Vec<AttentionLossEvent> {
        self.core.inner.lock().await.integrity.events().to_vec()
    }

    pub fn has_persisted(&self) -> bool {
        self.core.coordinator.has_persisted()
    }

    /// Tear down the finished attempt and rebuild for a new one (for
    /// example "start the real interview" after a practice run). Candidate
    /// identity and a still-granted permission survive; everything else,
    /// including the persistence guard, is rebuilt fresh.
    pub async fn reset_for_new_attempt(&self, mode: SessionMode) -> Result<()> {
        {
            let inner = self.core.inner.lock().await;
            if !inner.status.is_terminal() {
                bail!("previous attempt is still in progress");
            }
        }

        self.core.timers.stop().await;
        {
            let mut slot = self.core.event_loop.lock().await;
            if let Some(task) = slot.take() {
                task.abort();
            }
        }

        let permission = self.core.gate.status().await;
        {
            let mut inner = self.core.inner.lock().await;
            let name = std::mem::take(&mut inner.candidate_name);
            let email = std::mem::take(&mut inner.candidate_email);
            *inner = SessionInner::fresh(mode, &self.core.tuning);
            inner.candidate_name = name;
            inner.candidate_email = email;
            inner.status = if permission == MicPermission::Granted {
                SessionStatus::ReadyToStart
            } else {
                SessionStatus::Idle
            };
        }
        self.core.coordinator.rearm();
        info!(mode = ?mode, "session reset for a new attempt");
        Ok(())
    }
}

impl SessionCore {
    /// Apply a transition if the table admits it.
    fn set_status(&self, inner: &mut SessionInner, next: SessionStatus) -> bool {
        if !inner.status.can_transition_to(next) {
            warn!(from = ?inner.status, to = ?next, "refused inadmissible transition");
            return false;
        }
        info!(from = ?inner.status, to = ?next, "session transition");
        inner.status = next;
        true
    }

    async fn revert_to_ready(&self) {
        let mut inner = self.inner.lock().await;
        if inner.status == SessionStatus::Connecting {
            self.set_status(&mut inner, SessionStatus::ReadyToStart);
        }
    }

    fn dynamic_variables(&self, inner: &SessionInner) -> HashMap<String, String> {
        let mut variables = HashMap::new();
        variables.insert(
            "candidate_name".to_string(),
            inner.candidate_name.trim().to_string(),
        );
        variables.insert(
            "duration_mins".to_string(),
            self.plan.planned_duration_mins.to_string(),
        );
        variables.insert("objective".to_string(), self.plan.objective.clone());
        variables.insert("job_context".to_string(), self.plan.job_context.clone());
        variables.insert(
            "questions".to_string(),
            serde_json::to_string(&self.plan.questions).unwrap_or_default(),
        );
        variables
    }

    /// One event loop per started attempt: registered at `connecting` entry,
    /// gone by `ended` exit. All transport and timer events funnel through
    /// here so terminal state has a single writer path.
    fn spawn_event_loop(
        core: Arc<SessionCore>,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
        control_tx: mpsc::Sender<ControlEvent>,
        mut control_rx: mpsc::Receiver<ControlEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("session event loop started");
            loop {
                tokio::select! {
                    event = transport_rx.recv() => match event {
                        Some(event) => {
                            if core.handle_transport_event(event, &control_tx).await {
                                break;
                            }
                        }
                        None => {
                            // Channel gone without a CallEnded; treat it the same.
                            core.finalize(EndReason::TransportEnded).await;
                            break;
                        }
                    },
                    event = control_rx.recv() => {
                        if let Some(ControlEvent::PracticeExpired) = event {
                            core.handle_practice_expired().await;
                        }
                    }
                }
            }
            info!("session event loop stopped");
        })
    }

    /// Returns true once the loop should exit.
    async fn handle_transport_event(
        &self,
        event: TransportEvent,
        control_tx: &mpsc::Sender<ControlEvent>,
    ) -> bool {
        match event {
            TransportEvent::CallStarted { call_id } => {
                self.handle_call_started(call_id, control_tx).await;
                false
            }
            TransportEvent::Transcript(fragment) => {
                let mut inner = self.inner.lock().await;
                if matches!(
                    inner.status,
                    SessionStatus::Connecting | SessionStatus::Connected
                ) {
                    inner.transcript.ingest(fragment);
                }
                false
            }
            TransportEvent::SpeechStarted(speaker) => {
                let mut inner = self.inner.lock().await;
                match speaker {
                    Speaker::Agent => inner.agent_speaking = true,
                    Speaker::Candidate => inner.candidate_speaking = true,
                }
                false
            }
            TransportEvent::SpeechEnded(speaker) => {
                let mut inner = self.inner.lock().await;
                match speaker {
                    Speaker::Agent => inner.agent_speaking = false,
                    Speaker::Candidate => inner.candidate_speaking = false,
                }
                false
            }
            TransportEvent::CallEnded => {
                info!("transport reported call ended");
                // First-responder persistence call site; finalize below is
                // the backstop. The coordinator picks one winner.
                self.persist_outcome().await;
                self.finalize(EndReason::TransportEnded).await;
                true
            }
            TransportEvent::Error { message } => {
                error!(%message, "transport error; forcing stop");
                if let Err(e) = self.transport.stop().await {
                    warn!("transport stop failed: {e:#}");
                }
                self.finalize(EndReason::TransportError).await;
                true
            }
        }
    }

    async fn handle_call_started(&self, call_id: String, control_tx: &mpsc::Sender<ControlEvent>) {
        let (mode, temporary_call_id) = {
            let mut inner = self.inner.lock().await;
            if !self.set_status(&mut inner, SessionStatus::Connected) {
                return;
            }
            inner.started_at = Some(Utc::now());
            inner.call_id = Some(call_id.clone());
            // Mute is forced on at connect regardless of any prior toggle;
            // the participant must explicitly unmute.
            inner.muted = true;
            if inner.mode == SessionMode::Scored {
                inner.integrity.set_tracking(true);
            }
            (inner.mode, inner.temporary_call_id.clone())
        };

        if let Err(e) = self.transport.set_muted(true).await {
            warn!("failed to force mute at connect: {e:#}");
        }

        if let Some(temporary_call_id) = temporary_call_id {
            // Bookkeeping only; a failure never interrupts the live call.
            if let Err(e) = self.registry.reconcile(&temporary_call_id, &call_id).await {
                warn!("call id reconciliation failed: {e:#}");
            }
        }

        match mode {
            SessionMode::Scored => self.timers.start_elapsed().await,
            SessionMode::Practice => {
                self.timers
                    .start_countdown(
                        self.practice_duration,
                        control_tx.clone(),
                        ControlEvent::PracticeExpired,
                    )
                    .await
            }
        }
    }

    async fn handle_practice_expired(&self) {
        {
            let inner = self.inner.lock().await;
            if inner.status != SessionStatus::Connected {
                return;
            }
        }
        info!("practice time is up; stopping transport");
        // Deliberately does not set Ended itself: the transport's own
        // CallEnded completes the transition so terminal state keeps a
        // single writer.
        if let Err(e) = self.transport.stop().await {
            warn!("transport stop failed: {e:#}");
        }
    }

    /// Move to `Ended`, releasing resources in order: timers, then the
    /// tracking flag, then terminal state and the outcome write. Safe to
    /// call from any completion path; only the first caller does anything.
    async fn finalize(&self, reason: EndReason) {
        self.timers.stop().await;
        {
            let mut inner = self.inner.lock().await;
            if inner.status.is_terminal() {
                return;
            }
            inner.integrity.set_tracking(false);
            if !self.set_status(&mut inner, SessionStatus::Ended) {
                return;
            }
            inner.ended_at = Some(Utc::now());
            inner.end_reason = Some(reason);
            inner.agent_speaking = false;
            inner.candidate_speaking = false;
        }
        self.persist_outcome().await;
    }

    /// Write the outcome for scored sessions. Identity and integrity data
    /// are read from the live session at this moment, not from values
    /// captured at start; the candidate may still have been filling in the
    /// identity form during the early part of the call.
    async fn persist_outcome(&self) {
        let (mode, call_id, patch) = {
            let inner = self.inner.lock().await;
            let call_id = inner
                .call_id
                .clone()
                .or_else(|| inner.temporary_call_id.clone());
            let patch = OutcomePatch {
                ended: true,
                attention_loss_count: Some(inner.integrity.count() as u64),
                attention_loss_events: Some(inner.integrity.events().to_vec()),
                candidate_name: Some(inner.candidate_name.clone()),
                candidate_email: Some(inner.candidate_email.clone()),
            };
            (inner.mode, call_id, patch)
        };

        // Practice sessions never persist.
        if mode == SessionMode::Practice {
            return;
        }
        let Some(call_id) = call_id else {
            warn!("no call id for this attempt; skipping outcome write");
            return;
        };
        self.coordinator.persist_outcome(&call_id, patch).await;
    }
}
