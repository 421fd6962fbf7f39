// End-to-end orchestrator tests: scripted transport, in-memory
// collaborators, paused time.

use std::sync::Arc;
use std::time::Duration;
use talentrial_session::{
    Collaborators, EndReason, FragmentKind, InMemoryRegistry, InMemoryResponseStore,
    InterviewPlan, InterviewSession, MicPermission, ScriptStep, ScriptedTransport, SessionMode,
    SessionStatus, SessionTuning, Speaker, StaticEligibility, StaticMediaHost,
    TranscriptFragment, TransportEvent,
};

struct Harness {
    session: InterviewSession,
    transport: Arc<ScriptedTransport>,
    registry: Arc<InMemoryRegistry>,
    store: Arc<InMemoryResponseStore>,
    eligibility: Arc<StaticEligibility>,
    media_host: Arc<StaticMediaHost>,
}

fn plan() -> InterviewPlan {
    InterviewPlan {
        interview_ref: "interview-1".to_string(),
        objective: "Backend fundamentals".to_string(),
        job_context: "Rust engineer".to_string(),
        questions: vec!["Tell me about a project.".to_string()],
        planned_duration_mins: 15,
        anonymous: false,
    }
}

fn harness(mode: SessionMode, script: Vec<ScriptStep>) -> Harness {
    harness_with_tuning(mode, script, SessionTuning::default())
}

fn harness_with_tuning(
    mode: SessionMode,
    script: Vec<ScriptStep>,
    tuning: SessionTuning,
) -> Harness {
    let transport = Arc::new(ScriptedTransport::new(script));
    let registry = Arc::new(InMemoryRegistry::new("assistant-1"));
    let store = Arc::new(InMemoryResponseStore::new());
    let eligibility = Arc::new(StaticEligibility::allowing_everyone());
    let media_host = Arc::new(StaticMediaHost::granting());

    let session = InterviewSession::new(
        plan(),
        mode,
        tuning,
        Collaborators {
            media_host: media_host.clone(),
            transport: transport.clone(),
            registry: registry.clone(),
            store: store.clone(),
            eligibility: eligibility.clone(),
        },
    );

    Harness {
        session,
        transport,
        registry,
        store,
        eligibility,
        media_host,
    }
}

fn connected_call(call_id: &str, rest: Vec<ScriptStep>) -> Vec<ScriptStep> {
    let mut script = vec![ScriptStep::new(
        0,
        TransportEvent::CallStarted {
            call_id: call_id.to_string(),
        },
    )];
    script.extend(rest);
    script
}

fn fragment(speaker: Speaker, kind: FragmentKind, text: &str) -> TransportEvent {
    TransportEvent::Transcript(TranscriptFragment {
        speaker,
        kind,
        text: text.to_string(),
    })
}

async fn wait_for_status(session: &InterviewSession, status: SessionStatus) {
    for _ in 0..500 {
        if session.status().await == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never reached {:?}", status);
}

async fn grant_and_identify(harness: &Harness) {
    assert_eq!(
        harness.session.request_permission().await,
        MicPermission::Granted
    );
    harness.session.set_candidate("Ada", "ada@x.com").await;
}

#[tokio::test(start_paused = true)]
async fn scored_happy_path_persists_exactly_once() {
    let harness = harness(
        SessionMode::Scored,
        connected_call(
            "call-42",
            vec![
                ScriptStep::new(50, fragment(Speaker::Candidate, FragmentKind::Partial, "Hel")),
                ScriptStep::new(50, fragment(Speaker::Candidate, FragmentKind::Final, "Hello")),
                ScriptStep::new(
                    50,
                    fragment(Speaker::Agent, FragmentKind::Final, "Nice to meet you."),
                ),
            ],
        ),
    );

    grant_and_identify(&harness).await;
    harness.session.start().await.expect("start should succeed");
    wait_for_status(&harness.session, SessionStatus::Connected).await;

    // Let the scripted fragments arrive.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let turns = harness.session.transcript_turns().await;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].speaker, Speaker::Candidate);
    assert_eq!(turns[0].text, "Hello");

    harness.session.end().await.expect("end should succeed");
    wait_for_status(&harness.session, SessionStatus::Ended).await;

    let snapshot = harness.session.snapshot().await;
    assert_eq!(snapshot.end_reason, Some(EndReason::UserAction));
    assert!(snapshot.has_persisted);

    // Exactly one outcome record despite the explicit end racing the
    // transport's own CallEnded confirmation.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.store.write_count().await, 1);
    let patches = harness.store.patches_for("call-42").await;
    assert_eq!(patches.len(), 1);
    assert!(patches[0].ended);
    assert_eq!(patches[0].candidate_name.as_deref(), Some("Ada"));
    assert_eq!(patches[0].attention_loss_count, Some(0));
}

#[tokio::test(start_paused = true)]
async fn mute_is_forced_on_at_connect() {
    let harness = harness(SessionMode::Scored, connected_call("call-1", vec![]));

    grant_and_identify(&harness).await;
    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Connected).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(harness.session.snapshot().await.muted);
    assert_eq!(harness.transport.mute_calls().await.first(), Some(&true));

    // The participant can explicitly unmute afterwards.
    harness.session.set_muted(false).await.unwrap();
    assert!(!harness.session.snapshot().await.muted);
}

#[tokio::test(start_paused = true)]
async fn call_id_is_reconciled_after_connect() {
    let harness = harness(SessionMode::Scored, connected_call("real-id", vec![]));

    grant_and_identify(&harness).await;
    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Connected).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let reconciliations = harness.registry.reconciliations().await;
    assert_eq!(reconciliations.len(), 1);
    assert!(reconciliations[0].0.starts_with("tmp-"));
    assert_eq!(reconciliations[0].1, "real-id");
}

#[tokio::test(start_paused = true)]
async fn ineligible_candidate_is_rejected_before_registration() {
    let harness = harness(SessionMode::Scored, connected_call("call-1", vec![]));
    harness.eligibility.mark_completed("ada@x.com").await;

    grant_and_identify(&harness).await;
    harness.session.start().await.expect("rejection is not an error");

    let snapshot = harness.session.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Rejected);
    assert!(snapshot.rejection_reason.is_some());

    // No registration network call was performed, and nothing persists.
    assert_eq!(harness.registry.registration_count().await, 0);
    assert_eq!(harness.store.write_count().await, 0);
    assert!(!harness.session.has_persisted());
}

#[tokio::test(start_paused = true)]
async fn missing_identity_blocks_a_scored_start() {
    let harness = harness(SessionMode::Scored, connected_call("call-1", vec![]));

    harness.session.request_permission().await;
    harness.session.set_candidate("Ada", "not-an-email").await;

    assert!(harness.session.start().await.is_err());
    assert_eq!(harness.session.status().await, SessionStatus::ReadyToStart);
    assert_eq!(harness.registry.registration_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn registration_failure_reverts_to_ready_for_retry() {
    let harness = harness(SessionMode::Scored, connected_call("call-1", vec![]));
    harness.registry.set_failing(true);

    grant_and_identify(&harness).await;
    assert!(harness.session.start().await.is_err());
    assert_eq!(harness.session.status().await, SessionStatus::ReadyToStart);

    // The user retries without reloading.
    harness.registry.set_failing(false);
    harness.session.start().await.expect("retry should succeed");
    wait_for_status(&harness.session, SessionStatus::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn denied_permission_returns_to_idle_and_allows_retry() {
    let harness = harness(SessionMode::Scored, connected_call("call-1", vec![]));
    harness.media_host.set_granting(false);

    assert_eq!(
        harness.session.request_permission().await,
        MicPermission::Denied
    );
    assert_eq!(harness.session.status().await, SessionStatus::Idle);

    harness.media_host.set_granting(true);
    assert_eq!(
        harness.session.request_permission().await,
        MicPermission::Granted
    );
    assert_eq!(harness.session.status().await, SessionStatus::ReadyToStart);
}

#[tokio::test(start_paused = true)]
async fn revoked_microphone_is_caught_by_the_prestart_probe() {
    let harness = harness(SessionMode::Scored, connected_call("call-1", vec![]));

    grant_and_identify(&harness).await;
    // Permission granted, then revoked before the start click.
    harness.media_host.set_granting(false);

    assert!(harness.session.start().await.is_err());
    assert_eq!(harness.registry.registration_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn transport_error_ends_the_session_and_persists_once() {
    let harness = harness(
        SessionMode::Scored,
        connected_call(
            "call-9",
            vec![ScriptStep::new(
                100,
                TransportEvent::Error {
                    message: "ice connection lost".to_string(),
                },
            )],
        ),
    );

    grant_and_identify(&harness).await;
    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Ended).await;

    let snapshot = harness.session.snapshot().await;
    assert_eq!(snapshot.end_reason, Some(EndReason::TransportError));
    assert!(harness.transport.stop_count() >= 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.store.write_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn transport_end_event_alone_completes_the_session() {
    let harness = harness(
        SessionMode::Scored,
        connected_call(
            "call-5",
            vec![ScriptStep::new(100, TransportEvent::CallEnded)],
        ),
    );

    grant_and_identify(&harness).await;
    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Ended).await;

    let snapshot = harness.session.snapshot().await;
    assert_eq!(snapshot.end_reason, Some(EndReason::TransportEnded));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.store.write_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn practice_expiry_stops_transport_without_persisting() {
    let tuning = SessionTuning {
        practice_duration_secs: 2,
        ..SessionTuning::default()
    };
    // The script never ends the call on its own; only the countdown's stop
    // request makes the transport emit CallEnded.
    let harness = harness_with_tuning(
        SessionMode::Practice,
        connected_call("practice-1", vec![]),
        tuning,
    );

    grant_and_identify(&harness).await;
    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Connected).await;

    wait_for_status(&harness.session, SessionStatus::Ended).await;
    assert!(harness.transport.stop_count() >= 1);

    // The transition came from the transport's own end event, and practice
    // sessions never persist.
    let snapshot = harness.session.snapshot().await;
    assert_eq!(snapshot.end_reason, Some(EndReason::TransportEnded));
    assert_eq!(harness.store.write_count().await, 0);
    assert!(!harness.session.has_persisted());
}

#[tokio::test(start_paused = true)]
async fn practice_session_records_no_attention_events() {
    let harness = harness(SessionMode::Practice, connected_call("practice-2", vec![]));

    grant_and_identify(&harness).await;
    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Connected).await;

    harness.session.page_hidden().await;
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(harness.session.page_visible().await.is_none());
    assert!(harness.session.attention_events().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn scored_session_records_attention_events_while_connected() {
    let harness = harness(SessionMode::Scored, connected_call("call-7", vec![]));

    grant_and_identify(&harness).await;
    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Connected).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    harness.session.page_hidden().await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let event = harness
        .session
        .page_visible()
        .await
        .expect("long hide during a scored call should count");
    assert!(event.hidden_duration_ms > 1000);

    // The in-session warning is held until dismissed.
    assert!(harness.session.snapshot().await.attention_warning.is_some());
    harness.session.dismiss_attention_warning().await;
    assert!(harness.session.snapshot().await.attention_warning.is_none());

    harness.session.end().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Ended).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let patches = harness.store.patches_for("call-7").await;
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].attention_loss_count, Some(1));
    assert_eq!(
        patches[0]
            .attention_loss_events
            .as_ref()
            .map(|events| events.len()),
        Some(1)
    );
}

#[tokio::test(start_paused = true)]
async fn attention_events_before_connect_are_not_counted() {
    let harness = harness(SessionMode::Scored, connected_call("call-8", vec![]));

    grant_and_identify(&harness).await;

    // Backgrounding while still on the start screen.
    harness.session.page_hidden().await;
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert!(harness.session.page_visible().await.is_none());

    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Connected).await;
    assert!(harness.session.attention_events().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn identity_entered_mid_call_reaches_the_outcome_write() {
    let harness = harness(
        SessionMode::Scored,
        connected_call("call-10", vec![]),
    );

    grant_and_identify(&harness).await;
    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Connected).await;

    // The candidate finishes typing while the call is already running; the
    // outcome write must read the live fields, not values captured at start.
    harness.session.set_candidate("Ada Lovelace", "ada@x.com").await;

    harness.session.end().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Ended).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let patches = harness.store.patches_for("call-10").await;
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].candidate_name.as_deref(), Some("Ada Lovelace"));
}

#[tokio::test(start_paused = true)]
async fn practice_then_scored_reset_rearms_persistence() {
    let tuning = SessionTuning {
        practice_duration_secs: 1,
        ..SessionTuning::default()
    };
    let harness = harness_with_tuning(
        SessionMode::Practice,
        connected_call("attempt-1", vec![]),
        tuning,
    );

    grant_and_identify(&harness).await;
    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Ended).await;
    assert_eq!(harness.store.write_count().await, 0);

    harness
        .session
        .reset_for_new_attempt(SessionMode::Scored)
        .await
        .expect("reset after a finished attempt");

    let snapshot = harness.session.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::ReadyToStart);
    assert_eq!(snapshot.mode, SessionMode::Scored);
    assert_eq!(snapshot.candidate_name, "Ada");
    assert!(!snapshot.has_persisted);
    assert!(harness.session.transcript_turns().await.is_empty());

    harness.session.start().await.expect("second attempt starts");
    wait_for_status(&harness.session, SessionStatus::Connected).await;
    harness.session.end().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Ended).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.store.write_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn reset_is_refused_while_an_attempt_is_live() {
    let harness = harness(SessionMode::Scored, connected_call("call-11", vec![]));

    grant_and_identify(&harness).await;
    harness.session.start().await.unwrap();
    wait_for_status(&harness.session, SessionStatus::Connected).await;

    assert!(harness
        .session
        .reset_for_new_attempt(SessionMode::Scored)
        .await
        .is_err());
}

#[tokio::test(start_paused = true)]
async fn anonymous_interview_skips_the_identity_gate() {
    let mut anonymous_plan = plan();
    anonymous_plan.anonymous = true;

    let transport = Arc::new(ScriptedTransport::connecting_with("anon-1", vec![]));
    let session = InterviewSession::new(
        anonymous_plan,
        SessionMode::Scored,
        SessionTuning::default(),
        Collaborators {
            media_host: Arc::new(StaticMediaHost::granting()),
            transport: transport.clone(),
            registry: Arc::new(InMemoryRegistry::new("assistant-1")),
            store: Arc::new(InMemoryResponseStore::new()),
            eligibility: Arc::new(StaticEligibility::allowing_everyone()),
        },
    );

    session.request_permission().await;
    session.start().await.expect("anonymous start needs no identity");
    wait_for_status(&session, SessionStatus::Connected).await;
}
