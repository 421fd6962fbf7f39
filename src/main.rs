use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use talentrial_session::{
    Collaborators, Config, FragmentKind, InMemoryRegistry, InMemoryResponseStore, InterviewPlan,
    InterviewSession, ScriptStep, ScriptedTransport, SessionMode, SessionTuning, Speaker,
    StaticEligibility, StaticMediaHost, TranscriptFragment, TransportEvent,
};
use tracing::info;

/// Run one scripted interview session end to end.
#[derive(Parser, Debug)]
#[command(name = "talentrial-session")]
struct Args {
    /// Session mode: "practice" or "scored"
    #[arg(long, default_value = "scored")]
    mode: String,

    /// Candidate name
    #[arg(long, default_value = "Ada Lovelace")]
    name: String,

    /// Candidate email
    #[arg(long, default_value = "ada@example.com")]
    email: String,

    /// Optional config file (defaults are used when absent)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mode = match args.mode.as_str() {
        "practice" => SessionMode::Practice,
        "scored" => SessionMode::Scored,
        other => anyhow::bail!("unknown mode: {other}"),
    };

    let tuning = match &args.config {
        Some(path) => {
            let cfg = Config::load(path)?;
            info!("Loaded config: {}", cfg.service.name);
            cfg.session
        }
        None => SessionTuning {
            // Keep the demo short.
            practice_duration_secs: 5,
            ..SessionTuning::default()
        },
    };

    let plan = InterviewPlan {
        interview_ref: "demo-interview".to_string(),
        objective: "Assess backend engineering fundamentals".to_string(),
        job_context: "Senior Rust engineer, payments team".to_string(),
        questions: vec![
            "Tell me about a system you designed.".to_string(),
            "How do you approach debugging a race condition?".to_string(),
        ],
        planned_duration_mins: 15,
        anonymous: false,
    };

    let transport = Arc::new(ScriptedTransport::connecting_with(
        "demo-call-1",
        vec![
            ScriptStep::new(50, TransportEvent::SpeechStarted(Speaker::Agent)),
            ScriptStep::new(
                50,
                TransportEvent::Transcript(TranscriptFragment {
                    speaker: Speaker::Agent,
                    kind: FragmentKind::Final,
                    text: "Hello, welcome to your interview.".to_string(),
                }),
            ),
            ScriptStep::new(50, TransportEvent::SpeechEnded(Speaker::Agent)),
            ScriptStep::new(
                100,
                TransportEvent::Transcript(TranscriptFragment {
                    speaker: Speaker::Candidate,
                    kind: FragmentKind::Partial,
                    text: "Thanks, happy".to_string(),
                }),
            ),
            ScriptStep::new(
                50,
                TransportEvent::Transcript(TranscriptFragment {
                    speaker: Speaker::Candidate,
                    kind: FragmentKind::Final,
                    text: "Thanks, happy to be here.".to_string(),
                }),
            ),
            ScriptStep::new(200, TransportEvent::CallEnded),
        ],
    ));
    let store = Arc::new(InMemoryResponseStore::new());

    let session = InterviewSession::new(
        plan,
        mode,
        tuning,
        Collaborators {
            media_host: Arc::new(StaticMediaHost::granting()),
            transport: transport.clone(),
            registry: Arc::new(InMemoryRegistry::new("assistant-demo")),
            store: store.clone(),
            eligibility: Arc::new(StaticEligibility::allowing_everyone()),
        },
    );

    info!("requesting microphone permission");
    session.request_permission().await;
    session.set_candidate(&args.name, &args.email).await;
    session.start().await?;

    while !session.status().await.is_terminal() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let snapshot = session.snapshot().await;
    info!(status = ?snapshot.status, end_reason = ?snapshot.end_reason, "session finished");
    for turn in session.transcript_turns().await {
        println!("[{:?}] {}", turn.speaker, turn.text);
    }
    info!(
        persisted_writes = store.write_count().await,
        "outcome writes recorded"
    );

    Ok(())
}
