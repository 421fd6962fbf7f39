pub mod config;
pub mod integrity;
pub mod permission;
pub mod services;
pub mod session;
pub mod timers;
pub mod transcript;
pub mod transport;

pub use config::{Config, SessionTuning};
pub use integrity::{AttentionLossEvent, IntegrityMonitor};
pub use permission::{MediaHost, MicGrant, MicPermission, MicProbe, PermissionGate, StaticMediaHost};
pub use services::{
    CallRegistry, CandidateIdentity, EligibilityCheck, EligibilityVerdict, InMemoryRegistry,
    InMemoryResponseStore, OutcomePatch, RegistrationRequest, RegistrationResponse, ResponseStore,
    StaticEligibility,
};
pub use session::{
    Collaborators, EndReason, InterviewPlan, InterviewSession, SessionMode, SessionSnapshot,
    SessionStatus,
};
pub use timers::TimerController;
pub use transcript::{
    FragmentKind, Speaker, TranscriptAggregator, TranscriptFragment, TranscriptTurn,
};
pub use transport::{CallDescriptor, ScriptStep, ScriptedTransport, TransportEvent, VoiceTransport};
