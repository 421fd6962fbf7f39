//! Voice transport adapter
//!
//! Thin façade over the realtime call transport. The concrete transport is
//! an external collaborator; the orchestrator only sees the [`VoiceTransport`]
//! trait and the [`TransportEvent`] stream its `start` call returns.
//!
//! How the spoken audio is carried, synthesized, or transcribed is entirely
//! the transport's business.

mod sim;

pub use sim::{ScriptStep, ScriptedTransport};

use crate::transcript::{Speaker, TranscriptFragment};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Lifecycle, speech, and transcript events emitted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The call is live. Carries the transport-assigned call id.
    CallStarted { call_id: String },
    /// The call ended, whether by hang-up, agent decision, or a stop we
    /// requested ourselves.
    CallEnded,
    /// A participant's audio started. Out of phase with transcript
    /// fragments by design; the agent's audio may still be draining after
    /// its last fragment.
    SpeechStarted(Speaker),
    /// A participant's audio stopped.
    SpeechEnded(Speaker),
    /// Transport failure. The orchestrator treats every one as fatal to the
    /// call: force stop, then end.
    Error { message: String },
    /// A partial or final speech-recognition update.
    Transcript(TranscriptFragment),
}

/// Input to a transport start: which assistant template to run and the
/// per-attempt variables it is parameterized with (candidate name, duration,
/// objective, job context, serialized question list). Created fresh for
/// every start attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallDescriptor {
    pub assistant_ref: String,
    pub dynamic_variables: HashMap<String, String>,
}

/// The realtime voice call transport.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Begin a call. Returns the receiver the transport will deliver its
    /// events on; dropping the receiver does not stop the call.
    async fn start(&self, descriptor: &CallDescriptor) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Stop the call. The transport confirms with its own `CallEnded` event.
    async fn stop(&self) -> Result<()>;

    /// Mute or unmute the local participant.
    async fn set_muted(&self, muted: bool) -> Result<()>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}
