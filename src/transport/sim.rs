//! Scripted transport for the demo binary and tests.

use super::{CallDescriptor, TransportEvent, VoiceTransport};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// One scripted event, delivered `delay_ms` after the previous step.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub delay_ms: u64,
    pub event: TransportEvent,
}

impl ScriptStep {
    pub fn new(delay_ms: u64, event: TransportEvent) -> Self {
        Self { delay_ms, event }
    }
}

/// Deterministic [`VoiceTransport`] that replays a fixed event script.
///
/// `stop` cancels the remaining script and emits `CallEnded` the way a real
/// transport confirms a requested hang-up. `CallEnded` is emitted at most
/// once per started call, whichever side gets there first.
pub struct ScriptedTransport {
    script: Vec<ScriptStep>,
    events_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    script_task: Mutex<Option<JoinHandle<()>>>,
    ended_sent: Arc<AtomicBool>,
    stop_calls: AtomicUsize,
    mute_calls: Mutex<Vec<bool>>,
    last_descriptor: Mutex<Option<CallDescriptor>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            events_tx: Mutex::new(None),
            script_task: Mutex::new(None),
            ended_sent: Arc::new(AtomicBool::new(false)),
            stop_calls: AtomicUsize::new(0),
            mute_calls: Mutex::new(Vec::new()),
            last_descriptor: Mutex::new(None),
        }
    }

    /// A call that connects with `call_id` and then plays `rest`.
    pub fn connecting_with(call_id: &str, rest: Vec<ScriptStep>) -> Self {
        let mut script = vec![ScriptStep::new(
            0,
            TransportEvent::CallStarted {
                call_id: call_id.to_string(),
            },
        )];
        script.extend(rest);
        Self::new(script)
    }

    /// How many times `stop` was called.
    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Every `set_muted` argument, in order.
    pub async fn mute_calls(&self) -> Vec<bool> {
        self.mute_calls.lock().await.clone()
    }

    /// The descriptor the last `start` was given.
    pub async fn last_descriptor(&self) -> Option<CallDescriptor> {
        self.last_descriptor.lock().await.clone()
    }
}

#[async_trait]
impl VoiceTransport for ScriptedTransport {
    async fn start(&self, descriptor: &CallDescriptor) -> Result<mpsc::Receiver<TransportEvent>> {
        let (tx, rx) = mpsc::channel(64);

        {
            let mut slot = self.last_descriptor.lock().await;
            *slot = Some(descriptor.clone());
        }
        self.ended_sent.store(false, Ordering::SeqCst);

        let script = self.script.clone();
        let ended_sent = Arc::clone(&self.ended_sent);
        let script_tx = tx.clone();
        let task = tokio::spawn(async move {
            for step in script {
                if step.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
                }
                let is_ended = matches!(step.event, TransportEvent::CallEnded);
                if is_ended && ended_sent.swap(true, Ordering::SeqCst) {
                    continue;
                }
                debug!("scripted transport event: {:?}", step.event);
                if script_tx.send(step.event).await.is_err() {
                    break;
                }
            }
        });

        {
            let mut slot = self.script_task.lock().await;
            if let Some(previous) = slot.replace(task) {
                previous.abort();
            }
        }
        {
            let mut slot = self.events_tx.lock().await;
            *slot = Some(tx);
        }

        Ok(rx)
    }

    async fn stop(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);

        {
            let mut slot = self.script_task.lock().await;
            if let Some(task) = slot.take() {
                task.abort();
            }
        }

        let tx = { self.events_tx.lock().await.clone() };
        if let Some(tx) = tx {
            if !self.ended_sent.swap(true, Ordering::SeqCst) {
                let _ = tx.send(TransportEvent::CallEnded).await;
            }
        }
        Ok(())
    }

    async fn set_muted(&self, muted: bool) -> Result<()> {
        self.mute_calls.lock().await.push(muted);
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
