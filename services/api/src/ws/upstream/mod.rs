//! Lifecycle management for the per-session upstream connections.
//!
//! Each leg (STT, LLM) runs as its own task owning its socket. The session
//! talks to a leg through a [`LegHandle`]: commands sent before the upstream
//! has confirmed readiness — or after it has failed — are dropped and
//! logged, never queued. A leg is never reconnected within a session; a
//! failed leg leaves the session degraded until the client disconnects.

pub mod llm;
pub mod stt;

use bytes::Bytes;
use relay_core::gate::TranscriptEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

/// Commands accepted by an upstream leg task.
#[derive(Debug)]
pub enum LegCommand {
    /// A batch of raw PCM16 audio to forward.
    Audio(Bytes),
    /// Mark the buffered user input as complete (realtime LLM leg).
    FinalizeInput,
    /// Ask the provider to generate a response (realtime LLM leg).
    CreateResponse,
    /// Best-effort cancel of the in-flight response (realtime LLM leg).
    CancelResponse,
}

/// Events surfaced by the STT leg.
#[derive(Debug)]
pub enum SttEvent {
    Transcript(TranscriptEvent),
    /// The upstream closed or errored; the leg will not reconnect.
    Closed,
}

/// Events surfaced by the LLM leg.
#[derive(Debug)]
pub enum LlmEvent {
    /// An incremental delta of assistant text (realtime mode).
    Delta {
        response_id: Option<String>,
        text: String,
    },
    /// A finalized assistant response (realtime mode).
    Final {
        response_id: Option<String>,
        text: String,
    },
    /// A completed chat-mode turn, carrying the transcript it answered.
    ChatCompleted {
        transcript: String,
        response: String,
    },
    /// The upstream closed or errored; the leg will not reconnect.
    Closed,
}

/// A handle to one upstream leg task.
pub struct LegHandle {
    name: &'static str,
    tx: mpsc::Sender<LegCommand>,
    ready: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl LegHandle {
    pub(crate) fn new(
        name: &'static str,
        tx: mpsc::Sender<LegCommand>,
        ready: Arc<AtomicBool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            tx,
            ready,
            task,
        }
    }

    /// Whether the upstream has confirmed session establishment and has not
    /// since failed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Forwards a command to the leg task. Returns whether the command was
    /// handed off; commands are dropped (with a log line) when the leg is
    /// not ready or its task has gone away.
    pub fn send(&self, command: LegCommand) -> bool {
        if !self.is_ready() {
            warn!(leg = self.name, ?command, "Upstream not ready; dropping.");
            return false;
        }
        if let Err(e) = self.tx.try_send(command) {
            warn!(leg = self.name, "Failed to hand off to leg task: {e}");
            return false;
        }
        true
    }

    /// Tears the leg down. Idempotent: closing an already-finished leg is a
    /// no-op.
    pub fn close(&self) {
        self.ready.store(false, Ordering::Release);
        self.task.abort();
    }
}

/// Shared readiness flag wiring used by the leg adapters.
pub(crate) fn leg_channel() -> (
    mpsc::Sender<LegCommand>,
    mpsc::Receiver<LegCommand>,
    Arc<AtomicBool>,
) {
    let (tx, rx) = mpsc::channel(128);
    (tx, rx, Arc::new(AtomicBool::new(false)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_handle(ready: bool) -> (LegHandle, mpsc::Receiver<LegCommand>) {
        let (tx, rx, flag) = leg_channel();
        flag.store(ready, Ordering::Release);
        let task = tokio::spawn(async {});
        (LegHandle::new("test", tx, flag, task), rx)
    }

    #[tokio::test]
    async fn sends_before_readiness_are_dropped_not_queued() {
        let (handle, mut rx) = idle_handle(false);
        assert!(!handle.send(LegCommand::FinalizeInput));
        assert!(!handle.send(LegCommand::CreateResponse));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sends_after_readiness_are_handed_off_in_order() {
        let (handle, mut rx) = idle_handle(true);
        assert!(handle.send(LegCommand::FinalizeInput));
        assert!(handle.send(LegCommand::CreateResponse));
        assert!(matches!(rx.recv().await, Some(LegCommand::FinalizeInput)));
        assert!(matches!(rx.recv().await, Some(LegCommand::CreateResponse)));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_clears_readiness() {
        let (handle, _rx) = idle_handle(true);
        handle.close();
        handle.close();
        assert!(!handle.is_ready());
        assert!(!handle.send(LegCommand::Audio(Bytes::from_static(&[0, 1]))));
    }
}
