mod builder;
mod state;
#[cfg(test)]
mod tests;

use nebula_actor::Actor;
use nebula_model::{ChatMessage, ErrorKind, Mode};
use tokio::sync::watch;

pub use builder::{ChatManagerBuilder, ProgressReporter};
use state::{CancelSend, ManagerState};

/// Shown when an engine finishes without producing any text.
pub const EMPTY_RESPONSE_FALLBACK: &str =
    "Nebula went silent. Try rephrasing that.";

/// Shown when the engine request fails.
pub const LINK_LOST_MESSAGE: &str = "Neural link lost. Please try again.";

/// Shown when the request is cancelled before it settles.
pub const CANCELLED_MESSAGE: &str = "Transmission aborted.";

/// Shown when no engine can be resolved.
pub const NO_ENGINE_MESSAGE: &str =
    "No inference engine is available. Check your configuration.";

/// Everything a UI needs to render the conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatSnapshot {
    /// The transcript, including the turn that is being streamed.
    pub messages: Vec<ChatMessage>,
    /// The current mode.
    pub mode: Mode,
    /// Whether a send is in flight.
    pub is_typing: bool,
    /// The name of the last resolved engine.
    pub engine: Option<String>,
}

/// The outcome of [`ChatManager::send_message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The engine produced a response.
    Completed,
    /// The send failed, and the assistant turn carries an error message.
    Failed(SendFailure),
    /// The send was ignored, the transcript is unchanged.
    Rejected(RejectReason),
}

/// Why a send failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendFailure {
    /// The engine returned an error.
    Engine(ErrorKind),
    /// No engine could be resolved.
    NoEngineAvailable,
}

/// Why a request to the manager was ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Another send is in flight.
    Busy,
    /// The input is empty or whitespace only.
    EmptyInput,
    /// The manager has stopped.
    Stopped,
}

/// The conversation manager, which owns the transcript and drives the
/// engines.
///
/// The state lives in an actor, so every operation is applied in the order
/// it was issued. Reads are served from the latest published snapshot.
pub struct ChatManager {
    actor: Actor<ManagerState>,
    snapshot_rx: watch::Receiver<ChatSnapshot>,
    progress_rx: watch::Receiver<Option<u8>>,
}

impl ChatManager {
    /// Sends a user message and waits until the response has settled.
    ///
    /// Blank input and sends issued while another one is in flight are
    /// rejected without touching the transcript.
    pub async fn send_message<S: Into<String>>(&self, text: S) -> SendOutcome {
        let text = text.into();
        let started = self
            .actor
            .call(move |state, handle| state.begin_send(text, handle))
            .await;
        match started {
            Ok(Ok(reply_rx)) => reply_rx
                .await
                .unwrap_or(SendOutcome::Rejected(RejectReason::Stopped)),
            Ok(Err(reason)) => SendOutcome::Rejected(reason),
            Err(_) => SendOutcome::Rejected(RejectReason::Stopped),
        }
    }

    /// Changes the mode used by the next send.
    pub async fn set_mode(&self, mode: Mode) {
        self.actor
            .call(move |state, _| state.set_mode(mode))
            .await
            .ok();
    }

    /// Replaces the transcript. Not allowed while a send is in flight.
    pub async fn set_messages(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<(), RejectReason> {
        self.actor
            .call(move |state, _| state.set_messages(messages))
            .await
            .unwrap_or(Err(RejectReason::Stopped))
    }

    /// Empties the transcript and deletes the stored snapshot. A send in
    /// flight is cancelled.
    pub async fn clear_memory(&self) {
        self.actor.call(|state, _| state.clear_memory()).await.ok();
    }

    /// Cancels the send in flight, if any.
    pub fn cancel(&self) {
        self.actor.send(CancelSend).ok();
    }

    /// Returns the current mode.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.snapshot_rx.borrow().mode
    }

    /// Returns a copy of the transcript.
    #[inline]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.snapshot_rx.borrow().messages.clone()
    }

    /// Returns whether a send is in flight.
    #[inline]
    pub fn is_typing(&self) -> bool {
        self.snapshot_rx.borrow().is_typing
    }

    /// Returns the name of the last resolved engine.
    #[inline]
    pub fn engine_name(&self) -> Option<String> {
        self.snapshot_rx.borrow().engine.clone()
    }

    /// Returns the latest load percentage of the on-device engine.
    #[inline]
    pub fn progress(&self) -> Option<u8> {
        *self.progress_rx.borrow()
    }

    /// Subscribes to the snapshots published after every change.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Subscribes to the load progress of the on-device engine.
    #[inline]
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<u8>> {
        self.progress_rx.clone()
    }
}
