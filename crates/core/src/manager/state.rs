use std::fmt::{self, Debug};

use nebula_actor::{Actor, Message};
use nebula_model::{ChatMessage, EngineError, ErrorKind, Mode, Role};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{
    CANCELLED_MESSAGE, ChatSnapshot, EMPTY_RESPONSE_FALLBACK,
    LINK_LOST_MESSAGE, NO_ENGINE_MESSAGE, RejectReason, SendFailure,
    SendOutcome,
};
use crate::selector::{EngineSelector, SelectorError};
use crate::store::{self, Store, StoreError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendStage {
    #[default]
    Idle,
    AwaitingResponse,
    FoldingChunks,
}

/// Identifies the assistant turn a send streams into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamingTurn {
    id: u64,
    index: usize,
}

struct Streaming {
    turn: StreamingTurn,
    buffer: String,
    cancel: CancellationToken,
    reply_tx: oneshot::Sender<SendOutcome>,
}

pub struct ManagerState {
    /// Taken by the running send, and given back when it finishes.
    selector: Option<EngineSelector>,
    store: Box<dyn Store>,
    messages: Vec<ChatMessage>,
    mode: Mode,
    annotate_engine: bool,
    engine: Option<String>,
    stage: SendStage,
    streaming: Option<Streaming>,
    next_turn_id: u64,
    snapshot_tx: watch::Sender<ChatSnapshot>,
}

impl ManagerState {
    pub fn new(
        selector: EngineSelector,
        store: Box<dyn Store>,
        mode: Mode,
        annotate_engine: bool,
    ) -> (Self, watch::Receiver<ChatSnapshot>) {
        let mut messages = match store::load_transcript(store.as_ref()) {
            Ok(messages) => messages,
            Err(StoreError::Corrupted(err)) => {
                warn!("discarded corrupted transcript snapshot: {err}");
                vec![]
            }
            Err(err) => {
                warn!("failed to load transcript snapshot: {err}");
                vec![]
            }
        };
        // A placeholder left by an interrupted session is meaningless.
        let unfinished = messages.last().is_some_and(|msg| {
            msg.role == Role::Assistant && msg.content.is_empty()
        });
        if unfinished {
            debug!("dropped the unfinished assistant turn");
            messages.pop();
        }
        debug!("hydrated {} messages", messages.len());

        let (snapshot_tx, snapshot_rx) = watch::channel(ChatSnapshot {
            messages: messages.clone(),
            mode,
            is_typing: false,
            engine: None,
        });
        let state = Self {
            selector: Some(selector),
            store,
            messages,
            mode,
            annotate_engine,
            engine: None,
            stage: SendStage::Idle,
            streaming: None,
            next_turn_id: 1,
            snapshot_tx,
        };
        if unfinished {
            state.persist();
        }
        (state, snapshot_rx)
    }

    pub fn begin_send(
        &mut self,
        text: String,
        handle: &Actor<Self>,
    ) -> Result<oneshot::Receiver<SendOutcome>, RejectReason> {
        if text.trim().is_empty() {
            return Err(RejectReason::EmptyInput);
        }
        if self.stage != SendStage::Idle {
            debug!("rejected a send while {:?}", self.stage);
            return Err(RejectReason::Busy);
        }
        let Some(mut selector) = self.selector.take() else {
            return Err(RejectReason::Busy);
        };

        self.messages.push(ChatMessage::user(text));
        self.stage = SendStage::AwaitingResponse;
        self.persist();
        self.publish();

        // The request carries everything up to the user turn, the
        // placeholder is only a slot for the response.
        let history = self.messages.clone();
        let turn = StreamingTurn {
            id: self.next_turn_id,
            index: self.messages.len(),
        };
        self.next_turn_id += 1;
        self.messages.push(ChatMessage::assistant(""));

        let cancel = CancellationToken::new();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.streaming = Some(Streaming {
            turn,
            buffer: String::new(),
            cancel: cancel.clone(),
            reply_tx,
        });
        self.persist();
        self.publish();

        let request = Request {
            history,
            prompt: self.mode.system_prompt(),
            annotate_engine: self.annotate_engine,
            turn,
            cancel,
        };
        let handle = handle.clone();
        tokio::spawn(
            async move {
                let result = request.run(&mut selector, &handle).await;
                handle
                    .send(SendFinished {
                        turn,
                        selector,
                        result,
                    })
                    .ok();
            }
            .instrument(trace_span!("send", turn = turn.id)),
        );
        Ok(reply_rx)
    }

    pub fn set_mode(&mut self, mode: Mode) {
        debug!("mode changed to {mode}");
        self.mode = mode;
        self.publish();
    }

    pub fn set_messages(
        &mut self,
        messages: Vec<ChatMessage>,
    ) -> Result<(), RejectReason> {
        if self.stage != SendStage::Idle {
            return Err(RejectReason::Busy);
        }
        self.messages = messages;
        self.persist();
        self.publish();
        Ok(())
    }

    pub fn clear_memory(&mut self) {
        self.cancel();
        self.messages.clear();
        self.persist();
        debug!("memory cleared");
        self.publish();
    }

    pub fn cancel(&mut self) {
        if let Some(streaming) = &self.streaming {
            debug!("cancelling turn {}", streaming.turn.id);
            streaming.cancel.cancel();
        }
    }

    fn fold_chunk(&mut self, turn: StreamingTurn, chunk: String) {
        let Some(index) = self.validate(turn) else {
            warn!("dropped a chunk of stale turn {}", turn.id);
            return;
        };
        let Some(streaming) = &mut self.streaming else {
            return;
        };
        streaming.buffer.push_str(&chunk);
        self.messages[index].content.clone_from(&streaming.buffer);
        if self.stage == SendStage::AwaitingResponse {
            self.stage = SendStage::FoldingChunks;
        }
        self.persist();
        self.publish();
    }

    fn finish_send(
        &mut self,
        turn: StreamingTurn,
        result: Result<String, SendError>,
    ) {
        let index = self.validate(turn);
        let Some(streaming) = self.streaming.take() else {
            return;
        };

        let (content, outcome) = match result {
            Ok(_) if streaming.buffer.trim().is_empty() => {
                debug!("turn {} finished without text", turn.id);
                (EMPTY_RESPONSE_FALLBACK.to_owned(), SendOutcome::Completed)
            }
            Ok(_) => (streaming.buffer, SendOutcome::Completed),
            Err(SendError::Selector(err)) => {
                error!("turn {} failed: {err}", turn.id);
                (
                    NO_ENGINE_MESSAGE.to_owned(),
                    SendOutcome::Failed(SendFailure::NoEngineAvailable),
                )
            }
            Err(SendError::Engine(err)) => {
                let kind = err.kind();
                error!("turn {} failed: {err}", turn.id);
                let message = match kind {
                    ErrorKind::Cancelled => CANCELLED_MESSAGE,
                    _ => LINK_LOST_MESSAGE,
                };
                (
                    message.to_owned(),
                    SendOutcome::Failed(SendFailure::Engine(kind)),
                )
            }
        };

        if let Some(index) = index {
            self.messages[index].content = content;
            self.persist();
        } else {
            debug!("turn {} is gone, result discarded", turn.id);
        }
        self.stage = SendStage::Idle;
        self.publish();
        streaming.reply_tx.send(outcome).ok();
    }

    /// Returns the index of the turn if it is still the one being streamed
    /// into.
    fn validate(&self, turn: StreamingTurn) -> Option<usize> {
        let current = self.streaming.as_ref()?.turn;
        if current != turn {
            return None;
        }
        self.messages
            .get(turn.index)
            .filter(|msg| msg.role == Role::Assistant)
            .map(|_| turn.index)
    }

    /// Mirrors the transcript into the store, an empty transcript leaves no
    /// snapshot behind.
    fn persist(&self) {
        if self.messages.is_empty() {
            if let Err(err) = self.store.delete() {
                warn!("failed to delete transcript snapshot: {err}");
            }
            return;
        }
        if let Err(err) =
            store::save_transcript(self.store.as_ref(), &self.messages)
        {
            warn!("failed to save transcript snapshot: {err}");
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(ChatSnapshot {
            messages: self.messages.clone(),
            mode: self.mode,
            is_typing: self.stage != SendStage::Idle,
            engine: self.engine.clone(),
        });
    }
}

struct Request {
    history: Vec<ChatMessage>,
    prompt: &'static str,
    annotate_engine: bool,
    turn: StreamingTurn,
    cancel: CancellationToken,
}

impl Request {
    async fn run(
        self,
        selector: &mut EngineSelector,
        handle: &Actor<ManagerState>,
    ) -> Result<String, SendError> {
        let client = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                let err: Box<dyn EngineError> =
                    Box::new(crate::client::CancelledError);
                return Err(SendError::Engine(err));
            }
            client = selector.resolve() => client.map_err(SendError::Selector)?,
        };
        handle.send(EngineResolved(client.name().to_owned())).ok();

        let system = if self.annotate_engine {
            format!("{} | {}", self.prompt, client.name())
        } else {
            self.prompt.to_owned()
        };
        let mut conversation = Vec::with_capacity(self.history.len() + 1);
        conversation.push(ChatMessage::system(system));
        conversation.extend(self.history);

        let turn = self.turn;
        let chunk_handle = handle.clone();
        client
            .generate_response(
                conversation,
                move |chunk| {
                    chunk_handle.send(ChunkReceived { turn, chunk }).ok();
                },
                self.cancel,
            )
            .await
            .map_err(SendError::Engine)
    }
}

enum SendError {
    Engine(Box<dyn EngineError>),
    Selector(SelectorError),
}

impl Debug for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Engine(err) => {
                f.debug_tuple("Engine").field(err).finish()
            }
            SendError::Selector(err) => {
                f.debug_tuple("Selector").field(err).finish()
            }
        }
    }
}

#[derive(Debug)]
struct EngineResolved(String);

impl Message<ManagerState> for EngineResolved {
    fn handle(self, state: &mut ManagerState, _handle: &Actor<ManagerState>) {
        if state.engine.as_deref() != Some(self.0.as_str()) {
            debug!("active engine: {}", self.0);
            state.engine = Some(self.0);
            state.publish();
        }
    }
}

#[derive(Debug)]
struct ChunkReceived {
    turn: StreamingTurn,
    chunk: String,
}

impl Message<ManagerState> for ChunkReceived {
    #[inline]
    fn handle(self, state: &mut ManagerState, _handle: &Actor<ManagerState>) {
        state.fold_chunk(self.turn, self.chunk);
    }
}

struct SendFinished {
    turn: StreamingTurn,
    selector: EngineSelector,
    result: Result<String, SendError>,
}

impl Debug for SendFinished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendFinished")
            .field("turn", &self.turn)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

impl Message<ManagerState> for SendFinished {
    fn handle(self, state: &mut ManagerState, _handle: &Actor<ManagerState>) {
        state.selector = Some(self.selector);
        state.finish_send(self.turn, self.result);
    }
}

#[derive(Debug)]
pub struct CancelSend;

impl Message<ManagerState> for CancelSend {
    #[inline]
    fn handle(self, state: &mut ManagerState, _handle: &Actor<ManagerState>) {
        state.cancel();
    }
}
