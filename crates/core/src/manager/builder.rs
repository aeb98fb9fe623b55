use std::sync::Arc;

use nebula_actor::Actor;
use nebula_model::Mode;
use tokio::sync::watch;

use super::ChatManager;
use super::state::ManagerState;
use crate::selector::{Deployment, EngineSelector};
use crate::store::{MemoryStore, Store};

/// Forwards the load progress of the on-device engine to the manager.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<Option<u8>>>,
}

impl ProgressReporter {
    /// Reports the latest load percentage.
    #[inline]
    pub fn report(&self, percent: Option<u8>) {
        self.tx.send_replace(percent);
    }
}

/// [`ChatManager`] builder.
pub struct ChatManagerBuilder {
    selector: EngineSelector,
    store: Box<dyn Store>,
    mode: Mode,
    annotate_engine: bool,
    progress_tx: Arc<watch::Sender<Option<u8>>>,
}

impl Default for ChatManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatManagerBuilder {
    /// Creates a builder with an empty standard selector and an in-memory
    /// store.
    #[inline]
    pub fn new() -> Self {
        let (progress_tx, _) = watch::channel(None);
        Self {
            selector: EngineSelector::new(Deployment::Standard),
            store: Box::new(MemoryStore::default()),
            mode: Mode::default(),
            annotate_engine: false,
            progress_tx: Arc::new(progress_tx),
        }
    }

    /// Sets the engine selector.
    #[inline]
    pub fn with_selector(mut self, selector: EngineSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Sets the store the transcript is mirrored to.
    #[inline]
    pub fn with_store<S: Store>(mut self, store: S) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Sets the initial mode.
    #[inline]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Appends the engine name to the injected system turn, in the form of
    /// `"{prompt} | {engine name}"`.
    #[inline]
    pub fn annotate_engine(mut self, annotate: bool) -> Self {
        self.annotate_engine = annotate;
        self
    }

    /// Returns a reporter whose updates are exposed by
    /// [`ChatManager::progress`].
    #[inline]
    pub fn progress_reporter(&self) -> ProgressReporter {
        ProgressReporter {
            tx: Arc::clone(&self.progress_tx),
        }
    }

    /// Builds the manager, hydrating the transcript from the store.
    ///
    /// This must be called within a Tokio runtime.
    pub fn build(self) -> ChatManager {
        let Self {
            selector,
            store,
            mode,
            annotate_engine,
            progress_tx,
        } = self;

        let (state, snapshot_rx) =
            ManagerState::new(selector, store, mode, annotate_engine);
        ChatManager {
            actor: Actor::spawn(state, Some("chat manager")),
            snapshot_rx,
            progress_rx: progress_tx.subscribe(),
        }
    }
}
