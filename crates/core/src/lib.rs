//! Core logic including engine selection, streaming orchestration and
//! transcript persistence.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod client;
mod manager;
pub mod selector;
pub mod store;

pub use client::{CancelledError, EngineClient};
pub use manager::{
    CANCELLED_MESSAGE, ChatManager, ChatManagerBuilder, ChatSnapshot,
    EMPTY_RESPONSE_FALLBACK, LINK_LOST_MESSAGE, NO_ENGINE_MESSAGE,
    ProgressReporter, RejectReason, SendFailure, SendOutcome,
};
pub use selector::{
    Deployment, EngineSelector, EngineVariant, SelectorError, SelectorState,
};
pub use store::{FileStore, MemoryStore, Store, StoreError};
