//! An engine running the model on the local machine.
//!
//! The engine itself only handles availability probing, lazy session
//! loading and progress reporting. The inference work is delegated to a
//! [`LocalRuntime`]. [`OpenAICompatRuntime`] drives a local server that
//! speaks the OpenAI chat completion protocol (llama.cpp, MLC, etc.).

#[macro_use]
extern crate tracing;

mod engine;
mod openai;
mod probe;
mod progress;
mod runtime;

pub use engine::{DEFAULT_MODEL, LocalEngine};
pub use openai::{
    Error, OpenAICompatConfig, OpenAICompatConfigBuilder, OpenAICompatRuntime,
    OpenAICompatResponse, OpenAICompatSession,
};
pub use probe::{AccelerationProbe, SystemProbe};
pub use progress::{LoadProgress, parse_progress};
pub use runtime::{LocalRuntime, LocalSession, StatusFn};
