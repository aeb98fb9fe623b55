//! The shared vocabulary between the conversation manager and the
//! inference engines.
//!
//! This crate establishes a unified contract for every inference backend
//! (on-device, cloud or server-proxied), so that the conversation manager
//! can switch between them at runtime without knowing which one is active.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. Driving a response
//! to completion and folding its chunks is the job of `nebula-core`.

#![deny(missing_docs)]

mod engine;
mod error;
mod message;
mod response;

pub use engine::*;
pub use error::*;
pub use message::*;
pub use response::*;
