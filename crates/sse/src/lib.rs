//! Readers for streaming HTTP bodies shared by the streaming engines.

#![deny(missing_docs)]

mod chunks;
mod sse;
mod stream;

pub use chunks::{Chunks, Error as ChunksError};
pub use sse::{Error, Sse};
pub use stream::{Decode, EventStream, Step};
