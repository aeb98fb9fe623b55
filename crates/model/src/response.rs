use std::pin::Pin;
use std::task::{self, Poll};

use crate::engine::EngineError;

/// A response from an engine, which is an ordered and finite sequence of
/// text fragments.
///
/// The final text of a response is exactly the concatenation of all the
/// fragments it yields. A response cannot be restarted once it completes.
pub trait EngineResponse: Sized + Send + 'static {
    /// The error type that may be returned by the engine.
    type Error: EngineError;

    /// Attempts to pull out the next fragment from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next fragment. Implementations will ensure that the current
    ///   task will be notified when the next fragment may be ready.
    /// - `Poll::Ready(Ok(Some(chunk)))` means the response has a fragment
    ///   to deliver, and may produce further fragments on subsequent
    ///   `poll_next_chunk` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   processing the response.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>>;
}
