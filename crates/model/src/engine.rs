use std::error::Error;

use crate::error::ErrorKind;
use crate::message::ChatMessage;
use crate::response::EngineResponse;

/// The error type for an engine.
pub trait EngineError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents an inference backend, which produces responses
/// for a conversation.
///
/// Once the engine is created, it should behave like a stateless object.
/// It can still have internal state (a lazily loaded model session, for
/// example), but callers should not rely on it, and the engine should be
/// prepared for being dropped anytime.
pub trait Engine: Send + Sync {
    /// The error type that may be returned by the engine.
    type Error: EngineError;

    /// The response type for this engine.
    type Response: EngineResponse<Error = Self::Error>;

    /// Returns a stable human-readable label of this engine.
    fn name(&self) -> &str;

    /// Checks whether this engine can serve requests in the current
    /// environment.
    ///
    /// This method never fails. Any error that occurs while probing the
    /// environment must be reported as `false`.
    fn is_available(&self) -> impl Future<Output = bool> + Send;

    /// Sends a conversation to the engine.
    ///
    /// The conversation is the full ordered list of turns, usually
    /// starting with a system turn that carries the current mode. The
    /// returned response yields the generated text incrementally.
    fn send_request(
        &self,
        conversation: &[ChatMessage],
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
