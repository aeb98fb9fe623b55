use std::sync::Arc;

use nebula_model::{ChatMessage, EngineError, EngineResponse};

/// Receives the free-text status reports of a runtime while it loads a
/// model.
pub type StatusFn = Arc<dyn Fn(&str) + Send + Sync>;

/// A local inference runtime, which can load a model artifact into a
/// session.
///
/// Loading may be slow (downloading weights, compiling kernels), the
/// runtime reports its status through the given callback. The status text
/// should embed a `<digits>%` marker whenever the percentage is known.
pub trait LocalRuntime: Send + Sync + 'static {
    /// The error type that may be returned by the runtime.
    type Error: EngineError;

    /// The loaded session type.
    type Session: LocalSession<Error = Self::Error>;

    /// Loads the named model.
    fn load(
        &self,
        model: &str,
        on_status: StatusFn,
    ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send;
}

/// A loaded model, ready to generate responses.
pub trait LocalSession: Send + Sync + 'static {
    /// The error type that may be returned by the session.
    type Error: EngineError;

    /// The response type for this session.
    type Response: EngineResponse<Error = Self::Error>;

    /// Starts generating a response for the conversation.
    fn stream(
        &self,
        conversation: &[ChatMessage],
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
