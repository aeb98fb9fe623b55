use std::error::Error;
use std::fmt::{self, Display};
use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use nebula_model::{
    ChatMessage, Engine, EngineError, EngineResponse, ErrorKind,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

type GenerateResult = Result<String, Box<dyn EngineError>>;
type BoxedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type ChunkFn = Box<dyn Fn(String) + Send + 'static>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(Vec<ChatMessage>, ChunkFn) -> BoxedFuture<GenerateResult>
        + Send + Sync
>;
type AvailabilityFn = Arc<dyn Fn() -> BoxedFuture<bool> + Send + Sync>;

/// A wrapper around an engine that provides a type-erased interface for
/// the other modules, and drives the response stream to completion.
#[derive(Clone)]
pub struct EngineClient {
    name: Arc<str>,
    handler_fn: HandlerFn,
    availability_fn: AvailabilityFn,
}

impl EngineClient {
    /// Wraps the given engine.
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        let name: Arc<str> = engine.name().into();
        let engine = Arc::new(engine);

        let handler_engine = Arc::clone(&engine);
        let handler_fn: HandlerFn = Arc::new(move |conversation, on_chunk| {
            let fut = handler_engine.send_request(&conversation);
            Box::pin(
                async move {
                    trace!("got a request: {conversation:?}");
                    let resp_or_err = fut.await;
                    fold_response::<E>(resp_or_err, on_chunk).await
                }
                .instrument(trace_span!("engine client req")),
            )
        });
        let availability_fn: AvailabilityFn = Arc::new(move || {
            let engine = Arc::clone(&engine);
            Box::pin(async move { engine.is_available().await })
        });

        Self {
            name,
            handler_fn,
            availability_fn,
        }
    }

    /// Returns the name of the wrapped engine.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks whether the wrapped engine is available.
    #[inline]
    pub async fn is_available(&self) -> bool {
        (self.availability_fn)().await
    }

    /// Sends the conversation and folds the streamed chunks into the full
    /// response text. Every chunk is passed to `on_chunk` in emission order
    /// before this method returns.
    ///
    /// # Cancel safety
    ///
    /// The response stops streaming as soon as `cancel` is triggered, and
    /// an error of kind [`ErrorKind::Cancelled`] is returned.
    pub async fn generate_response(
        &self,
        conversation: Vec<ChatMessage>,
        on_chunk: impl Fn(String) + Send + 'static,
        cancel: CancellationToken,
    ) -> GenerateResult {
        let fut = (self.handler_fn)(conversation, Box::new(on_chunk));
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("request to {} was cancelled", self.name);
                let err: Box<dyn EngineError> = Box::new(CancelledError);
                Err(err)
            }
            result = fut => result,
        }
    }
}

impl fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineClient")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The error returned when a request is cancelled by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelledError;

impl Display for CancelledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "the request was cancelled".fmt(f)
    }
}

impl Error for CancelledError {}

impl EngineError for CancelledError {
    #[inline]
    fn kind(&self) -> ErrorKind {
        ErrorKind::Cancelled
    }
}

async fn fold_response<E: Engine + 'static>(
    resp_or_err: Result<E::Response, E::Error>,
    on_chunk: ChunkFn,
) -> GenerateResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    trace!("start receiving chunks");

    let mut text = String::new();
    let mut pinned_resp = pin!(resp);
    loop {
        let chunk_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_chunk(cx)).await;
        let chunk = match chunk_or_err {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };
        trace!("got a chunk: {chunk:?}");
        text.push_str(&chunk);
        on_chunk(chunk);
    }

    trace!("finished a request");
    Ok(text)
}
