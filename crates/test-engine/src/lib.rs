//! A local fake engine for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use nebula_model::{
    ChatMessage, Engine, EngineError, EngineResponse, ErrorKind, Role,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl EngineError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestEngineResponse {
    preset: PresetResponse,
    delay: Duration,
    chunk_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl EngineResponse for TestEngineResponse {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let this = self.get_mut();

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            let chunks = &this.preset.chunks;
            if this.chunk_idx < chunks.len() {
                let chunk = chunks[this.chunk_idx].clone();
                this.chunk_idx += 1;
                return Poll::Ready(Ok(Some(chunk)));
            } else if this.chunk_idx == chunks.len() {
                this.chunk_idx += 1;
                if let Some(failure) = this.preset.failure {
                    return Poll::Ready(Err(Error {
                        message: "preset failure",
                        kind: failure.into(),
                    }));
                }
                return Poll::Ready(Ok(None));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_chunk(cx)
    }
}

/// A local fake engine for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the engine should respond to each user turn. The response is
/// selected by the number of user turns in the request: the first user turn
/// gets the first response, and so on. If there are no enough responses in
/// the script, an error will be returned.
///
/// Clones share the availability flag and the request log, so a test can
/// keep a clone around to inspect the engine after handing it over.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone)]
pub struct TestEngine {
    name: String,
    script: Vec<PresetResponse>,
    delay: Option<Duration>,
    available: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::with_name("Test Engine")
    }
}

impl TestEngine {
    /// Creates an engine that reports the given name.
    #[inline]
    pub fn with_name<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            script: vec![],
            delay: None,
            available: Arc::new(AtomicBool::new(true)),
            requests: Default::default(),
        }
    }

    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    #[inline]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns all the conversations this engine has received.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl Engine for TestEngine {
    type Error = crate::Error;
    type Response = TestEngineResponse;

    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn send_request(
        &self,
        conversation: &[ChatMessage],
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(conversation.to_vec());
        }

        let user_turns = conversation
            .iter()
            .filter(|msg| msg.role == Role::User)
            .count();
        let result = match user_turns
            .checked_sub(1)
            .and_then(|idx| self.script.get(idx))
        {
            Some(preset) => Ok(TestEngineResponse {
                preset: preset.clone(),
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                chunk_idx: 0,
                sleep: None,
            }),
            None => Err(Error {
                message: "no enough responses",
                kind: ErrorKind::Rejected,
            }),
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use super::*;

    async fn collect_response(
        resp: TestEngineResponse,
    ) -> (Vec<String>, Option<Error>) {
        let mut resp = pin!(resp);
        let mut chunks = vec![];
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_chunk(cx)).await {
                Ok(Some(chunk)) => chunks.push(chunk),
                Ok(None) => return (chunks, None),
                Err(err) => return (chunks, Some(err)),
            }
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut engine = TestEngine::default();
        engine.add_response(PresetResponse::with_chunks(["Hello, ", "world!"]));
        engine.add_response(
            PresetResponse::with_chunks(["Sure, ", "let me"])
                .with_failure(PresetFailure::Transport),
        );

        let mut conversation = vec![
            ChatMessage::system("Be nice."),
            ChatMessage::user("Hi"),
        ];
        let resp = engine.send_request(&conversation).await.unwrap();
        let (chunks, err) = collect_response(resp).await;
        assert_eq!(chunks.concat(), "Hello, world!");
        assert!(err.is_none());

        conversation.push(ChatMessage::assistant("Hello, world!"));
        conversation.push(ChatMessage::user("Check my todo"));
        let resp = engine.send_request(&conversation).await.unwrap();
        let (chunks, err) = collect_response(resp).await;
        assert_eq!(chunks.concat(), "Sure, let me");
        assert_eq!(err.unwrap().kind(), ErrorKind::Transport);

        assert_eq!(engine.requests().len(), 2);
        assert_eq!(engine.requests()[1], conversation);

        conversation.push(ChatMessage::user("Again"));
        let err = engine.send_request(&conversation).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Rejected);
    }

    #[tokio::test]
    async fn test_availability_is_shared() {
        let engine = TestEngine::with_name("Flaky");
        let observer = engine.clone();
        assert!(engine.is_available().await);
        observer.set_available(false);
        assert!(!engine.is_available().await);
        assert_eq!(engine.name(), "Flaky");
    }
}
