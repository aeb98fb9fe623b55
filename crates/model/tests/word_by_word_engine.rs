use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use nebula_model::{
    ChatMessage, Engine, EngineError, EngineResponse, ErrorKind, Role,
};
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct EchoEngineError(ErrorKind);

impl Display for EchoEngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for EchoEngineError {}

impl EngineError for EchoEngineError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug)]
struct EchoResponse {
    words: VecDeque<String>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl EchoResponse {
    fn new(input: &str) -> Self {
        let words = format!("You said {}", input)
            .split(' ')
            .map(ToString::to_string)
            .collect();
        Self { words, sleep: None }
    }
}

impl EngineResponse for EchoResponse {
    type Error = EchoEngineError;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let this = self.get_mut();
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            if let Some(mut word) = this.words.pop_front() {
                if !this.words.is_empty() {
                    word.push(' ');
                }
                return Poll::Ready(Ok(Some(word)));
            }

            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_chunk(cx)
    }
}

struct EchoEngine;

impl Engine for EchoEngine {
    type Error = EchoEngineError;
    type Response = EchoResponse;

    fn name(&self) -> &str {
        "Echo"
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn send_request(
        &self,
        conversation: &[ChatMessage],
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = match conversation.last() {
            Some(msg) if msg.role == Role::User => {
                Ok(EchoResponse::new(&msg.content))
            }
            _ => Err(EchoEngineError(ErrorKind::Rejected)),
        };
        ready(result)
    }
}

mod tests {
    use std::future::poll_fn;

    use super::*;

    #[tokio::test]
    async fn test_streaming() {
        let engine = EchoEngine;
        assert!(engine.is_available().await);

        let conversation = [
            ChatMessage::system("Be brief."),
            ChatMessage::user("Good morning"),
        ];
        let mut resp = engine.send_request(&conversation).await.unwrap();

        let mut chunks = vec![];
        loop {
            let chunk_fut =
                poll_fn(|cx| Pin::new(&mut resp).poll_next_chunk(cx));
            match chunk_fut.await {
                Ok(Some(chunk)) => chunks.push(chunk),
                Ok(None) => break,
                Err(err) => unreachable!("unexpected error: {err:?}"),
            }
        }

        assert_eq!(chunks, ["You ", "said ", "Good ", "morning"]);
        assert_eq!(chunks.concat(), "You said Good morning");
    }

    #[tokio::test]
    async fn test_error() {
        let engine = EchoEngine;
        let result = engine.send_request(&[]).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
    }
}
