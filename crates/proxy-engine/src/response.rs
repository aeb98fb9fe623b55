use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use nebula_model::EngineResponse;
use tokio::time::{Sleep, sleep};

/// A response that replays a complete reply word by word, to look like the
/// streaming engines.
pub struct ProxyResponse {
    tokens: VecDeque<String>,
    delay: Duration,
    started: bool,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ProxyResponse {
    #[inline]
    pub(crate) fn new(tokens: Vec<String>, delay: Duration) -> Self {
        Self {
            tokens: tokens.into(),
            delay,
            started: false,
            sleep: None,
        }
    }
}

impl EngineResponse for ProxyResponse {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let this = self.get_mut();

        // The first token is delivered right away, the following ones are
        // paced by the delay.
        if this.started && !this.tokens.is_empty() {
            let sleep = this
                .sleep
                .get_or_insert_with(|| Box::pin(sleep(this.delay)));
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
        }
        this.started = true;

        Poll::Ready(Ok(this.tokens.pop_front()))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_paced_tokens() {
        let tokens = vec!["objective ".to_owned(), "clear ".to_owned()];
        let mut resp =
            pin!(ProxyResponse::new(tokens, Duration::from_millis(50)));

        let start = Instant::now();
        let first = poll_fn(|cx| resp.as_mut().poll_next_chunk(cx)).await;
        assert_eq!(first.unwrap().as_deref(), Some("objective "));
        assert_eq!(start.elapsed(), Duration::ZERO);

        let second = poll_fn(|cx| resp.as_mut().poll_next_chunk(cx)).await;
        assert_eq!(second.unwrap().as_deref(), Some("clear "));
        assert!(start.elapsed() >= Duration::from_millis(50));

        let end = poll_fn(|cx| resp.as_mut().poll_next_chunk(cx)).await;
        assert_eq!(end.unwrap(), None);
        let end = poll_fn(|cx| resp.as_mut().poll_next_chunk(cx)).await;
        assert_eq!(end.unwrap(), None);
    }
}
