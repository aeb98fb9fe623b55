use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;

use crate::sse::{Error, Sse};

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextChunk<E> = Result<(Option<String>, Sse), E>;

/// What a decoded event contributes to the stream.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// A text chunk to deliver.
    Chunk(String),
    /// Nothing to deliver, keep reading.
    Skip,
    /// The response is complete.
    End,
}

/// Decodes the data of a single event.
pub type Decode<E> = fn(&str) -> Result<Step, E>;

pin_project! {
    /// A stream of text chunks decoded from server-sent events.
    ///
    /// Stream failures are converted into `E`, decoding is left to the
    /// engine speaking the event format.
    pub struct EventStream<E> {
        next_chunk_fut: Option<PinnedFuture<NextChunk<E>>>,
        decode: Decode<E>,
    }
}

impl<E> EventStream<E>
where
    E: From<Error> + Send + 'static,
{
    /// Creates a stream that decodes the events of `sse` with `decode`.
    #[inline]
    pub fn new(sse: Sse, decode: Decode<E>) -> Self {
        Self {
            next_chunk_fut: Some(Box::pin(next_chunk(sse, decode))),
            decode,
        }
    }

    /// Polls the next text chunk, `None` means the stream has ended.
    ///
    /// Once the stream has ended or failed, it keeps reporting the end.
    pub fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, E>> {
        let this = self.project();
        let Some(next_chunk_fut) = this.next_chunk_fut else {
            return Poll::Ready(Ok(None));
        };
        match ready!(next_chunk_fut.as_mut().poll(cx)) {
            Ok((Some(chunk), sse)) => {
                // The stream may still have more data to pull, create a new
                // future for the next chunk.
                *this.next_chunk_fut =
                    Some(Box::pin(next_chunk(sse, *this.decode)));
                Poll::Ready(Ok(Some(chunk)))
            }
            Ok((None, _)) => {
                *this.next_chunk_fut = None;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                *this.next_chunk_fut = None;
                Poll::Ready(Err(err))
            }
        }
    }
}

async fn next_chunk<E: From<Error>>(
    mut sse: Sse,
    decode: Decode<E>,
) -> NextChunk<E> {
    loop {
        let Some(event) = sse.next_event().await? else {
            return Ok((None, sse));
        };
        match decode(&event)? {
            Step::Chunk(chunk) => return Ok((Some(chunk), sse)),
            Step::Skip => continue,
            Step::End => return Ok((None, sse)),
        }
    }
}
