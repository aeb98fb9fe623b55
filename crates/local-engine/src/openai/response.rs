use std::pin::Pin;
use std::task::{Context, Poll};

use nebula_model::{EngineResponse, ErrorKind};
use nebula_sse::{EventStream, Sse, Step};
use pin_project_lite::pin_project;

use super::Error;
use super::proto::ChatCompletionChunk;

pin_project! {
    /// A streaming chat completion from the local server.
    pub struct OpenAICompatResponse {
        #[pin]
        events: EventStream<Error>,
    }
}

impl OpenAICompatResponse {
    #[inline]
    pub(crate) fn from_sse(sse: Sse) -> Self {
        Self {
            events: EventStream::new(sse, decode_event),
        }
    }
}

impl EngineResponse for OpenAICompatResponse {
    type Error = Error;

    #[inline]
    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        self.project().events.poll_next_chunk(cx)
    }
}

fn decode_event(event: &str) -> Result<Step, Error> {
    trace!("got sse event: {event}");
    if event == "[DONE]" {
        return Ok(Step::End);
    }

    let mut chunk =
        serde_json::from_str::<ChatCompletionChunk>(event).map_err(|err| {
            Error::new(format!("{err}"), ErrorKind::MalformedResponse)
        })?;
    let Some(choice) = chunk.choices.pop() else {
        return Ok(Step::Skip);
    };
    if let Some(finish_reason) = choice.finish_reason {
        debug!("finished with reason: {finish_reason}");
    }

    // Role-only and empty deltas carry nothing to show.
    match choice.delta.content {
        Some(content) if !content.is_empty() => Ok(Step::Chunk(content)),
        _ => Ok(Step::Skip),
    }
}
