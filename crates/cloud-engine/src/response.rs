use std::pin::Pin;
use std::task::{Context, Poll};

use nebula_model::{EngineResponse, ErrorKind};
use nebula_sse::{EventStream, Sse, Step};
use pin_project_lite::pin_project;

use crate::Error;
use crate::proto::StreamChunk;

pin_project! {
    pub struct CloudResponse {
        #[pin]
        events: EventStream<Error>,
    }
}

impl CloudResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        Self {
            events: EventStream::new(sse, decode_event),
        }
    }
}

impl EngineResponse for CloudResponse {
    type Error = crate::Error;

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
    let chunk = serde_json::from_str::<StreamChunk>(event).map_err(|err| {
        Error::new(format!("{err}"), ErrorKind::MalformedResponse)
    })?;
    if let Some(err) = chunk.error {
        return Err(Error::new(err.message, ErrorKind::Rejected));
    }
    if let Some(reason) = chunk
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
    {
        debug!("finished with reason: {reason}");
    }

    // Events that carry no text (usage metadata, safety ratings) are not
    // delivered as chunks.
    let text = chunk.text();
    if text.is_empty() {
        return Ok(Step::Skip);
    }
    Ok(Step::Chunk(text))
}
