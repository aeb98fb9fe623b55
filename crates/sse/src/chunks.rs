use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// Error returned when the underlying body stream breaks.
#[derive(Debug, PartialEq, Eq)]
pub struct Error;

/// An adapter for streaming byte chunks.
pub enum Chunks {
    /// Chunks read from a live HTTP response body.
    Response(Response),
    /// Chunks replayed from memory, mainly for fixtures.
    VecDeque(VecDeque<Bytes>),
}

impl Chunks {
    /// Reads chunks from the body of `response`.
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    /// Replays the given chunks in order.
    #[inline]
    pub fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        Chunks::VecDeque(vec)
    }

    /// Reads the next chunk, `None` means the body has ended.
    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => {
                let Ok(chunk) = response.chunk().await else {
                    return Err(Error);
                };
                Ok(chunk)
            }
            Chunks::VecDeque(vec) => {
                let chunk = vec.pop_front();
                Ok(chunk)
            }
        }
    }
}
