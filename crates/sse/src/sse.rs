use crate::chunks::{Chunks, Error as ChunksError};

/// Errors from reading server-sent events.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The body stream broke.
    ChunksError(ChunksError),
    /// The stream is not valid UTF-8.
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
pub struct Sse {
    buf: String,
    pending: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    /// Creates a reader over `chunks`.
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending: Vec::new(),
            chunks,
        }
    }

    /// Reads the data of the next event, `None` means the stream has ended.
    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain complete events from the buffer first.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                // A held back carriage return still ends the last line.
                if self.pending.as_slice() == b"\r" {
                    self.pending.clear();
                    self.buf.push('\n');
                    return self.try_parse_event();
                }
                return Ok(None);
            };
            self.push_bytes(&bytes)?;
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        // A multi-byte character may be split across two chunks, keep the
        // incomplete tail until the next chunk arrives.
        self.pending.extend_from_slice(bytes);
        let mut valid_len = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => return Err(Error::InvalidPayload),
        };
        // A trailing carriage return may be the first half of a CRLF pair.
        if valid_len > 0 && self.pending[valid_len - 1] == b'\r' {
            valid_len -= 1;
        }
        let tail = self.pending.split_off(valid_len);
        let text = String::from_utf8(std::mem::replace(&mut self.pending, tail))
            .map_err(|_| Error::InvalidPayload)?;
        self.buf
            .push_str(&text.replace("\r\n", "\n").replace('\r', "\n"));
        Ok(())
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // For `end-of-line`, only line feed is handled (CRLF and lone CR
            // are normalized when buffering).
            //
            // event         = *( comment / field ) end-of-line
            // comment       = colon *any-char end-of-line
            // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
            let Some(eol_idx) = self.buf.find("\n\n") else {
                return Ok(None);
            };

            let mut data: Option<String> = None;
            for line in self.buf[0..eol_idx].lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (name, value) = match line.split_once(':') {
                    Some((name, value)) => {
                        (name, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                match name {
                    "data" => {
                        let data = data.get_or_insert_default();
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(value);
                    }
                    // `event`, `id`, `retry` and unknown fields.
                    _ => {}
                }
            }

            // Consume the bytes from the buffer.
            self.buf.drain(0..eol_idx + 2);

            // Events without data (keep-alive comments) are skipped.
            if let Some(data) = data {
                return Ok(Some(data));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse_from(chunks: &[&'static str]) -> Sse {
        Sse::new(Chunks::from_vec_deque(
            chunks
                .iter()
                .map(|&chunk| Bytes::from_static(chunk.as_bytes()))
                .collect(),
        ))
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse = sse_from(&["data: hello\n\n", "data: bye\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quirk_streaming() {
        let mut sse = sse_from(&["data:", " hello\r\n", "\r\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_crlf() {
        let mut sse = sse_from(&["data: x\r\n\r", "\ndata: y\r\n\r\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "x");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "y");
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = sse_from(&["data: a\r", "\r", "data: b\r\r"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "a");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "b");
    }

    #[tokio::test]
    async fn test_split_utf8() {
        let bytes = "data: héllo\n\n".as_bytes();
        let (head, tail) = bytes.split_at(8);
        let mut sse = Sse::new(Chunks::from_vec_deque(
            vec![Bytes::copy_from_slice(head), Bytes::copy_from_slice(tail)]
                .into(),
        ));
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "héllo");
    }

    #[tokio::test]
    async fn test_comments_and_fields() {
        let mut sse = sse_from(&[
            ": keep-alive\n\n",
            "event: message\nid: 7\ndata: a\ndata: b\n\n",
        ]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "a\nb");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        // Unknown fields are ignored.
        let mut sse = sse_from(&["xxxxxx\n\n", "data: kept\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "kept");

        let mut sse = Sse::new(Chunks::from_vec_deque(
            vec![Bytes::from_static(b"data: \xff\n\n")].into(),
        ));
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        let mut sse = sse_from(&["xxxxxx\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = sse_from(&["data: hello\n", "data: bye\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);
    }
}
