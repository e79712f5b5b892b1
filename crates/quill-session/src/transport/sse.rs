//! Server-sent events framing
//!
//! [`SseDecoder`] turns arbitrary byte chunks of a `text/event-stream` body
//! into the `data` payloads of complete events. Chunk boundaries may fall
//! anywhere, including inside a UTF-8 sequence.

use crate::error::TransportError;
use futures::stream::{self, BoxStream, Stream, StreamExt};

/// Incremental `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Create decoder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns payloads of events completed by this chunk.
    ///
    /// Multi-line `data` fields are joined with `\n`. Comments and fields
    /// other than `data` are skipped. Events without data are not emitted.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.pending[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + offset;
            let mut line = &self.pending[consumed..end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            consumed = end + 1;

            if let Some(payload) = self.process_line(&line) {
                events.push(payload);
            }
        }
        self.pending.drain(..consumed);
        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let payload = self.data.join("\n");
            self.data.clear();
            return Some(payload);
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

/// Decode a byte stream of SSE into a stream of frame payloads.
///
/// Transport errors in the body are passed through in order.
pub fn sse_frames<S, B>(body: S) -> BoxStream<'static, Result<String, TransportError>>
where
    S: Stream<Item = Result<B, TransportError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    body.scan(SseDecoder::new(), |decoder, chunk| {
        let frames: Vec<Result<String, TransportError>> = match chunk {
            Ok(bytes) => decoder.push(bytes.as_ref()).into_iter().map(Ok).collect(),
            Err(err) => vec![Err(err)],
        };
        futures::future::ready(Some(stream::iter(frames)))
    })
    .flatten()
    .boxed()
}
