use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{trace, warn};

use crate::{
    models::{delta_content, StreamEvent},
    upstream::UpstreamError,
};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Splits raw upstream bytes into event lines. Bytes after the last newline
/// stay buffered until the next chunk completes the line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(index) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line = self.buffer.drain(..=index).collect::<Vec<_>>();
            events.extend(decode_line(&line[..index]));
        }
        events
    }

    /// Flushes a final line that the upstream closed without terminating.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest).into_iter().collect()
    }
}

fn decode_line(raw: &[u8]) -> Option<StreamEvent> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        Err(error) => {
            warn!(error = %error, "skipping event line that is not valid UTF-8");
            return None;
        }
    };
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return None;
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        trace!(line, "ignoring non-data event line");
        return None;
    };

    if payload == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(event) => delta_content(&event)
            .filter(|content| !content.is_empty())
            .map(|content| StreamEvent::Delta(content.to_owned())),
        Err(error) => {
            warn!(error = %error, payload, "skipping malformed event payload");
            None
        }
    }
}

/// Lazily turns the upstream byte stream into decoded events, in order.
/// A read error is passed through once and ends the stream.
pub fn decode_events<S>(chunks: S) -> impl Stream<Item = Result<StreamEvent, UpstreamError>>
where
    S: Stream<Item = Result<Bytes, UpstreamError>> + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = LineDecoder::new();
        let mut chunks = Box::pin(chunks);

        while let Some(next) = chunks.next().await {
            match next {
                Ok(bytes) => {
                    for event in decoder.push(&bytes) {
                        yield Ok(event);
                    }
                }
                Err(error) => {
                    yield Err(error);
                    return;
                }
            }
        }

        for event in decoder.finish() {
            yield Ok(event);
        }
    }
}
