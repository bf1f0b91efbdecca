use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::{sync::mpsc, time::sleep};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::{
    models::UpstreamPayload,
    upstream::{ByteStream, ChatUpstream, UpstreamError},
};

/// Replays a fixed event stream, for exercising the relay without a network.
#[derive(Debug, Default)]
pub struct ScriptedUpstream {
    chunks: Vec<Bytes>,
    fail_after_chunks: Option<String>,
    reject_with: Option<u16>,
    chunk_delay: Duration,
    received: Mutex<Vec<UpstreamPayload>>,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `data: {...}` event per delta, followed by `data: [DONE]`.
    pub fn from_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut upstream = Self::new();
        for delta in deltas {
            upstream = upstream.with_line(delta_line(delta.as_ref()));
        }
        upstream.with_line("data: [DONE]")
    }

    pub fn with_line(self, line: impl AsRef<str>) -> Self {
        self.with_chunk(format!("{}\n\n", line.as_ref()))
    }

    pub fn with_chunk(mut self, chunk: impl Into<Bytes>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    pub fn failing_after_chunks(mut self, message: impl Into<String>) -> Self {
        self.fail_after_chunks = Some(message.into());
        self
    }

    pub fn rejecting(mut self, status: u16) -> Self {
        self.reject_with = Some(status);
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn received(&self) -> Vec<UpstreamPayload> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }
}

pub fn delta_line(content: &str) -> String {
    let event = serde_json::json!({
        "choices": [{ "index": 0, "delta": { "content": content } }]
    });
    format!("data: {event}")
}

#[async_trait]
impl ChatUpstream for ScriptedUpstream {
    fn name(&self) -> &str {
        "scripted-upstream"
    }

    async fn open_stream(&self, payload: &UpstreamPayload) -> Result<ByteStream, UpstreamError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(payload.clone());
        }

        if let Some(status) = self.reject_with {
            return Err(UpstreamError::Rejected { status });
        }

        let chunks = self.chunks.clone();
        let failure = self.fail_after_chunks.clone();
        let delay = self.chunk_delay;
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }

            if let Some(message) = failure {
                let _ = tx.send(Err(UpstreamError::StreamRead(message))).await;
            }
        });

        debug!(upstream = self.name(), "scripted stream prepared");
        Ok(ReceiverStream::new(rx).boxed())
    }
}
