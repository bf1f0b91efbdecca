pub mod http;
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::models::UpstreamPayload;

pub type ByteStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// The completion API the relay forwards to.
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    fn name(&self) -> &str;

    /// Sends one streamed completion request. Resolves once the upstream has
    /// answered with a 2xx head; the body is left unread in the returned stream.
    async fn open_stream(&self, payload: &UpstreamPayload) -> Result<ByteStream, UpstreamError>;
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream did not respond within {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("upstream transport failure: {0}")]
    Transport(String),
    #[error("upstream rejected request with status {status}")]
    Rejected { status: u16 },
    #[error("upstream stream read failed: {0}")]
    StreamRead(String),
}

impl UpstreamError {
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Rejected { .. } => "rejected",
            UpstreamError::StreamRead(_) => "stream_read",
        }
    }
}
