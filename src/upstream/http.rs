use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::{
    config::RelayConfig,
    models::UpstreamPayload,
    upstream::{ByteStream, ChatUpstream, UpstreamError},
};

const REJECTED_BODY_LOG_WINDOW: Duration = Duration::from_secs(2);

/// Streams completions from an OpenAI-style `chat/completions` endpoint.
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(config: &RelayConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().build().map_err(|error| {
            UpstreamError::Transport(format!("failed to build HTTP client: {error}"))
        })?;

        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &RelayConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            timeout: config.upstream_timeout,
        }
    }
}

#[async_trait]
impl ChatUpstream for HttpUpstream {
    fn name(&self) -> &str {
        "http-upstream"
    }

    async fn open_stream(&self, payload: &UpstreamPayload) -> Result<ByteStream, UpstreamError> {
        let request = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send();

        // The deadline only covers the response head; the body may stream for longer.
        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) if error.is_timeout() => {
                return Err(UpstreamError::Timeout(self.timeout))
            }
            Ok(Err(error)) => return Err(UpstreamError::Transport(error.to_string())),
            Err(_) => return Err(UpstreamError::Timeout(self.timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            warn!(
                upstream = self.name(),
                status = status.as_u16(),
                "upstream rejected request"
            );
            tokio::spawn(log_rejected_body(response));
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(upstream = self.name(), status = status.as_u16(), "upstream stream opened");
        let stream = response
            .bytes_stream()
            .map(|next| next.map_err(|error| UpstreamError::StreamRead(error.to_string())));
        Ok(stream.boxed())
    }
}

/// Logs the start of a rejected response's body. Runs detached so a slow body
/// never holds up the error returned to the client.
async fn log_rejected_body(response: reqwest::Response) {
    let status = response.status().as_u16();
    match tokio::time::timeout(REJECTED_BODY_LOG_WINDOW, response.text()).await {
        Ok(Ok(body)) => {
            let trimmed = body.chars().take(400).collect::<String>();
            debug!(status, body = %trimmed, "rejected upstream response body");
        }
        Ok(Err(error)) => debug!(status, error = %error, "rejected upstream body unreadable"),
        Err(_) => debug!(status, "rejected upstream body did not arrive in time"),
    }
}
