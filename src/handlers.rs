use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{Stream, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    decoder::decode_events,
    errors::AppError,
    metrics::{InflightGuard, RelayMetrics},
    models::{ChatRequest, StreamEvent, UpstreamPayload},
    sanitize::clean_delta,
    state::AppState,
    upstream::UpstreamError,
};

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(error) => {
            warn!(error = %error, "metrics render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics render failed: {error}"))
                .into_response()
        }
    }
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let response = match open_relay(&state, payload, &request_id).await {
        Ok(response) => response,
        Err(error) => {
            error!(request_id = %request_id, error = %error, "chat request failed");
            error.into_response()
        }
    };

    state
        .metrics
        .observe_request(response.status().as_u16(), started.elapsed());
    response
}

async fn open_relay(
    state: &AppState,
    payload: Result<Json<ChatRequest>, JsonRejection>,
    request_id: &str,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::InvalidBody(rejection.body_text()))?;
    let inflight = state.metrics.inflight_guard();
    let payload = UpstreamPayload::from_request(request, &state.config.model);

    info!(
        request_id = %request_id,
        upstream = state.upstream.name(),
        model = %payload.model,
        messages = payload.message_count(),
        temperature = payload.temperature,
        "chat request accepted"
    );

    let chunks = state.upstream.open_stream(&payload).await.map_err(|error| {
        state.metrics.observe_upstream_error(error.kind());
        AppError::from(error)
    })?;

    let body = relay_text(
        decode_events(chunks),
        state.metrics.clone(),
        inflight,
        request_id.to_owned(),
    );

    // Streaming mode is committed here; nothing after this point can change the status.
    Ok((
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Maps decoded events to the raw text written to the client. Stops at
/// `[DONE]` or when the upstream closes; a read failure is passed on so the
/// transfer is cut rather than ended cleanly.
pub fn relay_text<S>(
    events: S,
    metrics: Arc<RelayMetrics>,
    inflight: InflightGuard,
    request_id: String,
) -> impl Stream<Item = Result<String, UpstreamError>>
where
    S: Stream<Item = Result<StreamEvent, UpstreamError>> + Send + 'static,
{
    async_stream::stream! {
        let _inflight = inflight;
        let mut events = Box::pin(events);
        let mut forwarded = 0usize;

        while let Some(next) = events.next().await {
            match next {
                Ok(StreamEvent::Delta(delta)) => match clean_delta(&delta) {
                    Some(text) => {
                        metrics.observe_fragment(true);
                        forwarded += 1;
                        yield Ok(text);
                    }
                    None => metrics.observe_fragment(false),
                },
                Ok(StreamEvent::Done) => {
                    debug!(request_id = %request_id, "upstream sent [DONE]");
                    break;
                }
                Err(error) => {
                    metrics.observe_upstream_error(error.kind());
                    error!(
                        request_id = %request_id,
                        error = %error,
                        forwarded,
                        "upstream stream failed after headers were sent"
                    );
                    yield Err(error);
                    return;
                }
            }
        }

        info!(request_id = %request_id, forwarded, "relay completed");
    }
}
