use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Inbound body of `POST /chat`. `messages` is carried as raw JSON so the
/// upstream sees exactly what the client sent; a missing list is left for
/// the upstream to reject.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Option<Value>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamPayload {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Value>,
    pub temperature: f64,
    pub stream: bool,
}

impl UpstreamPayload {
    pub fn from_request(request: ChatRequest, model: &str) -> Self {
        Self {
            model: model.to_owned(),
            messages: request.messages,
            temperature: request.temperature,
            stream: true,
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages
            .as_ref()
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

/// One decoded unit of the upstream event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
}

/// `choices[0].delta.content` of one upstream event. The rest of the event is
/// not inspected.
pub fn delta_content(event: &Value) -> Option<&str> {
    event
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
}
