use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::upstream::UpstreamError;

pub const TIMEOUT_MESSAGE: &str = "upstream request timed out, please try again later";
const INTERNAL_ERROR: &str = "internal server error";

/// Failures that happen before the streaming response is committed. Every
/// variant renders as HTTP 500 with a JSON body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("{0}")]
    InvalidBody(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            AppError::Upstream(UpstreamError::Timeout(_)) => TIMEOUT_MESSAGE.to_owned(),
            AppError::Upstream(UpstreamError::Rejected { status }) => {
                format!("upstream API request failed: {status}")
            }
            AppError::Upstream(error) => error.to_string(),
            AppError::InvalidBody(_) => INTERNAL_ERROR.to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.user_message(),
            message: match &self {
                AppError::InvalidBody(detail) => Some(detail.clone()),
                AppError::Upstream(_) => None,
            },
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
