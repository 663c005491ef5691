use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::retry::is_retryable_http_error;
use crate::sse::DecodeError;

/// `error_type` reported when a failure body is not the API's JSON envelope.
pub const UNEXPECTED_ERROR_TYPE: &str = "Unexpected";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("an API key or Azure API key is required")]
    MissingApiKey,

    #[error("invalid header {0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} {error_type}: {message}")]
    Api {
        status: u16,
        error_type: String,
        message: String,
    },

    #[error("malformed event stream: {0}")]
    Decode(#[from] DecodeError),

    #[error("invalid json stream data: {0}")]
    MalformedChunk(#[source] serde_json::Error),

    #[error("invalid json response: {0}")]
    InvalidResponse(#[source] serde_json::Error),

    #[error("failed encoding json: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("request was cancelled")]
    Cancelled,
}

impl ApiError {
    /// Transport failures worth another attempt.
    ///
    /// Network errors always qualify; API responses qualify by status and
    /// message. Validation, decode and cancellation errors never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(error) => !error.is_builder(),
            Self::Api {
                status, message, ..
            } => is_retryable_http_error(*status, message),
            _ => false,
        }
    }

    /// HTTP status for API errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayloadFields {
    message: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
}

/// Build the structured error for a non-2xx response body.
pub fn parse_api_error(status: StatusCode, body: &str) -> ApiError {
    let status_code = status.as_u16();

    if let Ok(ErrorPayload {
        error: Some(fields),
    }) = serde_json::from_str::<ErrorPayload>(body)
    {
        return ApiError::Api {
            status: status_code,
            error_type: fields.type_.unwrap_or_default(),
            message: fields
                .message
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| fallback_message(status, "")),
        };
    }

    ApiError::Api {
        status: status_code,
        error_type: UNEXPECTED_ERROR_TYPE.to_owned(),
        message: fallback_message(status, body),
    }
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
