use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use serde_json::json;

use crate::quiz::QuizError;
use crate::rate_limit::RateLimitResult;

/// Error returned by HTTP handlers and middleware.
///
/// Every variant renders the same envelope:
/// `{"success": false, "error": {"code": "...", "message": "..."}}`.
#[derive(Debug)]
pub enum AppError {
    /// Storage or other server-side failure. `message` is safe to show to
    /// clients; `detail` is only logged.
    Internal {
        message: &'static str,
        detail: String,
    },
    InvalidJson(String),
    Validation(String),
    NotFound(String),
    Conflict(String),
    RateLimited {
        retry_after_secs: u64,
        limit: u32,
        remaining: u32,
    },
}

impl AppError {
    /// Construct a `RateLimited` error from a denied [`RateLimitResult`].
    pub const fn rate_limited(result: &RateLimitResult) -> Self {
        Self::RateLimited {
            retry_after_secs: result.reset_after_secs,
            limit: result.limit,
            remaining: result.remaining,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMITED",
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidJson(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Internal { message, .. } => *message,
            Self::InvalidJson(msg)
            | Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.as_str(),
            Self::RateLimited { .. } => "Rate limit exceeded",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal { message, detail } => write!(f, "internal error: {message}: {detail}"),
            Self::InvalidJson(msg) => write!(f, "invalid json: {msg}"),
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::RateLimited { .. } => write!(f, "rate limited"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<QuizError> for AppError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::InvalidInput(msg) => Self::Validation(msg),
            QuizError::NotFound => Self::NotFound("Quiz not found".to_string()),
            QuizError::Conflict(msg) => Self::Conflict(msg),
            QuizError::Internal { step, source } => Self::Internal {
                message: step.public_message(),
                detail: format!("{step}: {source}"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "error": { "code": self.code(), "message": self.message() },
        }));
        match self {
            Self::RateLimited {
                retry_after_secs,
                limit,
                remaining,
            } => {
                let mut headers = HeaderMap::with_capacity(4);
                headers.insert("retry-after", HeaderValue::from(retry_after_secs));
                headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
                headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
                headers.insert("x-ratelimit-reset", HeaderValue::from(retry_after_secs));
                (status, headers, body).into_response()
            }
            Self::Internal { message, detail } => {
                tracing::error!("{message}: {detail}");
                (status, body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}
