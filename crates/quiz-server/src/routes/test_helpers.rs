//! Shared test utilities for route handler tests.
//!
//! Imported in each route module's `#[cfg(test)]` block via
//! `use crate::routes::test_helpers::*;`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc, clippy::panic)]

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::StatusCode;

use crate::quiz::QuizService;
use crate::quiz::store::mock::InMemoryQuizStore;
use crate::rate_limit::IpRateLimiter;
use crate::state::AppState;

/// Initialize a tracing subscriber that writes to the test output buffer.
///
/// Call at the start of any test that needs to see `tracing::error!` output.
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("quiz_server=debug")
        .try_init();
}

/// Assert an HTTP response has the expected status code and return the body.
///
/// On failure, reads and prints the response body so CI output shows the error.
pub async fn assert_status(resp: axum::response::Response, expected: StatusCode) -> Bytes {
    let actual = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 65536)
        .await
        .unwrap_or_default();
    if actual != expected {
        let body_str = String::from_utf8_lossy(&body);
        panic!(
            "assertion `left == right` failed\n  left: {actual}\n right: {expected}\n  body: {body_str}"
        );
    }
    body
}

/// Like [`assert_status`], parsing the body as JSON.
pub async fn assert_json(resp: axum::response::Response, expected: StatusCode) -> serde_json::Value {
    let body = assert_status(resp, expected).await;
    serde_json::from_slice(&body).unwrap()
}

/// Constructs an `AppState` over `store` with a limiter generous enough that
/// handler tests never hit it.
pub fn make_state(store: InMemoryQuizStore) -> AppState {
    AppState {
        quizzes: QuizService::new(Arc::new(store)),
        rate_limiter: Arc::new(IpRateLimiter::new(10_000.0, 10_000)),
        trust_proxy: false,
    }
}
