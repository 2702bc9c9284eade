use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::ip::{PeerAddr, client_key, rate_limit_headers};
use crate::error::AppError;
use crate::state::AppState;

/// Per-client rate-limit middleware applied to every route.
///
/// Clients are keyed by [`client_key`]. A denied request is answered with 429
/// before it reaches the handler. Admitted responses get `X-RateLimit-*`
/// headers.
pub async fn rate_limit(
    State(state): State<AppState>,
    PeerAddr(peer): PeerAddr,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(request.headers(), state.trust_proxy, peer);
    let rl = state.rate_limiter.check(key.clone());
    if !rl.allowed {
        tracing::warn!(
            client = %key,
            path = %request.uri().path(),
            retry_after_secs = rl.reset_after_secs,
            "rate limit exceeded"
        );
        return AppError::rate_limited(&rl).into_response();
    }
    let mut response = next.run(request).await;
    response.headers_mut().extend(rate_limit_headers(&rl));
    response
}
