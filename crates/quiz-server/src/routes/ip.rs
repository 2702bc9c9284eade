use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};

use crate::rate_limit::RateLimitResult;

/// Bucket key used when neither a trusted header nor a socket address is
/// available. Every such request shares one bucket.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// IP of the TCP peer, without its port.
///
/// `None` when the router was not served with
/// `into_make_service_with_connect_info` (e.g. `oneshot` in tests).
pub struct PeerAddr(pub Option<IpAddr>);

impl<S: Send + Sync> axum::extract::FromRequestParts<S> for PeerAddr {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
        ))
    }
}

/// Rate-limit bucket key for a request.
///
/// Keys are bare IP addresses, so every connection from one host shares a
/// bucket whatever its source port. IPv4-mapped IPv6 peers are folded into
/// their IPv4 form.
///
/// With `trust_proxy`, the first `X-Forwarded-For` entry wins when it parses
/// as an IP; anything else falls back to the peer. Clients can forge that
/// header, so only trust it behind a proxy that overwrites it.
pub fn client_key(headers: &HeaderMap, trust_proxy: bool, peer: Option<IpAddr>) -> String {
    let forwarded = if trust_proxy {
        forwarded_client(headers)
    } else {
        None
    };
    forwarded
        .or(peer)
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |ip| ip.to_canonical().to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// `X-RateLimit-Limit`, `-Remaining` and `-Reset` for an admitted request.
/// Reset is [`RateLimitResult::reset_after_secs`].
pub fn rate_limit_headers(result: &RateLimitResult) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(3);
    headers.insert("x-ratelimit-limit", HeaderValue::from(result.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(result.remaining));
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(result.reset_after_secs),
    );
    headers
}
