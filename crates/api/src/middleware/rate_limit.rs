use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use portal_cache::{rate_limit_key, CacheError, SharedStore};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct RateLimitError {
    error: String,
    message: String,
    retry_after: u64,
}

/// Fixed-window counter over the shared key-value store, so every server
/// process pointing at the same store shares one budget.
pub struct RateLimiter {
    store: SharedStore,
}

impl RateLimiter {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Check if request is rate limited
    /// Returns (is_allowed, retry_after_seconds)
    pub async fn check_rate_limit(
        &self,
        key: &str,
        max_requests: u32,
        window_seconds: u64,
    ) -> Result<(bool, Option<u64>), CacheError> {
        let count = self.store.incr_with_ttl(key, window_seconds).await?;

        if count <= i64::from(max_requests) {
            return Ok((true, None));
        }

        let retry_after = self
            .store
            .ttl(key)
            .await?
            .filter(|secs| *secs > 0)
            .unwrap_or(window_seconds);
        Ok((false, Some(retry_after)))
    }
}

/// Client address the attempt budget is keyed on. With no trusted proxy
/// this is the socket peer and forwarding headers are ignored. Behind
/// `trusted_hops` proxies it is the `trusted_hops`-th `X-Forwarded-For`
/// entry from the right, the one appended by the outermost trusted proxy.
fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trusted_hops: usize) -> String {
    let forwarded = (trusted_hops > 0)
        .then(|| forwarded_ip(headers, trusted_hops))
        .flatten();

    forwarded
        .or(peer)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_ip(headers: &HeaderMap, trusted_hops: usize) -> Option<IpAddr> {
    let entries: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();

    entries
        .get(entries.len().saturating_sub(trusted_hops))
        .and_then(|entry| entry.parse().ok())
}

/// Rate limit middleware for admin login attempts.
/// Runs before the credential check. If the counter cannot be read the
/// attempt is refused with 503.
pub async fn rate_limit_login(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip(request.headers(), peer, state.config.trusted_proxy_hops);
    let limits = state.config.login_rate_limit;
    let rate_limiter = RateLimiter::new(state.store.clone());

    match rate_limiter
        .check_rate_limit(
            &rate_limit_key("admin_login", &ip),
            limits.max_attempts,
            limits.window_seconds,
        )
        .await
    {
        Ok((true, _)) => Ok(next.run(request).await),
        Ok((false, retry_after)) => {
            let retry_after = retry_after.unwrap_or(limits.window_seconds);
            tracing::warn!("Rate limit exceeded for admin login from IP: {}", ip);
            Err(too_many_requests(retry_after))
        }
        Err(e) => {
            tracing::error!("Rate limit check error, refusing login attempt: {}", e);
            Err(ApiError::ServiceUnavailable.into_response())
        }
    }
}

fn too_many_requests(retry_after: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitError {
            error: "rate_limit_exceeded".to_string(),
            message: format!(
                "Too many login attempts. Please try again in {} seconds.",
                retry_after
            ),
            retry_after,
        }),
    )
        .into_response();

    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}
