//! HTTP middleware
//!
//! Provides:
//! - Wallet authentication (bearer wallet address)
//! - Rate limiting per IP
//! - Request size limits
//! - Security headers
//! - Request logging

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::api::error_response;
use crate::error::BountyError;
use crate::identity::IdentityResolver;

/// Security configuration for middleware
#[derive(Debug, Clone)]
pub struct SecurityMiddlewareConfig {
    /// Rate limit: requests per minute per IP
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Enable request logging
    pub log_requests: bool,
}

impl Default for SecurityMiddlewareConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 120,
            max_request_size: 1024 * 1024, // 1MB
            log_requests: false,
        }
    }
}

/// Rate limiter state - tracks requests per IP
#[derive(Debug)]
pub struct RateLimiter {
    /// Map of IP -> (request count, window start)
    requests: DashMap<String, (u32, Instant)>,
    /// Requests allowed per window
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests: DashMap::new(),
            limit: requests_per_minute,
            window: Duration::from_secs(60),
        }
    }

    /// Check if request is allowed and update counter.
    /// Returns (allowed, remaining, reset_after_secs)
    pub fn check_request(&self, ip: &str) -> (bool, u32, u64) {
        let now = Instant::now();

        let mut entry = self.requests.entry(ip.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) >= self.window {
            *count = 0;
            *window_start = now;
        }

        let remaining = self.limit.saturating_sub(*count);
        let reset_after = self
            .window
            .checked_sub(now.duration_since(*window_start))
            .map(|d| d.as_secs())
            .unwrap_or(0);

        if *count >= self.limit {
            return (false, 0, reset_after);
        }

        *count += 1;
        (true, remaining.saturating_sub(1), reset_after)
    }

    /// Drop windows that have long expired
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.requests
            .retain(|_, (_, window_start)| now.duration_since(*window_start) < self.window * 2);
    }
}

/// Shared state for security middleware
#[derive(Clone)]
pub struct SecurityState {
    pub config: SecurityMiddlewareConfig,
    pub rate_limiter: Arc<RateLimiter>,
}

impl SecurityState {
    pub fn new(config: SecurityMiddlewareConfig) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute));
        Self {
            config,
            rate_limiter,
        }
    }
}

/// Extract client IP from request, handling proxies
fn get_client_ip(headers: &HeaderMap, addr: Option<&SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            // first entry is the original client
            if let Some(ip) = value.split(',').next() {
                return ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip) = real_ip.to_str() {
            return ip.trim().to_string();
        }
    }

    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn connect_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

// ============================================================================
// Wallet authentication
// ============================================================================

/// Canonical wallet address of the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl AuthenticatedUser {
    pub fn address(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Authorization header required".to_string(),
            ))
    }
}

/// Resolve `Authorization: Bearer <wallet>` to an [`AuthenticatedUser`].
///
/// Requests without the header pass through unauthenticated; handlers that
/// need a caller reject them. A header that cannot be resolved is refused
/// here.
pub async fn wallet_auth_middleware(
    State(identity): State<IdentityResolver>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let authorization = match request.headers().get(header::AUTHORIZATION) {
        Some(value) => value
            .to_str()
            .map_err(|_| {
                (
                    StatusCode::UNAUTHORIZED,
                    "Invalid authorization header".to_string(),
                )
            })?
            .to_string(),
        None => return Ok(next.run(request).await),
    };

    match identity.resolve(&authorization).await {
        Ok(address) => {
            debug!(user_id = %address, path = %request.uri().path(), "Wallet authenticated");
            request.extensions_mut().insert(AuthenticatedUser(address));
            Ok(next.run(request).await)
        }
        Err(BountyError::Unauthorized(reason)) => {
            warn!(path = %request.uri().path(), reason = %reason, "Rejected credentials");
            Err((StatusCode::UNAUTHORIZED, reason))
        }
        Err(e) => Err(error_response(e)),
    }
}

// ============================================================================
// Transport guards
// ============================================================================

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<SecurityState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let client_ip = get_client_ip(request.headers(), connect_addr(&request).as_ref());
    let (allowed, remaining, reset_after) = state.rate_limiter.check_request(&client_ip);

    if !allowed {
        warn!(
            "Rate limit exceeded for IP: {} on path: {}",
            client_ip,
            request.uri().path()
        );

        let mut response = StatusCode::TOO_MANY_REQUESTS.into_response();
        let headers = response.headers_mut();
        headers.insert(
            "X-RateLimit-Limit",
            HeaderValue::from(state.config.rate_limit_per_minute),
        );
        headers.insert("X-RateLimit-Remaining", HeaderValue::from(0u32));
        headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_after));
        headers.insert("Retry-After", HeaderValue::from(reset_after));

        return Err(response);
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(state.config.rate_limit_per_minute),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_after));

    Ok(response)
}

/// Request body size validation middleware
pub async fn body_size_middleware(
    State(state): State<SecurityState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if let Some(length) = length {
        if length > state.config.max_request_size {
            warn!(
                "Request body too large: {} bytes (max: {})",
                length, state.config.max_request_size
            );
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }
    }

    Ok(next.run(request).await)
}

/// Security headers middleware
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.remove("Server");

    response
}

/// Request logging middleware
pub async fn logging_middleware(
    State(state): State<SecurityState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.log_requests {
        return next.run(request).await;
    }

    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = get_client_ip(request.headers(), connect_addr(&request).as_ref());

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            client_ip = %client_ip,
            "Request failed"
        );
    } else if status.is_client_error() {
        warn!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            client_ip = %client_ip,
            "Client error"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            client_ip = %client_ip,
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_up_to_limit() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.check_request("10.0.0.1").0);
        assert!(limiter.check_request("10.0.0.1").0);
        let (allowed, remaining, _) = limiter.check_request("10.0.0.1");
        assert!(allowed);
        assert_eq!(remaining, 0);
        assert!(!limiter.check_request("10.0.0.1").0);

        // other clients have their own window
        assert!(limiter.check_request("10.0.0.2").0);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(get_client_ip(&headers, None), "1.2.3.4");

        headers.remove("x-forwarded-for");
        assert_eq!(get_client_ip(&headers, None), "5.6.7.8");

        let addr: SocketAddr = "9.9.9.9:4000".parse().unwrap();
        assert_eq!(get_client_ip(&HeaderMap::new(), Some(&addr)), "9.9.9.9");
        assert_eq!(get_client_ip(&HeaderMap::new(), None), "unknown");
    }
}
