//! Request throttling.
//!
//! Login and signup use the fixed-window [`RateLimiter`](crate::rate_limit::RateLimiter)
//! held in the application state. The admin API as a whole sits behind a
//! per-IP governor quota.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use std::{convert::Infallible, net::SocketAddr, num::NonZeroU32, sync::Arc};

use crate::rate_limit::RateLimitResult;
use crate::web::error::ApiError;
use crate::web::state::AppState;

/// Client address as seen through any reverse proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let socket = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(client_ip(&parts.headers, socket)))
    }
}

/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the socket address.
pub fn client_ip(headers: &HeaderMap, socket: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or_default().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| socket.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Count a hit against `endpoint` and reject it once over `threshold`.
pub fn enforce(state: &AppState, endpoint: &str, ip: &str, threshold: u32) -> Result<(), ApiError> {
    match state.limiter.check(endpoint, ip, threshold) {
        RateLimitResult::Allowed => Ok(()),
        RateLimitResult::Denied { retry_after } => {
            tracing::warn!(endpoint, ip, retry_after = ?retry_after, "Rate limit exceeded");
            Err(ApiError::too_many_requests())
        }
    }
}

/// Governor limiter keyed by client IP.
pub type IpRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-IP request quota for the admin API.
pub struct ApiThrottle {
    limiter: Option<IpRateLimiter>,
}

impl ApiThrottle {
    /// Allow `per_minute` requests per client; zero disables the throttle.
    pub fn new(per_minute: u32) -> Self {
        Self {
            limiter: NonZeroU32::new(per_minute)
                .map(|n| RateLimiter::keyed(Quota::per_minute(n))),
        }
    }

    /// Whether a request from `ip` fits the quota.
    pub fn check(&self, ip: &str) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check_key(&ip.to_string()).is_ok(),
            None => true,
        }
    }

    /// Drop state for clients that are back at full quota.
    pub fn cleanup(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
        }
    }
}

/// Middleware applying the [`ApiThrottle`].
pub async fn api_rate_limit(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    req: Request,
    next: Next,
) -> Response {
    if !state.throttle.check(&ip) {
        tracing::warn!(ip = %ip, "API rate limit exceeded");
        return ApiError::too_many_requests().into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, None), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_fallbacks() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, None), "198.51.100.2");

        let socket: SocketAddr = "192.0.2.4:5555".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(socket)), "192.0.2.4");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_api_throttle() {
        let throttle = ApiThrottle::new(3);
        assert!(throttle.check("127.0.0.1"));
        assert!(throttle.check("127.0.0.1"));
        assert!(throttle.check("127.0.0.1"));
        assert!(!throttle.check("127.0.0.1"));
        assert!(throttle.check("192.168.1.1"));
    }

    #[test]
    fn test_api_throttle_disabled() {
        let throttle = ApiThrottle::new(0);
        for _ in 0..1000 {
            assert!(throttle.check("127.0.0.1"));
        }
        throttle.cleanup();
    }
}
