//! Failed-request rate limiting.
//!
//! Each client gets a fixed window; only responses with a 4xx or 5xx status
//! count towards the limit, so normal traffic is never throttled. Once the
//! limit is reached further requests get 429 until the window ends.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::RateLimitSettings;
use crate::shared::AppError;

#[derive(Debug, Clone, Copy)]
struct FailureWindow {
    started: Instant,
    failures: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, FailureWindow>>>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            settings,
        }
    }

    /// Time left until the client may retry, if it is currently blocked
    pub async fn blocked_for(&self, key: &str) -> Option<Duration> {
        let windows = self.windows.read().await;
        let window = windows.get(key)?;
        let elapsed = window.started.elapsed();

        if elapsed >= self.settings.window || window.failures < self.settings.max_failures {
            return None;
        }
        Some(self.settings.window - elapsed)
    }

    pub async fn record_failure(&self, key: &str) {
        let mut windows = self.windows.write().await;
        let now = Instant::now();

        let window = windows.entry(key.to_string()).or_insert(FailureWindow {
            started: now,
            failures: 0,
        });
        if now.duration_since(window.started) >= self.settings.window {
            *window = FailureWindow {
                started: now,
                failures: 0,
            };
        }
        window.failures += 1;

        debug!(client = %key, failures = window.failures, "Recorded failed request");
    }

    /// Drops windows that have already ended
    pub async fn cleanup(&self) {
        let window_length = self.settings.window;
        self.windows
            .write()
            .await
            .retain(|_, window| window.started.elapsed() < window_length);
    }
}

/// Use with `middleware::from_fn_with_state(rate_limiter, limit_failed_requests)`
pub async fn limit_failed_requests(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);

    if let Some(retry_after) = limiter.blocked_for(&client).await {
        warn!(client = %client, "Rate limit exceeded");
        let mut response = AppError::TooManyRequests(
            "Too many requests from this IP, please try again later.".to_string(),
        )
        .into_response();
        let seconds = retry_after.as_secs().max(1);
        if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        return response;
    }

    let response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        limiter.record_failure(&client).await;
    }
    response
}

/// Client identity: first proxy hop, then the socket address
fn client_key(request: &Request) -> String {
    let headers = request.headers();

    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        return ip.trim().to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
