//! Per-IP rate limiting for `/api/*`.

use crate::api::AppState;
use crate::error::ApiError;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use conclave_types::ErrorCode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

/// Tokens per window.
pub const RATE_LIMIT_MAX: u32 = 500;

/// Window length.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket per client IP: 500 requests per 15-minute window,
/// refilled continuously.
#[derive(Default)]
pub struct IpRateLimiter {
    buckets: Mutex<HashMap<IpAddr, Bucket>>,
}

impl IpRateLimiter {
    /// Creates an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tries to take one token for an IP.
    pub fn try_acquire(&self, ip: IpAddr) -> bool {
        let refill_per_sec = RATE_LIMIT_MAX as f64 / RATE_LIMIT_WINDOW.as_secs_f64();
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(ip).or_insert_with(|| Bucket {
            tokens: RATE_LIMIT_MAX as f64,
            last_refill: Instant::now(),
        });

        let elapsed = bucket.last_refill.elapsed().as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * refill_per_sec).min(RATE_LIMIT_MAX as f64);
        bucket.last_refill = Instant::now();

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Remaining whole tokens for an IP.
    pub fn remaining(&self, ip: IpAddr) -> u32 {
        self.buckets
            .lock()
            .get(&ip)
            .map(|b| b.tokens as u32)
            .unwrap_or(RATE_LIMIT_MAX)
    }

    /// Drops buckets that have fully refilled, to bound memory.
    pub fn cleanup(&self) {
        let mut buckets = self.buckets.lock();
        buckets.retain(|_, b| {
            (b.tokens as u32) < RATE_LIMIT_MAX
                || b.last_refill.elapsed() < RATE_LIMIT_WINDOW
        });
    }
}

/// Enforces the per-IP bucket on `/api/*`.
///
/// GET requests (status polls, streams, inspection) are exempt; in test
/// mode the limiter is disabled entirely.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.environment.is_test() || request.method() == Method::GET {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(&request);
    if !state.rate_limiter.try_acquire(ip) {
        tracing::warn!(ip = %ip, "Rate limit exceeded");
        return Err(ApiError::new(
            ErrorCode::RateLimited,
            "Too many requests, retry later",
        ));
    }
    Ok(next.run(request).await)
}

/// Best-effort client IP: `x-forwarded-for` first, then the socket peer.
fn client_ip(request: &Request) -> IpAddr {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
    {
        return forwarded;
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
