//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and account spam.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// 5 attempts, refilled at one every 3 minutes (5 per 15 minutes).
const SIGN_IN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();
const SIGN_IN_PER_HOUR: NonZeroU32 = NonZeroU32::new(20).unwrap();

/// 3 sign-ups per hour.
const SIGN_UP_PER_HOUR: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// 100 requests of any kind per 15 minutes.
const GLOBAL_BURST: NonZeroU32 = NonZeroU32::new(100).unwrap();
const GLOBAL_PER_HOUR: NonZeroU32 = NonZeroU32::new(400).unwrap();

/// Interval between prunes of idle per-IP entries.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for every request
    pub global: Arc<IpLimiter>,
    /// Per-IP limiter for sign-in
    pub sign_in: Arc<IpLimiter>,
    /// Per-IP limiter for sign-up
    pub sign_up: Arc<IpLimiter>,
    /// Key on `X-Forwarded-For` (only behind a trusted reverse proxy)
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// Create rate limiters with the default quotas.
    pub fn new(trust_proxy: bool) -> Self {
        Self::with_quotas(
            Quota::per_hour(SIGN_IN_PER_HOUR).allow_burst(SIGN_IN_BURST),
            Quota::per_hour(SIGN_UP_PER_HOUR),
            trust_proxy,
        )
    }

    /// Custom sign-in and sign-up quotas, with the default global quota.
    pub fn with_quotas(sign_in: Quota, sign_up: Quota, trust_proxy: bool) -> Self {
        Self {
            global: Arc::new(RateLimiter::keyed(
                Quota::per_hour(GLOBAL_PER_HOUR).allow_burst(GLOBAL_BURST),
            )),
            sign_in: Arc::new(RateLimiter::keyed(sign_in)),
            sign_up: Arc::new(RateLimiter::keyed(sign_up)),
            trust_proxy,
        }
    }

    /// Drop per-IP entries whose bucket has fully refilled.
    pub fn retain_recent(&self) {
        for limiter in [&self.global, &self.sign_in, &self.sign_up] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Spawn a background task that prunes the limiters periodically.
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_scheduler(&self) -> tokio::task::JoinHandle<()> {
        let limits = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limits.retain_recent();
                debug!(
                    tracked_ips = limits.global.len(),
                    "Pruned rate limiter state"
                );
            }
        })
    }
}

fn check(
    limiter: &IpLimiter,
    request: &Request,
    trust_proxy: bool,
    message: &str,
) -> Result<(), Response> {
    let Some(ip) = extract_client_ip(request, trust_proxy) else {
        warn!("Unable to determine client IP for rate limiting");
        return Err(ApiError::forbidden("Unable to determine client IP.").into_response());
    };

    limiter.check_key(&ip).map_err(|_| {
        warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
        ApiError::TooManyRequests(message.to_string()).into_response()
    })
}

/// Middleware for the global per-IP limit.
pub async fn rate_limit_global(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.global,
        &request,
        config.trust_proxy,
        "Please try again later",
    ) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

/// Middleware for rate limiting sign-in.
pub async fn rate_limit_sign_in(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.sign_in,
        &request,
        config.trust_proxy,
        "Too many login attempts. Please try again after 15 minutes",
    ) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

/// Middleware for rate limiting sign-up.
pub async fn rate_limit_sign_up(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.sign_up,
        &request,
        config.trust_proxy,
        "Too many accounts created. Please try again after an hour",
    ) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}
