//! Per-client rate limiting, token-bucket keyed by source IP (§4.8 step 2,
//! §5 "token-bucket state: per-client map with periodic eviction").

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use dashmap::DashMap;
use governor::{clock::DefaultClock, state::{InMemoryState, NotKeyed}, Quota, RateLimiter};
use tower::{Layer, Service};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_minute: 600, enabled: true }
    }
}

struct Bucket {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    last_access: Instant,
}

pub struct RateLimitState {
    buckets: DashMap<IpAddr, Bucket>,
    config: RateLimitConfig,
}

impl RateLimitState {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { buckets: DashMap::new(), config }
    }

    fn quota(&self) -> Quota {
        Quota::per_minute(NonZeroU32::new(self.config.requests_per_minute).unwrap_or(NonZeroU32::new(600).unwrap()))
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        if !self.config.enabled {
            return Ok(());
        }
        let quota = self.quota();
        let mut bucket = self.buckets.entry(ip).or_insert_with(|| Bucket {
            limiter: RateLimiter::direct(quota),
            last_access: Instant::now(),
        });
        bucket.last_access = Instant::now();
        bucket.limiter.check().map_err(|not_until| {
            not_until.wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
        })
    }

    pub fn sweep_idle(&self, max_age: Duration) {
        let now = Instant::now();
        self.buckets.retain(|_, bucket| now.duration_since(bucket.last_access) <= max_age);
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
}

impl RateLimitLayer {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { state: Arc::new(RateLimitState::new(config)) }
    }

    #[must_use]
    pub fn state(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.state)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService { inner, state: Arc::clone(&self.state) }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let ip = client_ip(&req);
            match state.check(ip) {
                Ok(()) => inner.call(req).await,
                Err(retry_after) => Ok(rate_limited_response(retry_after)),
            }
        })
    }
}

fn client_ip<B>(req: &Request<B>) -> IpAddr {
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(s) = forwarded.to_str() {
            if let Some(first) = s.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip();
    }
    IpAddr::from([127, 0, 0, 1])
}

fn rate_limited_response(retry_after: Duration) -> Response {
    let retry_secs = retry_after.as_secs().max(1);
    let body = serde_json::json!({
        "error": {
            "code": "RateLimit",
            "message": "rate limit exceeded",
            "details": null,
            "timestamp": chrono::Utc::now(),
        }
    });
    let mut response = Response::new(Body::from(serde_json::to_vec(&body).unwrap_or_default()));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response.headers_mut().insert("content-type", "application/json".parse().unwrap());
    response.headers_mut().insert("retry-after", retry_secs.to_string().parse().unwrap());
    response.headers_mut().insert("x-ratelimit-limit-reset", retry_secs.to_string().parse().unwrap());
    response
}

/// Periodically drops idle buckets so the map does not grow unbounded
/// over the coordinator's lifetime.
pub async fn sweep_task(state: Arc<RateLimitState>, interval: Duration, max_age: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        state.sweep_idle(max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn allows_within_budget() {
        let state = RateLimitState::new(RateLimitConfig { requests_per_minute: 60, enabled: true });
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert!(state.check(ip).is_ok());
    }

    #[test]
    fn blocks_over_budget() {
        let state = RateLimitState::new(RateLimitConfig { requests_per_minute: 1, enabled: true });
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(state.check(ip).is_ok());
        assert!(state.check(ip).is_err());
    }

    #[test]
    fn disabled_always_allows() {
        let state = RateLimitState::new(RateLimitConfig { requests_per_minute: 1, enabled: false });
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3));
        for _ in 0..10 {
            assert!(state.check(ip).is_ok());
        }
    }
}
