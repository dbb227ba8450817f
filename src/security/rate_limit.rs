//! Fixed-window rate limiting middleware.
//!
//! # Responsibilities
//! - Count requests per client key within a time window
//! - Reject (never queue) requests over quota with 429
//! - Advertise quota state via `x-ratelimit-*` headers
//!
//! # Design Decisions
//! - Counters live behind the [`CounterStore`] trait and are injected per limiter
//! - A window opens on a key's first hit and clears once it has elapsed
//! - Rejected requests still count against the window

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::LimitRule;
use crate::http::response::ApiError;
use crate::observability::metrics;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Key shared by requests whose peer address is unknown.
const UNKNOWN_CLIENT: &str = "unknown";

/// Prune expired windows once every this many hits.
const PRUNE_EVERY: u64 = 1024;

/// State of a key's window after recording a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Hits in the current window, including this one.
    pub count: u32,
    /// When the current window closes.
    pub reset_at: Instant,
}

/// Storage for per-key window counters.
pub trait CounterStore: Send + Sync {
    /// Record one hit for `key` at `now` and return the window state.
    fn hit(&self, key: &str, window: Duration, now: Instant) -> WindowHit;

    /// Forget all hits for `key`.
    fn reset(&self, key: &str);
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// In-process counters.
#[derive(Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, Window>,
    hits: AtomicU64,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    fn prune(&self, now: Instant) {
        self.windows.retain(|_, window| window.reset_at > now);
    }
}

impl CounterStore for MemoryCounterStore {
    fn hit(&self, key: &str, window: Duration, now: Instant) -> WindowHit {
        let hit = {
            let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
                count: 0,
                reset_at: now + window,
            });

            if now >= entry.reset_at {
                entry.count = 0;
                entry.reset_at = now + window;
            }
            entry.count = entry.count.saturating_add(1);

            WindowHit {
                count: entry.count,
                reset_at: entry.reset_at,
            }
        };

        if self.hits.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune(now);
        }

        hit
    }

    fn reset(&self, key: &str) {
        self.windows.remove(key);
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the window closes.
    pub reset_after: Duration,
}

impl RateDecision {
    /// Whole seconds until reset, rounded up.
    pub fn reset_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// Add the `x-ratelimit-*` headers unless an inner limiter already set them.
    pub fn write_headers(&self, headers: &mut HeaderMap) {
        headers
            .entry(X_RATELIMIT_LIMIT)
            .or_insert_with(|| HeaderValue::from(self.limit));
        headers
            .entry(X_RATELIMIT_REMAINING)
            .or_insert_with(|| HeaderValue::from(self.remaining));
        headers
            .entry(X_RATELIMIT_RESET)
            .or_insert_with(|| HeaderValue::from(self.reset_secs()));
    }

    /// The 429 sent for a rejected request.
    pub fn rejection(&self) -> Response {
        let mut response = ApiError::RateLimited {
            retry_after_secs: self.reset_secs(),
        }
        .into_response();
        self.write_headers(response.headers_mut());
        response
    }
}

/// A named quota backed by a [`CounterStore`].
pub struct RateLimiter {
    name: &'static str,
    max: u32,
    window: Duration,
    trust_proxy: bool,
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(name: &'static str, rule: LimitRule, store: Arc<dyn CounterStore>) -> Self {
        Self {
            name,
            max: rule.max,
            window: Duration::from_secs(rule.window_secs),
            trust_proxy: false,
            store,
        }
    }

    /// Key clients by the first `X-Forwarded-For` entry when present.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    /// Record a request from `client` and decide whether it may proceed.
    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let key = format!("{}:{}", self.name, client);
        let hit = self.store.hit(&key, self.window, now);

        RateDecision {
            allowed: hit.count <= self.max,
            limit: self.max,
            remaining: self.max.saturating_sub(hit.count),
            reset_after: hit.reset_at.saturating_duration_since(now),
        }
    }

    /// [`check`](Self::check), logging and counting rejections.
    pub fn admit(&self, client: &str) -> RateDecision {
        let decision = self.check(client);
        if !decision.allowed {
            tracing::warn!(
                client = %client,
                limiter = self.name,
                limit = decision.limit,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(self.name);
        }
        decision
    }

    /// Identify the client behind a request.
    pub fn client_key<B>(&self, request: &Request<B>) -> String {
        if self.trust_proxy {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(client) = forwarded {
                return client.to_string();
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

/// Middleware enforcing one [`RateLimiter`].
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = limiter.admit(&limiter.client_key(&request));
    if !decision.allowed {
        return decision.rejection();
    }

    let mut response = next.run(request).await;
    decision.write_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(
            "test",
            LimitRule { max, window_secs },
            Arc::new(MemoryCounterStore::new()),
        )
    }

    #[test]
    fn test_rejects_over_quota() {
        let limiter = limiter(5, 60);
        let now = Instant::now();

        for i in 0..5 {
            let decision = limiter.check_at("10.0.0.1", now);
            assert!(decision.allowed, "request {} should pass", i + 1);
            assert_eq!(decision.remaining, 4 - i);
        }

        let sixth = limiter.check_at("10.0.0.1", now);
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
        assert_eq!(sixth.reset_secs(), 60);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(1, 60);
        let now = Instant::now();

        assert!(limiter.check_at("10.0.0.1", now).allowed);
        assert!(!limiter.check_at("10.0.0.1", now).allowed);
        assert!(limiter.check_at("10.0.0.2", now).allowed);
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1, 60);
        let start = Instant::now();

        assert!(limiter.check_at("10.0.0.1", start).allowed);
        assert!(!limiter.check_at("10.0.0.1", start + Duration::from_secs(59)).allowed);

        let later = limiter.check_at("10.0.0.1", start + Duration::from_secs(60));
        assert!(later.allowed);
        assert_eq!(later.reset_secs(), 60);
    }

    #[test]
    fn test_shared_store_keeps_limiters_apart() {
        let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
        let global = RateLimiter::new("global", LimitRule { max: 5, window_secs: 60 }, store.clone());
        let write = RateLimiter::new("write", LimitRule { max: 1, window_secs: 60 }, store.clone());
        let now = Instant::now();

        assert!(write.check_at("c", now).allowed);
        assert!(global.check_at("c", now).allowed);
        assert_eq!(global.check_at("c", now).remaining, 3);
        assert!(!write.check_at("c", now).allowed);

        store.reset("write:c");
        assert!(write.check_at("c", now).allowed);
    }

    #[test]
    fn test_expired_windows_are_pruned() {
        let store = MemoryCounterStore::new();
        let start = Instant::now();
        let window = Duration::from_secs(1);

        store.hit("old", window, start);
        let later = start + Duration::from_secs(5);
        for _ in 0..PRUNE_EVERY {
            store.hit("fresh", window, later);
        }

        assert_eq!(store.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn test_rejection_response() {
        let limiter = limiter(1, 60);
        assert!(limiter.admit("c").allowed);

        let decision = limiter.admit("c");
        assert!(!decision.allowed);
        let response = decision.rejection();
        assert_eq!(response.status(), axum::http::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[X_RATELIMIT_LIMIT], "1");
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "0");
        assert_eq!(response.headers()["retry-after"], "60");
    }

    #[test]
    fn test_client_key_sources() {
        let limiter = limiter(1, 60);
        let addr: SocketAddr = "192.0.2.7:5555".parse().unwrap();

        let mut request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(limiter.client_key(&request), "unknown");

        request.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(limiter.client_key(&request), "192.0.2.7");

        let proxied = limiter.trust_proxy(true);
        assert_eq!(proxied.client_key(&request), "203.0.113.9");
    }
}
