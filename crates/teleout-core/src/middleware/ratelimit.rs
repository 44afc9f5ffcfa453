use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{MessageRef, SelfInfo, Target},
    messaging::port::{Api, AuthStatus},
    middleware::Middleware,
    Result,
};

/// Token bucket refill configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateBudget {
    /// One token is added per interval.
    pub interval: Duration,
    /// Bucket capacity.
    pub burst: u32,
}

impl Default for RateBudget {
    fn default() -> Self {
        // 10 requests/sec with a burst of 5.
        Self {
            interval: Duration::from_millis(100),
            burst: 5,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_update: Instant,
}

/// Token-bucket gate shared by every outbound call of one client.
///
/// Callers reserve a token under the lock (the balance may go negative) and
/// then sleep off the debt outside of it, so a token is never handed out twice.
/// A caller that gives up while waiting hands its token back.
#[derive(Debug)]
pub struct RateLimiter {
    budget: RateBudget,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(budget: RateBudget) -> Self {
        Self::new_at(budget, Instant::now())
    }

    fn new_at(budget: RateBudget, now: Instant) -> Self {
        Self {
            budget: RateBudget {
                interval: budget.interval.max(Duration::from_nanos(1)),
                burst: budget.burst.max(1),
            },
            bucket: Mutex::new(Bucket {
                tokens: budget.burst.max(1) as f64,
                last_update: now,
            }),
        }
    }

    /// Wait until a token is available and consume it.
    ///
    /// Dropping the future before the wait ends refunds the token.
    pub async fn acquire(&self) {
        let wait = self.reserve_at(Instant::now());
        if wait.is_zero() {
            return;
        }
        let refund = Refund { limiter: self };
        sleep(wait).await;
        std::mem::forget(refund);
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve the next token and return how long the caller must wait
    /// before using it.
    fn reserve_at(&self, now: Instant) -> Duration {
        let mut bucket = self.lock();
        let interval = self.budget.interval.as_secs_f64();

        let elapsed = now.saturating_duration_since(bucket.last_update).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed / interval).min(self.budget.burst as f64);
        bucket.last_update = now.max(bucket.last_update);
        bucket.tokens -= 1.0;

        if bucket.tokens >= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(-bucket.tokens * interval)
    }

    fn refund(&self) {
        let mut bucket = self.lock();
        bucket.tokens = (bucket.tokens + 1.0).min(self.budget.burst as f64);
        tracing::trace!(status = "ratelimit.refunded", tokens = bucket.tokens);
    }
}

// Armed while a reserved token is being waited for.
struct Refund<'a> {
    limiter: &'a RateLimiter,
}

impl Drop for Refund<'_> {
    fn drop(&mut self) {
        self.limiter.refund();
    }
}

/// Middleware gating every call on a shared [`RateLimiter`].
#[derive(Clone, Debug)]
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl Middleware for RateLimit {
    fn name(&self) -> &'static str {
        "ratelimit"
    }

    fn wrap(&self, next: Arc<dyn Api>) -> Arc<dyn Api> {
        Arc::new(RateLimitedApi {
            inner: next,
            limiter: self.limiter.clone(),
        })
    }
}

struct RateLimitedApi {
    inner: Arc<dyn Api>,
    limiter: Arc<RateLimiter>,
}

#[async_trait]
impl Api for RateLimitedApi {
    async fn auth_status(&self) -> Result<AuthStatus> {
        self.limiter.acquire().await;
        self.inner.auth_status().await
    }

    async fn sign_in(&self, credential: &str) -> Result<SelfInfo> {
        self.limiter.acquire().await;
        self.inner.sign_in(credential).await
    }

    async fn get_me(&self) -> Result<SelfInfo> {
        self.limiter.acquire().await;
        self.inner.get_me().await
    }

    async fn send_text(&self, target: Target, text: &str) -> Result<MessageRef> {
        self.limiter.acquire().await;
        self.inner.send_text(target, text).await
    }

    async fn send_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()> {
        self.limiter.acquire().await;
        self.inner.send_reaction(msg, emoji).await
    }
}
