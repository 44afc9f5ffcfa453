use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::{
    domain::{MessageRef, SelfInfo, Target},
    messaging::port::{Api, AuthStatus},
    middleware::Middleware,
    Result,
};

/// Turns flood signals from the remote service into a shared cooldown.
///
/// A failed call is not retried: the caller gets the original error back and
/// decides. What the waiter guarantees is that no call it wraps starts before
/// the longest cooldown seen so far has elapsed.
#[derive(Debug, Default)]
pub struct FloodWaiter {
    until: Mutex<Option<Instant>>,
}

impl FloodWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `call`, waiting out any pending cooldown first.
    pub async fn call<T, F, Fut>(&self, method: &'static str, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.wait().await;

        let res = call().await;
        if let Err(e) = &res {
            if let Some(wait) = e.flood_wait() {
                self.extend(method, wait).await;
            }
        }
        res
    }

    /// Deadline of the pending cooldown, if any.
    pub async fn pending_until(&self) -> Option<Instant> {
        let until = *self.until.lock().await;
        until.filter(|t| *t > Instant::now())
    }

    async fn wait(&self) {
        // Another flood signal may push the deadline while we sleep.
        while let Some(deadline) = self.pending_until().await {
            sleep_until(deadline).await;
        }
    }

    async fn extend(&self, method: &'static str, wait: Duration) {
        let deadline = Instant::now() + wait;
        let mut until = self.until.lock().await;
        if until.map(|t| t >= deadline).unwrap_or(false) {
            tracing::debug!(
                status = "flood.waiting.shorter",
                method,
                wait_ms = wait.as_millis() as u64,
            );
            return;
        }
        *until = Some(deadline);
        tracing::warn!(
            status = "flood.waiting",
            method,
            wait_ms = wait.as_millis() as u64,
        );
    }
}

/// Middleware routing every call through a shared [`FloodWaiter`].
#[derive(Clone, Debug)]
pub struct FloodWait {
    waiter: Arc<FloodWaiter>,
}

impl FloodWait {
    pub fn new(waiter: Arc<FloodWaiter>) -> Self {
        Self { waiter }
    }
}

impl Middleware for FloodWait {
    fn name(&self) -> &'static str {
        "floodwait"
    }

    fn wrap(&self, next: Arc<dyn Api>) -> Arc<dyn Api> {
        Arc::new(FloodWaitedApi {
            inner: next,
            waiter: self.waiter.clone(),
        })
    }
}

struct FloodWaitedApi {
    inner: Arc<dyn Api>,
    waiter: Arc<FloodWaiter>,
}

#[async_trait]
impl Api for FloodWaitedApi {
    async fn auth_status(&self) -> Result<AuthStatus> {
        self.waiter
            .call("auth.status", || self.inner.auth_status())
            .await
    }

    async fn sign_in(&self, credential: &str) -> Result<SelfInfo> {
        self.waiter
            .call("auth.signIn", || self.inner.sign_in(credential))
            .await
    }

    async fn get_me(&self) -> Result<SelfInfo> {
        self.waiter.call("getMe", || self.inner.get_me()).await
    }

    async fn send_text(&self, target: Target, text: &str) -> Result<MessageRef> {
        self.waiter
            .call("sendMessage", || self.inner.send_text(target, text))
            .await
    }

    async fn send_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()> {
        self.waiter
            .call("setMessageReaction", || self.inner.send_reaction(msg, emoji))
            .await
    }
}
