//! Outbound-call middleware.
//!
//! A middleware wraps an [`Api`] and returns another one. [`chain`] composes
//! a list so that the first entry is the outermost layer: with
//! `[RateLimit, FloodWait]` a call first waits for a token, then for any
//! flood cooldown, then reaches the transport.

use std::sync::Arc;

use crate::messaging::port::Api;

pub mod floodwait;
pub mod ratelimit;

pub use floodwait::{FloodWait, FloodWaiter};
pub use ratelimit::{RateBudget, RateLimit, RateLimiter};

pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn wrap(&self, next: Arc<dyn Api>) -> Arc<dyn Api>;
}

/// Wrap `api` in `middlewares`, first entry outermost.
pub fn chain(api: Arc<dyn Api>, middlewares: &[Arc<dyn Middleware>]) -> Arc<dyn Api> {
    middlewares
        .iter()
        .rev()
        .fold(api, |next, mw| {
            tracing::debug!(status = "middleware.installed", name = mw.name());
            mw.wrap(next)
        })
}
