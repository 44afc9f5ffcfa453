//! Orchestrator: wires middleware, authentication and routing around a
//! [`Transport`] and runs the session.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::{AuthFlow, SessionAuthenticator},
    commands::{default_table, SpamReactor},
    config::Config,
    messaging::{
        port::{Api, Transport, UpdateSink},
        types::{InboundUpdate, UpdateKind},
    },
    middleware::{self, FloodWait, FloodWaiter, Middleware, RateLimit, RateLimiter},
    router::{CommandRouter, CommandTable, MessageHook},
    Result,
};

/// Feeds subscribed updates to the router; per-update errors are logged and
/// never stop the session.
pub struct EventLoop {
    router: CommandRouter,
    cancel: CancellationToken,
}

impl EventLoop {
    pub fn new(router: CommandRouter, cancel: CancellationToken) -> Self {
        Self { router, cancel }
    }

    async fn process(&self, update: InboundUpdate) {
        if self.cancel.is_cancelled() {
            tracing::debug!(status = "update.skipped.canceled", kind = update.kind().as_str());
            return;
        }

        match self.router.dispatch(&update, &self.cancel).await {
            Ok(()) => {}
            Err(e) if e.is_bad_update() => {
                tracing::warn!(
                    status = "bad.update",
                    kind = update.kind().as_str(),
                    update = ?update,
                );
            }
            Err(e) => {
                tracing::error!(
                    status = "error.while.processing.request",
                    kind = update.kind().as_str(),
                    error = %e,
                    source = ?std::error::Error::source(&e),
                );
            }
        }
    }
}

#[async_trait]
impl UpdateSink for EventLoop {
    async fn on_new_channel_message(&self, update: InboundUpdate) {
        self.process(update).await
    }

    async fn on_new_message(&self, update: InboundUpdate) {
        self.process(update).await
    }

    async fn on_other(&self, update: InboundUpdate) {
        tracing::trace!(status = "update.ignored", kind = UpdateKind::Other.as_str(), update = ?update);
    }
}

pub struct Presentation {
    transport: Arc<dyn Transport>,
    flow: Arc<dyn AuthFlow>,
    api: Arc<dyn Api>,
    commands: Arc<CommandTable>,
    hooks: Vec<Arc<dyn MessageHook>>,
}

impl Presentation {
    /// Default wiring: rate limit from `cfg`, flood wait, built-in commands.
    pub fn new(cfg: &Config, transport: Arc<dyn Transport>, flow: Arc<dyn AuthFlow>) -> Self {
        let middlewares: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(RateLimit::new(Arc::new(RateLimiter::new(cfg.rate_budget)))),
            Arc::new(FloodWait::new(Arc::new(FloodWaiter::new()))),
        ];
        let reactor = Arc::new(SpamReactor::new());
        let hooks: Vec<Arc<dyn MessageHook>> = vec![reactor.clone()];

        Self::with_parts(transport, flow, &middlewares, default_table(reactor), hooks)
    }

    pub fn with_parts(
        transport: Arc<dyn Transport>,
        flow: Arc<dyn AuthFlow>,
        middlewares: &[Arc<dyn Middleware>],
        commands: CommandTable,
        hooks: Vec<Arc<dyn MessageHook>>,
    ) -> Self {
        let api = middleware::chain(transport.api(), middlewares);
        Self {
            transport,
            flow,
            api,
            commands: Arc::new(commands),
            hooks,
        }
    }

    /// Connect, authenticate, subscribe, then block until `cancel` fires or
    /// the transport fails. Only authentication and transport errors end up
    /// here.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.transport.connect(&cancel).await?;
        tracing::info!(status = "connected");

        let me = SessionAuthenticator::new()
            .run(self.api.as_ref(), self.flow.as_ref(), &cancel)
            .await?;

        let mut router = CommandRouter::new(self.api.clone(), self.commands.clone());
        for hook in &self.hooks {
            router = router.with_hook(hook.clone());
        }
        let sink: Arc<dyn UpdateSink> = Arc::new(EventLoop::new(router, cancel.clone()));

        tracing::info!(
            status = "listening",
            user = %me,
            commands = self.commands.len(),
        );
        let res = self
            .transport
            .run_until_canceled(self.api.clone(), sink, cancel)
            .await;
        match &res {
            Ok(()) => tracing::info!(status = "stopped"),
            Err(e) => tracing::error!(status = "transport.failed", error = %e),
        }
        res
    }
}
