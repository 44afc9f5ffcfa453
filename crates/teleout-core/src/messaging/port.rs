use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{MessageRef, SelfInfo, Target},
    messaging::types::InboundUpdate,
    Result,
};

/// Authorization status reported by the transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthStatus {
    pub authorized: bool,
    pub user: Option<SelfInfo>,
}

/// Outbound calls to the remote service.
///
/// Every call made during a session goes through this trait, so middleware
/// (rate limiting, flood wait) wraps an `Arc<dyn Api>` and returns another.
#[async_trait]
pub trait Api: Send + Sync {
    async fn auth_status(&self) -> Result<AuthStatus>;

    /// Complete authentication with a credential supplied by an [`AuthFlow`].
    ///
    /// [`AuthFlow`]: crate::auth::AuthFlow
    async fn sign_in(&self, credential: &str) -> Result<SelfInfo>;

    async fn get_me(&self) -> Result<SelfInfo>;

    async fn send_text(&self, target: Target, text: &str) -> Result<MessageRef>;

    async fn send_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()>;
}

/// Receives inbound updates, one method per subscribed update kind.
///
/// The transport may call these concurrently for independent sources; calls
/// for the same source are made in delivery order.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn on_new_channel_message(&self, update: InboundUpdate);

    async fn on_new_message(&self, update: InboundUpdate);

    async fn on_other(&self, _update: InboundUpdate) {}
}

/// Session lifecycle of a transport library.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the session (load the stored session blob, set up the client).
    async fn connect(&self, cancel: &CancellationToken) -> Result<()>;

    /// Raw outbound API, before any middleware.
    fn api(&self) -> Arc<dyn Api>;

    /// Deliver updates to `sink` until `cancel` fires or the connection is
    /// irrecoverably lost (returned as an error).
    ///
    /// `api` is the middleware-wrapped API; any call the transport makes on
    /// its own during the run goes through it.
    async fn run_until_canceled(
        &self,
        api: Arc<dyn Api>,
        sink: Arc<dyn UpdateSink>,
        cancel: CancellationToken,
    ) -> Result<()>;
}
