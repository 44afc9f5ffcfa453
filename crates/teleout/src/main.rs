use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use teleout_core::{
    auth::{AuthFlow, StoredCredential, TerminalAuth},
    config::Config,
    presentation::Presentation,
    session::FileSessionStorage,
    Error,
};
use teleout_telegram::TelegramTransport;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cfg = Config::load()?;
    teleout_core::logging::init("teleout", &cfg.log_level)?;
    cfg.ensure_storage_dir()?;

    let transport = Arc::new(TelegramTransport::new(
        FileSessionStorage::new(&cfg.session_file),
        cfg.self_chat_id,
    ));
    let flow: Arc<dyn AuthFlow> = match &cfg.bot_token {
        Some(token) => Arc::new(StoredCredential::new(token.clone())),
        None => Arc::new(TerminalAuth::default()),
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!(status = "shutdown.requested");
                    cancel.cancel();
                }
                Err(e) => tracing::warn!(status = "signal.unavailable", error = %e),
            }
        }
    });

    tracing::info!(
        status = "starting",
        storage = %cfg.storage_dir.display(),
        rate_interval_ms = cfg.rate_budget.interval.as_millis() as u64,
        rate_burst = cfg.rate_budget.burst,
    );

    let presentation = Presentation::new(&cfg, transport, flow);
    match presentation.run(cancel.clone()).await {
        Ok(()) => Ok(()),
        // Interrupted before the session was up.
        Err(Error::Canceled) => Ok(()),
        Err(Error::Auth(inner)) if cancel.is_cancelled() && matches!(*inner, Error::Canceled) => {
            Ok(())
        }
        Err(e) => Err(e),
    }
}
