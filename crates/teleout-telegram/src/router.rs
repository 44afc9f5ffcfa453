use std::{sync::Arc, time::Duration};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;

use teleout_core::{
    messaging::{
        port::{Api, UpdateSink},
        types::InboundUpdate,
    },
    Result,
};

use crate::convert;

/// Long-poll updates and hand them to `sink` until `cancel` fires.
///
/// Updates are processed concurrently across chats and in order within a
/// chat. `api` is the rate- and flood-controlled API used for the
/// connection check.
pub async fn run_polling(
    bot: Bot,
    api: Arc<dyn Api>,
    sink: Arc<dyn UpdateSink>,
    cancel: CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Ok(());
    }

    // The dispatcher panics when it cannot fetch its own identity, so check
    // the connection first and report a failure as an error instead.
    let me = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        me = api.get_me() => me?,
    };
    tracing::debug!(status = "polling.starting", user = %me);

    let handler = dptree::entry()
        .branch(Update::filter_channel_post().endpoint(handle_channel_post))
        .branch(Update::filter_message().endpoint(handle_message));

    let fallback = sink.clone();
    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![sink])
        .default_handler(move |upd: Arc<Update>| {
            let sink = fallback.clone();
            async move {
                let kind = convert::update_kind(&upd.kind).to_string();
                sink.on_other(InboundUpdate::Other { kind }).await;
            }
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "telegram update handler failed",
        ))
        .build();

    let shutdown = dispatcher.shutdown_token();
    let watcher = tokio::spawn(async move {
        cancel.cancelled().await;
        loop {
            match shutdown.shutdown() {
                Ok(stopped) => {
                    stopped.await;
                    return;
                }
                // Not running yet.
                Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    });

    tracing::debug!(status = "polling.started");
    dispatcher.dispatch().await;
    watcher.abort();
    tracing::debug!(status = "polling.stopped");

    Ok(())
}

async fn handle_channel_post(msg: Message, sink: Arc<dyn UpdateSink>) -> ResponseResult<()> {
    deliver(sink.as_ref(), convert::inbound(&msg, true)).await;
    Ok(())
}

async fn handle_message(msg: Message, sink: Arc<dyn UpdateSink>) -> ResponseResult<()> {
    deliver(sink.as_ref(), convert::inbound(&msg, false)).await;
    Ok(())
}

async fn deliver(sink: &dyn UpdateSink, update: InboundUpdate) {
    match update {
        update @ InboundUpdate::NewChannelMessage(_) => sink.on_new_channel_message(update).await,
        update @ InboundUpdate::NewMessage(_) => sink.on_new_message(update).await,
        update @ InboundUpdate::Other { .. } => sink.on_other(update).await,
    }
}
