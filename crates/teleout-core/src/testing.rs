//! In-memory fakes for the transport ports, plus a log capture.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::writer::MakeWriter;

use crate::{
    domain::{ChatId, MessageId, MessageRef, SelfInfo, Target, UserId},
    errors::Error,
    messaging::{
        port::{Api, AuthStatus, Transport, UpdateSink},
        types::{
            ChatInfo, ChatKind, Entities, Envelope, InboundUpdate, Message, Payload, UserInfo,
        },
    },
    Result,
};

pub fn me() -> SelfInfo {
    SelfInfo {
        id: UserId(777),
        username: Some("teleout_bot".to_string()),
        first_name: "Teleout".to_string(),
        is_bot: true,
    }
}

#[derive(Default)]
pub struct FakeApi {
    authorized: AtomicBool,
    accepted_credential: Mutex<Option<String>>,
    status_error: AtomicBool,
    fail_self_send: AtomicBool,
    fail_sends: Mutex<Vec<Error>>,
    sign_in_calls: AtomicUsize,
    sent: Mutex<Vec<(Target, String)>>,
    reactions: Mutex<Vec<(MessageRef, String)>>,
    next_id: AtomicUsize,
}

impl FakeApi {
    pub fn authorized() -> Self {
        let api = Self::default();
        api.authorized.store(true, Ordering::SeqCst);
        api
    }

    /// Not authorized; `sign_in` succeeds only with `credential`.
    pub fn unauthorized(credential: &str) -> Self {
        let api = Self::default();
        *api.accepted_credential.lock().unwrap() = Some(credential.to_string());
        api
    }

    pub fn fail_status(self) -> Self {
        self.status_error.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_self_send(self) -> Self {
        self.fail_self_send.store(true, Ordering::SeqCst);
        self
    }

    /// Queue an error returned by the next `send_text` calls, in order.
    pub fn fail_next_send(&self, err: Error) {
        self.fail_sends.lock().unwrap().push(err);
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn sent_texts(&self) -> Vec<(Target, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn reactions(&self) -> Vec<(MessageRef, String)> {
        self.reactions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Api for FakeApi {
    async fn auth_status(&self) -> Result<AuthStatus> {
        if self.status_error.load(Ordering::SeqCst) {
            return Err(Error::Transport("status unavailable".to_string()));
        }
        let authorized = self.authorized.load(Ordering::SeqCst);
        Ok(AuthStatus {
            authorized,
            user: authorized.then(me),
        })
    }

    async fn sign_in(&self, credential: &str) -> Result<SelfInfo> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let accepted = self.accepted_credential.lock().unwrap().clone();
        if accepted.as_deref() != Some(credential) {
            return Err(Error::Transport("invalid credential".to_string()));
        }
        self.authorized.store(true, Ordering::SeqCst);
        Ok(me())
    }

    async fn get_me(&self) -> Result<SelfInfo> {
        if !self.authorized.load(Ordering::SeqCst) {
            return Err(Error::Transport("unauthorized".to_string()));
        }
        Ok(me())
    }

    async fn send_text(&self, target: Target, text: &str) -> Result<MessageRef> {
        if target == Target::SelfChat && self.fail_self_send.load(Ordering::SeqCst) {
            return Err(Error::Transport("self chat unavailable".to_string()));
        }
        {
            let mut fails = self.fail_sends.lock().unwrap();
            if !fails.is_empty() {
                return Err(fails.remove(0));
            }
        }
        self.sent.lock().unwrap().push((target, text.to_string()));
        let chat_id = match target {
            Target::SelfChat => ChatId(me().id.0),
            Target::Chat(c) => c,
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i32 + 1;
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(id),
        })
    }

    async fn send_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()> {
        self.reactions
            .lock()
            .unwrap()
            .push((msg, emoji.to_string()));
        Ok(())
    }
}

/// Checks the connection, delivers a fixed list of updates, then cancels the
/// run token itself.
pub struct FakeTransport {
    api: Arc<FakeApi>,
    updates: Mutex<Vec<InboundUpdate>>,
    fatal: Mutex<Option<String>>,
    connected: AtomicBool,
}

impl FakeTransport {
    pub fn new(api: Arc<FakeApi>, updates: Vec<InboundUpdate>) -> Self {
        Self {
            api,
            updates: Mutex::new(updates),
            fatal: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Drop the connection after delivering the updates.
    pub fn fail_after_updates(self, reason: &str) -> Self {
        *self.fatal.lock().unwrap() = Some(reason.to_string());
        self
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self, _cancel: &CancellationToken) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn api(&self) -> Arc<dyn Api> {
        self.api.clone()
    }

    async fn run_until_canceled(
        &self,
        api: Arc<dyn Api>,
        sink: Arc<dyn UpdateSink>,
        cancel: CancellationToken,
    ) -> Result<()> {
        // Like the real transport, check the connection before listening.
        api.get_me().await?;

        let updates = std::mem::take(&mut *self.updates.lock().unwrap());
        for update in updates {
            match &update {
                InboundUpdate::NewChannelMessage(_) => sink.on_new_channel_message(update).await,
                InboundUpdate::NewMessage(_) => sink.on_new_message(update).await,
                InboundUpdate::Other { .. } => sink.on_other(update).await,
            }
        }

        let fatal = self.fatal.lock().unwrap().take();
        if let Some(reason) = fatal {
            return Err(Error::Transport(reason));
        }

        cancel.cancel();
        cancel.cancelled().await;
        Ok(())
    }
}

pub fn user(id: i64) -> UserInfo {
    UserInfo {
        id: UserId(id),
        username: Some(format!("user{id}")),
        first_name: format!("User {id}"),
        is_bot: false,
    }
}

pub fn message(chat: i64, sender: i64, text: &str) -> Message {
    Message {
        id: MessageRef {
            chat_id: ChatId(chat),
            message_id: MessageId(1),
        },
        sender: Some(UserId(sender)),
        date: Utc::now(),
        text: text.to_string(),
        post: false,
        reply_to: None,
    }
}

pub fn envelope(chat_kind: ChatKind, msg: Message) -> Envelope {
    Envelope {
        entities: Entities {
            chat: ChatInfo {
                id: msg.chat_id(),
                kind: chat_kind,
                title: None,
            },
            sender: msg.sender.map(|u| user(u.0)),
        },
        payload: Payload::Message(msg),
    }
}

/// A private-chat message from user 10.
pub fn direct(text: &str) -> InboundUpdate {
    InboundUpdate::NewMessage(envelope(ChatKind::Private, message(10, 10, text)))
}

/// A supergroup message from user 10.
pub fn group(text: &str) -> InboundUpdate {
    InboundUpdate::NewChannelMessage(envelope(ChatKind::Supergroup, message(-100, 10, text)))
}

/// A channel post (no sender).
pub fn channel_post(text: &str) -> InboundUpdate {
    let mut msg = message(-200, 0, text);
    msg.sender = None;
    msg.post = true;
    InboundUpdate::NewChannelMessage(envelope(ChatKind::Channel, msg))
}

/// Collects formatted log lines emitted on the current thread.
#[derive(Clone, Default)]
pub struct LogCapture {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Install as the thread default subscriber until the guard drops.
    ///
    /// Tests using this run on the current-thread runtime so every event
    /// lands here.
    pub fn install() -> (Self, DefaultGuard) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(logs.clone())
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().unwrap()).to_string()
    }

    /// Byte offset of the first line carrying `status`, quoted or not.
    pub fn position(&self, status: &str) -> Option<usize> {
        let logs = self.contents();
        [format!("status=\"{status}\""), format!("status={status} ")]
            .iter()
            .filter_map(|needle| logs.find(needle.as_str()))
            .min()
    }

    pub fn has(&self, status: &str) -> bool {
        self.position(status).is_some()
    }

    /// The line carrying `status`, for field checks.
    pub fn line(&self, status: &str) -> Option<String> {
        let at = self.position(status)?;
        let logs = self.contents();
        let start = logs[..at].rfind('\n').map_or(0, |i| i + 1);
        let end = logs[at..].find('\n').map_or(logs.len(), |i| at + i);
        Some(logs[start..end].to_string())
    }
}

pub struct LogWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
