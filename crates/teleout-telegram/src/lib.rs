//! Telegram adapter (teloxide).
//!
//! This crate implements the `teleout-core` transport and API ports over the
//! Telegram Bot API. The bot token is the session credential; it is kept in
//! the session file after a successful sign-in.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::{requests::Requester, ApiError, Bot, RequestError};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

pub mod convert;
pub mod router;
pub mod session;

use teleout_core::{
    domain::{ChatId, MessageId, MessageRef, SelfInfo, Target},
    errors::Error,
    messaging::port::{Api, AuthStatus, Transport, UpdateSink},
    session::FileSessionStorage,
    Result,
};

use crate::{convert::map_err, session::SessionData};

/// Bot API calls, without rate or flood control.
pub struct TelegramApi {
    storage: FileSessionStorage,
    self_chat_id: Option<ChatId>,
    bot: RwLock<Option<Bot>>,
}

impl TelegramApi {
    /// `self_chat_id` receives [`Target::SelfChat`] messages; a bot cannot
    /// message itself, so without it self-notifications fail.
    pub fn new(storage: FileSessionStorage, self_chat_id: Option<i64>) -> Self {
        Self {
            storage,
            self_chat_id: self_chat_id.map(ChatId),
            bot: RwLock::new(None),
        }
    }

    /// Load the stored session, if any.
    pub async fn load_session(&self) -> Result<()> {
        let blob = self.storage.load()?;
        let session = SessionData::decode(blob.as_deref())?;

        let bot = session.token.as_deref().map(|t| Bot::new(t));
        tracing::debug!(
            status = "session.loaded",
            path = %self.storage.path().display(),
            stored = bot.is_some(),
            user_id = ?session.user_id,
        );
        *self.bot.write().await = bot;
        Ok(())
    }

    pub async fn bot(&self) -> Result<Bot> {
        self.bot
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Transport("not signed in".to_string()))
    }

    fn resolve(&self, target: Target) -> Result<teloxide::types::ChatId> {
        let chat = match target {
            Target::Chat(id) => id,
            Target::SelfChat => self.self_chat_id.ok_or_else(|| {
                Error::Transport("no self chat configured (TELEGRAM_SELF_CHAT_ID)".to_string())
            })?,
        };
        Ok(teloxide::types::ChatId(chat.0))
    }
}

// Telegram answers 401 "Unauthorized" for revoked tokens and 404 for
// malformed ones.
fn is_rejected_token(e: &RequestError) -> bool {
    match e {
        RequestError::Api(ApiError::NotFound) => true,
        RequestError::Api(ApiError::Unknown(desc)) => desc == "Not Found",
        _ => false,
    }
}

#[async_trait]
impl Api for TelegramApi {
    async fn auth_status(&self) -> Result<AuthStatus> {
        let Some(bot) = self.bot.read().await.clone() else {
            return Ok(AuthStatus::default());
        };
        match bot.get_me().await {
            Ok(me) => Ok(AuthStatus {
                authorized: true,
                user: Some(convert::self_info(&me)),
            }),
            Err(e) if is_rejected_token(&e) => {
                tracing::warn!(status = "session.rejected", error = %e);
                Ok(AuthStatus::default())
            }
            Err(e) => Err(map_err("getMe", e)),
        }
    }

    async fn sign_in(&self, credential: &str) -> Result<SelfInfo> {
        let token = credential.trim();
        if token.is_empty() {
            return Err(Error::Config("empty bot token".to_string()));
        }

        let bot = Bot::new(token);
        let me = match bot.get_me().await {
            Ok(me) => convert::self_info(&me),
            Err(e) if is_rejected_token(&e) => {
                return Err(Error::External("bot token rejected by telegram".to_string()))
            }
            Err(e) => return Err(map_err("getMe", e)),
        };

        let session = SessionData {
            token: Some(token.to_string()),
            user_id: Some(me.id.0),
            username: me.username.clone(),
        };
        self.storage.store(&session.encode()?)?;
        tracing::info!(
            status = "session.stored",
            path = %self.storage.path().display(),
        );

        *self.bot.write().await = Some(bot);
        Ok(me)
    }

    async fn get_me(&self) -> Result<SelfInfo> {
        let me = self
            .bot()
            .await?
            .get_me()
            .await
            .map_err(|e| map_err("getMe", e))?;
        Ok(convert::self_info(&me))
    }

    async fn send_text(&self, target: Target, text: &str) -> Result<MessageRef> {
        let chat = self.resolve(target)?;
        let msg = self
            .bot()
            .await?
            .send_message(chat, text.to_string())
            .await
            .map_err(|e| map_err("sendMessage", e))?;

        Ok(MessageRef {
            chat_id: ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()> {
        // Bot API 6.x has no reactions; keep this best-effort.
        tracing::debug!(
            status = "reaction.unsupported",
            chat_id = msg.chat_id.0,
            message_id = msg.message_id.0,
            emoji,
        );
        Ok(())
    }
}

/// Bot API transport: long polling plus the [`TelegramApi`].
pub struct TelegramTransport {
    api: Arc<TelegramApi>,
}

impl TelegramTransport {
    pub fn new(storage: FileSessionStorage, self_chat_id: Option<i64>) -> Self {
        Self {
            api: Arc::new(TelegramApi::new(storage, self_chat_id)),
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn connect(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        self.api.load_session().await
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
        let bot = self.api.bot().await?;
        router::run_polling(bot, api, sink, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{prefix}-{}-{ts}", std::process::id()))
    }

    #[tokio::test]
    async fn without_a_stored_session_nothing_is_authorized() {
        let dir = tmp("teleout-tg-empty");
        let transport = TelegramTransport::new(FileSessionStorage::new(dir.join("s.json")), None);

        transport.connect(&CancellationToken::new()).await.unwrap();
        let api = transport.api();

        assert_eq!(api.auth_status().await.unwrap(), AuthStatus::default());
        assert!(matches!(api.get_me().await, Err(Error::Transport(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn connect_loads_a_stored_token() {
        let dir = tmp("teleout-tg-stored");
        let storage = FileSessionStorage::new(dir.join("s.json"));
        storage.store(br#"{"token":"123:abc"}"#).unwrap();

        let api = TelegramApi::new(storage, None);
        api.load_session().await.unwrap();

        assert_eq!(api.bot().await.unwrap().token(), "123:abc");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn corrupt_session_fails_connect() {
        let dir = tmp("teleout-tg-corrupt");
        let storage = FileSessionStorage::new(dir.join("s.json"));
        storage.store(b"{oops").unwrap();

        let transport = TelegramTransport::new(storage, None);
        let err = transport.connect(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn connect_honors_cancellation() {
        let transport = TelegramTransport::new(FileSessionStorage::new("/nonexistent/s.json"), None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(transport.connect(&cancel).await, Err(Error::Canceled)));
    }

    #[tokio::test]
    async fn blank_credential_is_rejected_locally() {
        let api = TelegramApi::new(FileSessionStorage::new("/nonexistent/s.json"), None);
        assert!(matches!(api.sign_in("   ").await, Err(Error::Config(_))));
    }

    #[test]
    fn self_chat_needs_configuration() {
        let storage = FileSessionStorage::new("/nonexistent/s.json");

        let api = TelegramApi::new(storage.clone(), None);
        assert!(matches!(api.resolve(Target::SelfChat), Err(Error::Transport(_))));
        assert_eq!(
            api.resolve(Target::Chat(ChatId(-100))).unwrap(),
            teloxide::types::ChatId(-100)
        );

        let api = TelegramApi::new(storage, Some(42));
        assert_eq!(
            api.resolve(Target::SelfChat).unwrap(),
            teloxide::types::ChatId(42)
        );
    }

    #[test]
    fn rejected_token_detection() {
        assert!(is_rejected_token(&RequestError::Api(ApiError::NotFound)));
        assert!(is_rejected_token(&RequestError::Api(ApiError::Unknown(
            "Not Found".to_string()
        ))));
        assert!(!is_rejected_token(&RequestError::MigrateToChatId(1)));
    }
}
