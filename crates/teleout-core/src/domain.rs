use std::fmt;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric). Channels and supergroups are negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric, unique per chat).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Destination of an outbound text message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// The authenticated identity itself (saved messages / owner chat).
    SelfChat,
    Chat(ChatId),
}

/// The identity the session is authenticated as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelfInfo {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub is_bot: bool,
}

impl fmt::Display for SelfInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(u) => write!(f, "{} (@{u}, id {})", self.first_name, self.id.0),
            None => write!(f, "{} (id {})", self.first_name, self.id.0),
        }
    }
}
