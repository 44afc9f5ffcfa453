use chrono::{DateTime, Utc};

use crate::domain::{ChatId, MessageId, MessageRef, UserId};

/// Which subscription an update arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// Messages in channels and supergroups (including channel posts).
    NewChannelMessage,
    /// Messages in private chats and basic groups.
    NewMessage,
    Other,
}

impl UpdateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateKind::NewChannelMessage => "new_channel_message",
            UpdateKind::NewMessage => "new_message",
            UpdateKind::Other => "other",
        }
    }
}

/// Cross-messenger incoming update model.
///
/// Telegram-specific fields stay in the adapter; everything the router and
/// the commands need is carried here.
#[derive(Clone, Debug)]
pub enum InboundUpdate {
    NewChannelMessage(Envelope),
    NewMessage(Envelope),
    Other { kind: String },
}

impl InboundUpdate {
    pub fn kind(&self) -> UpdateKind {
        match self {
            InboundUpdate::NewChannelMessage(_) => UpdateKind::NewChannelMessage,
            InboundUpdate::NewMessage(_) => UpdateKind::NewMessage,
            InboundUpdate::Other { .. } => UpdateKind::Other,
        }
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            InboundUpdate::NewChannelMessage(e) | InboundUpdate::NewMessage(e) => Some(e),
            InboundUpdate::Other { .. } => None,
        }
    }
}

/// Entities (chat + sender) an update refers to, plus its payload.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub entities: Entities,
    pub payload: Payload,
}

#[derive(Clone, Debug)]
pub struct Entities {
    pub chat: ChatInfo,
    pub sender: Option<UserInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatInfo {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub is_bot: bool,
}

/// Concrete shape of the message carried by an update.
#[derive(Clone, Debug)]
pub enum Payload {
    Message(Message),
    /// Join/leave/pin and other service notifications.
    Service { action: String },
    Empty,
}

#[derive(Clone, Debug)]
pub struct Message {
    pub id: MessageRef,
    pub sender: Option<UserId>,
    pub date: DateTime<Utc>,
    pub text: String,
    /// Set for channel posts (as opposed to user messages).
    pub post: bool,
    pub reply_to: Option<ReplyRef>,
}

impl Message {
    pub fn chat_id(&self) -> ChatId {
        self.id.chat_id
    }

    pub fn message_id(&self) -> MessageId {
        self.id.message_id
    }
}

/// The message a message replies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplyRef {
    pub message_id: MessageId,
    pub sender: Option<UserId>,
}
