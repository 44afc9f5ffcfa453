//! Conversions between teloxide types and the core model.

use teloxide::{
    types::{Chat, Me, Message as TgMessage, MessageKind, UpdateKind as TgUpdateKind, User},
    RequestError,
};

use teleout_core::{
    domain::{ChatId, MessageId, MessageRef, SelfInfo, UserId},
    errors::Error,
    messaging::types::{
        ChatInfo, ChatKind, Entities, Envelope, InboundUpdate, Message, Payload, ReplyRef,
        UserInfo,
    },
};

/// Map a Bot API error into the core error type.
///
/// `RetryAfter` becomes a flood signal so the flood waiter can pick it up.
pub fn map_err(method: &'static str, e: RequestError) -> Error {
    match e {
        RequestError::RetryAfter(wait) => Error::FloodWait { method, wait },
        other => Error::Transport(format!("{method}: {other}")),
    }
}

/// Classify a message into a subscription kind.
///
/// Channels and supergroups are delivered as channel messages, private chats
/// and basic groups as plain messages.
pub fn inbound(msg: &TgMessage, channel_post: bool) -> InboundUpdate {
    let envelope = Envelope {
        entities: entities(msg),
        payload: payload(msg, channel_post),
    };
    if channel_post || msg.chat.is_channel() || msg.chat.is_supergroup() {
        InboundUpdate::NewChannelMessage(envelope)
    } else {
        InboundUpdate::NewMessage(envelope)
    }
}

pub fn update_kind(kind: &TgUpdateKind) -> &'static str {
    match kind {
        TgUpdateKind::Message(_) => "message",
        TgUpdateKind::EditedMessage(_) => "edited_message",
        TgUpdateKind::ChannelPost(_) => "channel_post",
        TgUpdateKind::EditedChannelPost(_) => "edited_channel_post",
        TgUpdateKind::CallbackQuery(_) => "callback_query",
        TgUpdateKind::InlineQuery(_) => "inline_query",
        TgUpdateKind::Poll(_) => "poll",
        TgUpdateKind::PollAnswer(_) => "poll_answer",
        TgUpdateKind::MyChatMember(_) => "my_chat_member",
        TgUpdateKind::ChatMember(_) => "chat_member",
        TgUpdateKind::ChatJoinRequest(_) => "chat_join_request",
        _ => "other",
    }
}

pub fn self_info(me: &Me) -> SelfInfo {
    let u = user_info(&me.user);
    SelfInfo {
        id: u.id,
        username: u.username,
        first_name: u.first_name,
        is_bot: u.is_bot,
    }
}

pub fn user_info(user: &User) -> UserInfo {
    UserInfo {
        id: user_id(user),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        is_bot: user.is_bot,
    }
}

fn user_id(user: &User) -> UserId {
    UserId(user.id.0 as i64)
}

fn chat_info(chat: &Chat) -> ChatInfo {
    let kind = if chat.is_private() {
        ChatKind::Private
    } else if chat.is_channel() {
        ChatKind::Channel
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Group
    };
    ChatInfo {
        id: ChatId(chat.id.0),
        kind,
        title: chat.title().map(str::to_string),
    }
}

fn entities(msg: &TgMessage) -> Entities {
    Entities {
        chat: chat_info(&msg.chat),
        sender: msg.from().map(user_info),
    }
}

fn payload(msg: &TgMessage, post: bool) -> Payload {
    let action = match &msg.kind {
        MessageKind::Common(_) => return Payload::Message(message(msg, post)),
        MessageKind::Dice(_) => return Payload::Empty,
        MessageKind::NewChatMembers(_) => "new_chat_members",
        MessageKind::LeftChatMember(_) => "left_chat_member",
        MessageKind::NewChatTitle(_) => "new_chat_title",
        MessageKind::NewChatPhoto(_) | MessageKind::DeleteChatPhoto(_) => "chat_photo",
        MessageKind::Pinned(_) => "pinned",
        MessageKind::GroupChatCreated(_)
        | MessageKind::SupergroupChatCreated(_)
        | MessageKind::ChannelChatCreated(_) => "chat_created",
        _ => "other",
    };
    Payload::Service {
        action: action.to_string(),
    }
}

fn message(msg: &TgMessage, post: bool) -> Message {
    Message {
        id: MessageRef {
            chat_id: ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        },
        sender: msg.from().map(user_id),
        date: msg.date,
        text: msg
            .text()
            .or_else(|| msg.caption())
            .unwrap_or_default()
            .to_string(),
        post,
        reply_to: msg.reply_to_message().map(|r| ReplyRef {
            message_id: MessageId(r.id.0),
            sender: r.from().map(user_id),
        }),
    }
}
