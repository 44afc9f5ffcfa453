//! Built-in commands.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    domain::{ChatId, Target, UserId},
    errors::Error,
    messaging::types::{InboundUpdate, Message},
    router::{CommandHandler, CommandTable, Context, MessageHook, COMMAND_PREFIX},
    Result,
};

pub const DEFAULT_REACTION: &str = "🤡";

/// Default registrations: `ping`, `help`, `getMe`, `spamReaction`.
///
/// `reactor` is shared with the router as a [`MessageHook`].
pub fn default_table(reactor: Arc<SpamReactor>) -> CommandTable {
    CommandTable::new()
        .register("ping", Arc::new(Ping))
        .register("help", Arc::new(Help))
        .register("getMe", Arc::new(GetMe))
        .register("spamReaction", Arc::new(SpamReactionCommand::new(reactor)))
}

fn reply_target(msg: &Message) -> Target {
    Target::Chat(msg.chat_id())
}

/// Text after the command token.
fn command_args(text: &str) -> Vec<&str> {
    text.split_whitespace().skip(1).collect()
}

pub struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    async fn handle(&self, ctx: &Context<'_>, _update: &InboundUpdate, msg: &Message) -> Result<()> {
        let latency = Utc::now().signed_duration_since(msg.date);
        let text = match latency.num_milliseconds() {
            ms if ms >= 0 => format!("pong ({ms}ms)"),
            _ => "pong".to_string(),
        };
        ctx.api.send_text(reply_target(msg), &text).await?;
        Ok(())
    }

    fn description(&self) -> &str {
        "check that the client is alive"
    }
}

pub struct Help;

#[async_trait]
impl CommandHandler for Help {
    async fn handle(&self, ctx: &Context<'_>, _update: &InboundUpdate, msg: &Message) -> Result<()> {
        let mut lines = vec!["Commands:".to_string()];
        for (name, handler) in ctx.commands.iter() {
            let desc = handler.description();
            if desc.is_empty() {
                lines.push(format!("{COMMAND_PREFIX}{name}"));
            } else {
                lines.push(format!("{COMMAND_PREFIX}{name} - {desc}"));
            }
        }
        ctx.api
            .send_text(reply_target(msg), &lines.join("\n"))
            .await?;
        Ok(())
    }

    fn description(&self) -> &str {
        "list commands"
    }
}

pub struct GetMe;

#[async_trait]
impl CommandHandler for GetMe {
    async fn handle(&self, ctx: &Context<'_>, _update: &InboundUpdate, msg: &Message) -> Result<()> {
        let me = ctx.api.get_me().await?;
        let mut text = format!("{me}");
        if me.is_bot {
            text.push_str("\nbot account");
        }
        if let Some(sender) = &ctx.entities.sender {
            text.push_str(&format!("\nasked by {} (id {})", sender.first_name, sender.id.0));
        }
        ctx.api.send_text(reply_target(msg), &text).await?;
        Ok(())
    }

    fn description(&self) -> &str {
        "show the authenticated identity"
    }
}

/// Reacts to every message of flagged users, per chat.
#[derive(Debug, Default)]
pub struct SpamReactor {
    targets: Mutex<HashMap<ChatId, HashMap<UserId, String>>>,
}

impl SpamReactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag `user` in `chat`, or unflag if already flagged. Returns whether
    /// the user is flagged afterwards.
    pub fn toggle(&self, chat: ChatId, user: UserId, emoji: &str) -> bool {
        let mut targets = self.targets.lock().unwrap_or_else(|e| e.into_inner());
        let users = targets.entry(chat).or_default();
        if users.remove(&user).is_some() {
            if users.is_empty() {
                targets.remove(&chat);
            }
            return false;
        }
        users.insert(user, emoji.to_string());
        true
    }

    /// Unflag everyone in `chat`; returns how many users were flagged.
    pub fn clear(&self, chat: ChatId) -> usize {
        let mut targets = self.targets.lock().unwrap_or_else(|e| e.into_inner());
        targets.remove(&chat).map(|u| u.len()).unwrap_or(0)
    }

    pub fn reaction_for(&self, chat: ChatId, user: UserId) -> Option<String> {
        let targets = self.targets.lock().unwrap_or_else(|e| e.into_inner());
        targets.get(&chat).and_then(|u| u.get(&user)).cloned()
    }
}

#[async_trait]
impl MessageHook for SpamReactor {
    async fn on_message(&self, ctx: &Context<'_>, _update: &InboundUpdate, msg: &Message) -> Result<()> {
        let Some(sender) = msg.sender else {
            return Ok(());
        };
        let Some(emoji) = self.reaction_for(msg.chat_id(), sender) else {
            return Ok(());
        };
        ctx.api.send_reaction(msg.id, &emoji).await
    }
}

/// `!spamReaction [emoji]` in reply to a message toggles reactions to its
/// author; `!spamReaction stop` clears the chat.
pub struct SpamReactionCommand {
    reactor: Arc<SpamReactor>,
}

impl SpamReactionCommand {
    pub fn new(reactor: Arc<SpamReactor>) -> Self {
        Self { reactor }
    }
}

#[async_trait]
impl CommandHandler for SpamReactionCommand {
    async fn handle(&self, ctx: &Context<'_>, _update: &InboundUpdate, msg: &Message) -> Result<()> {
        let args = command_args(&msg.text);
        let chat = msg.chat_id();

        if args.first() == Some(&"stop") {
            let n = self.reactor.clear(chat);
            ctx.api
                .send_text(reply_target(msg), &format!("spam reaction stopped for {n} user(s)"))
                .await?;
            return Ok(());
        }

        let target = msg
            .reply_to
            .and_then(|r| r.sender)
            .ok_or_else(|| Error::Handler {
                command: "spamReaction".to_string(),
                reason: "reply to a user's message to toggle reactions".to_string(),
            })?;
        let emoji = args.first().copied().unwrap_or(DEFAULT_REACTION);

        let text = if self.reactor.toggle(chat, target, emoji) {
            format!("spam reaction {emoji} enabled for user {}", target.0)
        } else {
            format!("spam reaction disabled for user {}", target.0)
        };
        ctx.api.send_text(reply_target(msg), &text).await?;
        Ok(())
    }

    fn description(&self) -> &str {
        "reply to a message to toggle reactions to its author; `stop` clears the chat"
    }
}
