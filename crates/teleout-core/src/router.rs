//! Command routing for inbound messages.
//!
//! A command is the first whitespace-separated token of a message, starting
//! with [`COMMAND_PREFIX`]. Names are case-sensitive and looked up in a
//! [`CommandTable`] fixed before the session starts.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::Error,
    messaging::{
        port::Api,
        types::{Entities, InboundUpdate, Message, Payload},
    },
    Result,
};

pub const COMMAND_PREFIX: char = '!';

/// Everything a handler may need besides the update itself.
pub struct Context<'a> {
    pub api: &'a dyn Api,
    pub entities: &'a Entities,
    pub commands: &'a CommandTable,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &Context<'_>, update: &InboundUpdate, msg: &Message)
        -> Result<()>;

    /// One-line description shown by `!help`.
    fn description(&self) -> &str {
        ""
    }
}

/// Runs on every routable message before command dispatch.
#[async_trait]
pub trait MessageHook: Send + Sync {
    async fn on_message(&self, ctx: &Context<'_>, update: &InboundUpdate, msg: &Message)
        -> Result<()>;
}

/// Name -> handler registrations. Built once, shared read-only.
#[derive(Default, Clone)]
pub struct CommandTable {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name` (without the prefix). A later
    /// registration of the same name replaces the earlier one.
    pub fn register(mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!(status = "command.replaced", command = %name);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn CommandHandler>)> {
        self.handlers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Extract the command name from message text.
///
/// Returns `None` for plain chat (no tokens, or no prefix on the first one).
pub fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    first.strip_prefix(COMMAND_PREFIX)
}

pub struct CommandRouter {
    api: Arc<dyn Api>,
    commands: Arc<CommandTable>,
    hooks: Vec<Arc<dyn MessageHook>>,
}

impl CommandRouter {
    pub fn new(api: Arc<dyn Api>, commands: Arc<CommandTable>) -> Self {
        Self {
            api,
            commands,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn MessageHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Route one update.
    ///
    /// Channel posts, empty messages and plain chat are dropped with `Ok`, as
    /// are unknown commands (logged). Hook and handler errors propagate.
    pub async fn dispatch(&self, update: &InboundUpdate, cancel: &CancellationToken) -> Result<()> {
        let envelope = update.envelope().ok_or(Error::BadUpdate)?;
        let Payload::Message(msg) = &envelope.payload else {
            return Err(Error::BadUpdate);
        };

        if msg.post {
            return Ok(());
        }
        tracing::debug!(
            status = "message.got",
            kind = update.kind().as_str(),
            chat = msg.chat_id().0,
            text = %msg.text,
        );

        if msg.text.split_whitespace().next().is_none() {
            return Ok(());
        }

        let ctx = Context {
            api: self.api.as_ref(),
            entities: &envelope.entities,
            commands: &self.commands,
            cancel,
        };

        for hook in &self.hooks {
            hook.on_message(&ctx, update, msg).await?;
        }

        let Some(command) = parse_command(&msg.text) else {
            return Ok(());
        };

        let Some(handler) = self.commands.get(command) else {
            tracing::warn!(
                status = "unknown.command",
                command,
                text = %msg.text,
            );
            return Ok(());
        };

        tracing::info!(status = "command.got", command);
        let t0 = Instant::now();
        handler.handle(&ctx, update, msg).await?;
        tracing::info!(
            status = "ok",
            command,
            dur_ms = t0.elapsed().as_millis() as u64,
        );
        Ok(())
    }
}
