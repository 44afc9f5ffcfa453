//! One-shot session authentication.

use std::io::{self, BufRead};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, sync::oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{SelfInfo, Target},
    errors::Error,
    messaging::port::Api,
    Result,
};

/// Text of the notification sent to ourselves after a successful login.
pub const INITIALIZED_NOTICE: &str = "Telegram client initialized";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authorized,
    Failed,
}

/// Supplies the credential used to sign in when the stored session is not
/// authorized.
#[async_trait]
pub trait AuthFlow: Send + Sync {
    async fn credential(&self) -> Result<String>;
}

/// Credential known up front (environment, secrets file).
pub struct StoredCredential {
    credential: String,
}

impl StoredCredential {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
        }
    }
}

#[async_trait]
impl AuthFlow for StoredCredential {
    async fn credential(&self) -> Result<String> {
        Ok(self.credential.clone())
    }
}

/// Prompts on the terminal and reads one line from stdin.
///
/// The read runs on its own detached thread, so a canceled prompt does not
/// keep the runtime from shutting down.
pub struct TerminalAuth {
    prompt: String,
    read_line: fn() -> io::Result<String>,
}

impl TerminalAuth {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self::with_reader(prompt, read_stdin_line)
    }

    fn with_reader(prompt: impl Into<String>, read_line: fn() -> io::Result<String>) -> Self {
        Self {
            prompt: prompt.into(),
            read_line,
        }
    }
}

impl Default for TerminalAuth {
    fn default() -> Self {
        Self::new("Enter bot token: ")
    }
}

fn read_stdin_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

#[async_trait]
impl AuthFlow for TerminalAuth {
    async fn credential(&self) -> Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(self.prompt.as_bytes()).await?;
        stdout.flush().await?;

        let (tx, rx) = oneshot::channel();
        let read_line = self.read_line;
        std::thread::Builder::new()
            .name("teleout-credential".to_string())
            .spawn(move || {
                // The receiver is gone when the prompt was canceled.
                let _ = tx.send(read_line());
            })?;

        let line = rx
            .await
            .map_err(|_| Error::External("credential reader exited".to_string()))??;

        let credential = line.trim().to_string();
        if credential.is_empty() {
            return Err(Error::Config("empty credential".to_string()));
        }
        Ok(credential)
    }
}

/// Establishes or restores the session before the event loop starts.
#[derive(Debug)]
pub struct SessionAuthenticator {
    state: AuthState,
}

impl Default for SessionAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAuthenticator {
    pub fn new() -> Self {
        Self {
            state: AuthState::Unauthenticated,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Authorize the session and announce it to ourselves.
    ///
    /// Errors are wrapped in [`Error::Auth`] and leave the authenticator in
    /// [`AuthState::Failed`]. A failed self-notification is only logged.
    pub async fn run(
        &mut self,
        api: &dyn Api,
        flow: &dyn AuthFlow,
        cancel: &CancellationToken,
    ) -> Result<SelfInfo> {
        if self.state != AuthState::Unauthenticated {
            return Err(Error::Auth(Box::new(Error::External(format!(
                "authenticator already ran (state {:?})",
                self.state
            )))));
        }

        let me = match self.authorize(api, flow, cancel).await {
            Ok(me) => me,
            Err(e) => {
                self.state = AuthState::Failed;
                return Err(Error::Auth(Box::new(e)));
            }
        };
        self.state = AuthState::Authorized;
        tracing::info!(status = "authorized", user = %me);

        if let Err(e) = api.send_text(Target::SelfChat, INITIALIZED_NOTICE).await {
            tracing::warn!(status = "self.notify.failed", error = %e);
        }

        Ok(me)
    }

    async fn authorize(
        &mut self,
        api: &dyn Api,
        flow: &dyn AuthFlow,
        cancel: &CancellationToken,
    ) -> Result<SelfInfo> {
        let status = api.auth_status().await?;
        if status.authorized {
            return match status.user {
                Some(me) => Ok(me),
                None => api.get_me().await,
            };
        }

        self.state = AuthState::Authenticating;
        tracing::info!(status = "authorizing");

        let credential = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Canceled),
            c = flow.credential() => c?,
        };

        api.sign_in(&credential).await
    }
}
