use std::{path::PathBuf, time::Duration};

/// Core error type.
///
/// Adapter crates map their library errors into this type so the router and
/// the orchestrator can tell per-update failures apart from fatal ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The update did not carry a regular message.
    #[error("bad update")]
    BadUpdate,

    /// The remote service asked us to slow down.
    #[error("flood wait of {}s requested by {method}", wait.as_secs_f64())]
    FloodWait { method: &'static str, wait: Duration },

    #[error("error while authenticating: {0}")]
    Auth(#[source] Box<Error>),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("command {command} failed: {reason}")]
    Handler { command: String, reason: String },

    #[error("operation canceled")]
    Canceled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Wait duration carried by a flood signal, if this is one.
    pub fn flood_wait(&self) -> Option<Duration> {
        match self {
            Error::FloodWait { wait, .. } => Some(*wait),
            _ => None,
        }
    }

    pub fn is_bad_update(&self) -> bool {
        matches!(self, Error::BadUpdate)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
