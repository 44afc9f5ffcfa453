use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, middleware::RateBudget, Result};

const DEFAULT_STORAGE_DIR: &str = "~/.teleout";
const DEFAULT_SESSION_FILE: &str = "session.json";

/// Typed process configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: String,

    // Storage
    pub storage_dir: PathBuf,
    pub session_file: PathBuf,

    // Telegram
    /// Stored credential; when absent the token is asked for on the terminal.
    pub bot_token: Option<String>,
    /// Chat that receives self-notifications.
    pub self_chat_id: Option<i64>,

    // Outbound rate limiting
    pub rate_budget: RateBudget,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok(), home_dir())
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// Nothing is created on disk; see [`Config::ensure_storage_dir`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let log_level = get("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let storage_raw = get("FILE_STORAGE_PATH").unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string());
        let storage_dir = expand_home(&storage_raw, home.as_deref())?;

        let session_name = get("TELEGRAM_SESSION_FILE").unwrap_or_else(|| DEFAULT_SESSION_FILE.to_string());
        let session_file = storage_dir.join(expand_home(&session_name, home.as_deref())?);

        let bot_token = get("TELEGRAM_BOT_TOKEN");
        let self_chat_id = parse_opt::<i64>("TELEGRAM_SELF_CHAT_ID", get("TELEGRAM_SELF_CHAT_ID"))?;

        let defaults = RateBudget::default();
        let interval_ms = parse_opt::<u64>("RATE_LIMIT_INTERVAL_MS", get("RATE_LIMIT_INTERVAL_MS"))?
            .unwrap_or(defaults.interval.as_millis() as u64);
        let burst = parse_opt::<u32>("RATE_LIMIT_BURST", get("RATE_LIMIT_BURST"))?.unwrap_or(defaults.burst);
        if interval_ms == 0 || burst == 0 {
            return Err(Error::Config(
                "RATE_LIMIT_INTERVAL_MS and RATE_LIMIT_BURST must be positive".to_string(),
            ));
        }

        Ok(Self {
            log_level,
            storage_dir,
            session_file,
            bot_token,
            self_chat_id,
            rate_budget: RateBudget {
                interval: Duration::from_millis(interval_ms),
                burst,
            },
        })
    }

    /// Create the storage directory (and the session file's parent) if absent.
    pub fn ensure_storage_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.storage_dir)?;
        if let Some(parent) = self.session_file.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(raw: &str, home: Option<&Path>) -> Result<PathBuf> {
    let rest = match raw.strip_prefix('~') {
        None => return Ok(PathBuf::from(raw)),
        Some(rest) => rest,
    };
    // `~user` is not supported.
    if !(rest.is_empty() || rest.starts_with('/')) {
        return Err(Error::InvalidPath {
            path: PathBuf::from(raw),
            reason: "only `~` and `~/...` can be expanded".to_string(),
        });
    }
    let home = home.ok_or_else(|| Error::Config("HOME is not set".to_string()))?;
    Ok(home.join(rest.trim_start_matches('/')))
}

fn parse_opt<T: std::str::FromStr>(key: &str, v: Option<String>) -> Result<Option<T>> {
    let Some(v) = v else {
        return Ok(None);
    };
    v.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} has an invalid value: {v:?}")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}
