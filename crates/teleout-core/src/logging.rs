use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize logging/tracing for the client.
///
/// `default_level` comes from configuration; `RUST_LOG` overrides it.
/// Output goes to stderr so stdout stays free for the terminal auth prompt.
pub fn init(service_name: &str, default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(service_name, default_level)))
        .map_err(|e| Error::Config(format!("invalid log level {default_level:?}: {e}")))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::External(format!("logging already initialized: {e}")))?;

    Ok(())
}

// Default: configured level for our crates, warn for everything else.
fn default_directives(service_name: &str, level: &str) -> String {
    let level = level.trim().to_lowercase();
    format!(
        "warn,{service_name}={level},teleout_core={level},teleout_telegram={level}",
        service_name = service_name.replace('-', "_"),
    )
}
