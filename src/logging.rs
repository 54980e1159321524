//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;
use crate::error::Error;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config.level` is the filter. Emits
/// one JSON object per line unless `config.json` is off.
pub fn init(config: &LogConfig) -> Result<(), Error> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(&config.level)
            .map_err(|e| Error::internal(format!("invalid log level filter `{}`: {e}", config.level)))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if config.json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| Error::internal(format!("install tracing subscriber: {e}")))
}
