//! Tracing subscriber setup

use crate::types::{AppError, Result};
use crate::utils::toml_config::LoggingConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive used when neither `RUST_LOG` nor `--verbose` is given.
pub fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        "scholar=debug,info".to_string()
    } else {
        config.level.clone()
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the config.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config, verbose)));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    result.map_err(|e| AppError::Internal(format!("Failed to init subscriber: {}", e)))
}
