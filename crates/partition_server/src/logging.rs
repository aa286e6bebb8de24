//! Logging system setup.
//!
//! Structured logging through `tracing`, filtered by `RUST_LOG` when set and
//! by the configured level otherwise.

use crate::config::LoggingSettings;
use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the global subscriber.
///
/// # Arguments
/// * `config` - Logging section of the configuration file
/// * `json_format` - Force JSON output regardless of the configuration
///
/// # Returns
/// * `Result<()>` - Fails if a global subscriber is already installed
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> Result<()> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}
