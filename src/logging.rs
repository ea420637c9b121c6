//! Diagnostic logging with `tracing`
//!
//! Log events go to stderr so they never mix with run output on stdout.
//! Filter precedence: `-v` (debug) > `RUST_LOG` > `log.level` > `warn`.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Filter used when nothing else is configured
pub const DEFAULT_FILTER: &str = "warn";

/// Pick the filter directive to use
pub fn filter_directive(verbose: bool, rust_log: Option<&str>, configured: Option<&str>) -> String {
    if verbose {
        return "debug".to_string();
    }
    non_empty(rust_log)
        .or_else(|| non_empty(configured))
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

fn non_empty(directive: Option<&str>) -> Option<&str> {
    directive.map(str::trim).filter(|d| !d.is_empty())
}

/// Install the global subscriber
///
/// # Errors
///
/// Fails on an invalid filter directive or when a subscriber is already set.
pub fn init_logging(verbose: bool, config: &LogConfig) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(verbose, rust_log.as_deref(), config.level.as_deref());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{}'", directive))?;

    let (text_layer, json_layer) = if config.json {
        let layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true);
        (None, Some(layer))
    } else {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .context("failed to install log subscriber")?;

    tracing::debug!(filter = %directive, json = config.json, "logging initialized");
    Ok(())
}
